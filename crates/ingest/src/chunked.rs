use crate::error::{IngestError, Result};
use crate::headers::normalize_header;
use crate::stats::IngestStats;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use ystr_catalog::{canonicalize_multi_copy, clean_text, CleanCache, Marker};
use ystr_protocol::Profile;
use ystr_store::ProfileStore;

/// Profiles per store upsert for chunked collections.
pub const CHUNK_BATCH_SIZE: usize = 50;

const PAUSE_BETWEEN_CHUNKS: Duration = Duration::from_millis(50);

const UNKNOWN: &str = "Unknown";

/// A pre-chunked canonical JSON collection: `<base_url>/chunk_<i>.json`
/// for `i` in `0..chunks`.
#[derive(Debug, Clone)]
pub struct ChunkedSource {
    pub base_url: String,
    pub chunks: usize,
}

impl ChunkedSource {
    fn chunk_url(&self, index: usize) -> String {
        format!("{}/chunk_{index}.json", self.base_url.trim_end_matches('/'))
    }
}

/// One record as published in a chunk file. Markers arrive keyed by raw
/// header-ish names; the kit number may live at the top level or under the
/// `"Kit Number"` marker key, depending on the converter vintage.
#[derive(Debug, Deserialize)]
struct ChunkRecord {
    #[serde(default, alias = "kitNumber")]
    kit_number: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    haplogroup: Option<String>,
    #[serde(default)]
    markers: BTreeMap<String, String>,
}

fn canonical_profile(record: ChunkRecord, cache: &mut CleanCache) -> Option<Profile> {
    let kit_raw = record
        .markers
        .get("Kit Number")
        .or_else(|| record.markers.get("KitNumber"))
        .or(record.kit_number.as_ref())?;
    let kit_number = clean_text(kit_raw);
    if kit_number.is_empty() {
        return None;
    }

    let identity = |raw: Option<&String>| {
        let cleaned = raw.map(|v| clean_text(v)).unwrap_or_default();
        if cleaned.is_empty() {
            UNKNOWN.to_string()
        } else {
            cleaned
        }
    };

    let mut profile = Profile::new(kit_number);
    profile.name = Some(identity(record.name.as_ref()));
    profile.country = Some(identity(record.country.as_ref()));
    profile.haplogroup = Some(identity(record.haplogroup.as_ref()));

    for (key, value) in &record.markers {
        let Some(marker) = Marker::from_name(&normalize_header(key)) else {
            continue;
        };
        let cleaned = cache.clean(value);
        if cleaned.is_empty() {
            continue;
        }
        profile.set_marker(marker, canonicalize_multi_copy(&cleaned, marker));
    }
    Some(profile)
}

async fn fetch_chunk(client: &reqwest::Client, url: &str) -> Result<Vec<ChunkRecord>> {
    let fetch_err = |source: reqwest::Error| IngestError::Fetch {
        url: url.to_string(),
        source,
    };
    let response = client
        .get(url)
        .send()
        .await
        .map_err(fetch_err)?
        .error_for_status()
        .map_err(fetch_err)?;
    response.json().await.map_err(fetch_err)
}

/// Load a pre-chunked JSON collection into the store.
///
/// Every chunk is fetched independently; a chunk that fails to fetch or
/// decode is logged and skipped, never retried, and never aborts the
/// remaining chunks. Store failures do abort: a half-written batch is a
/// real error, a missing chunk is not. Progress is per chunk index, so it
/// is not guaranteed monotonic across failures.
pub async fn load_chunked(
    source: &ChunkedSource,
    store: &mut ProfileStore,
    mut on_progress: impl FnMut(f64),
) -> Result<(Vec<Profile>, IngestStats)> {
    let started = Instant::now();
    log::info!(
        "Loading {} chunks from {}",
        source.chunks,
        source.base_url
    );

    let client = reqwest::Client::new();
    let mut stats = IngestStats::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cache = CleanCache::new();

    for index in 0..source.chunks {
        let url = source.chunk_url(index);
        let records = match fetch_chunk(&client, &url).await {
            Ok(records) => records,
            Err(err) => {
                log::warn!("Skipping chunk {index}: {err}");
                stats.chunks_failed += 1;
                stats.add_error(format!("chunk {index}: {err}"));
                continue;
            }
        };

        let mut accepted: Vec<Profile> = Vec::new();
        for record in records {
            stats.rows_read += 1;
            let Some(profile) = canonical_profile(record, &mut cache) else {
                stats.rejected += 1;
                continue;
            };
            if !seen.insert(profile.kit_number.clone()) {
                stats.duplicates += 1;
                continue;
            }
            accepted.push(profile);
        }

        stats.accepted += accepted.len();
        for batch in accepted.chunks(CHUNK_BATCH_SIZE) {
            store.save_profiles(batch).await?;
        }

        on_progress((index + 1) as f64 / source.chunks as f64 * 100.0);
        tokio::time::sleep(PAUSE_BETWEEN_CHUNKS).await;
    }

    stats.time_ms = started.elapsed().as_millis() as u64;
    log::info!(
        "Chunked load done: {} accepted, {} chunks failed, {}ms",
        stats.accepted,
        stats.chunks_failed,
        stats.time_ms
    );
    Ok((store.profiles(), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chunk_urls_are_index_based() {
        let source = ChunkedSource {
            base_url: "https://example.org/data/".to_string(),
            chunks: 3,
        };
        assert_eq!(source.chunk_url(0), "https://example.org/data/chunk_0.json");
        assert_eq!(source.chunk_url(2), "https://example.org/data/chunk_2.json");
    }

    #[test]
    fn kit_number_recovered_from_marker_key() {
        let json = r#"{
            "markers": {"Kit Number": " IN99 ", "DYS393": "13", "DYS385": "14-11"}
        }"#;
        let record: ChunkRecord = serde_json::from_str(json).unwrap();
        let profile = canonical_profile(record, &mut CleanCache::new()).unwrap();

        assert_eq!(profile.kit_number, "IN99");
        assert_eq!(profile.name.as_deref(), Some("Unknown"));
        assert_eq!(
            profile.marker_value(Marker::from_name("DYS385").unwrap()),
            Some("11-14")
        );
        // the pseudo-marker key itself never becomes a marker
        assert_eq!(profile.markers.len(), 2);
    }

    #[test]
    fn top_level_kit_number_also_accepted() {
        let json = r#"{
            "kitNumber": "IN100",
            "name": "Smith",
            "markers": {"DYS393": "13"}
        }"#;
        let record: ChunkRecord = serde_json::from_str(json).unwrap();
        let profile = canonical_profile(record, &mut CleanCache::new()).unwrap();
        assert_eq!(profile.kit_number, "IN100");
        assert_eq!(profile.name.as_deref(), Some("Smith"));
    }

    #[test]
    fn records_without_kit_are_dropped() {
        let json = r#"{"markers": {"DYS393": "13"}}"#;
        let record: ChunkRecord = serde_json::from_str(json).unwrap();
        assert!(canonical_profile(record, &mut CleanCache::new()).is_none());
    }
}
