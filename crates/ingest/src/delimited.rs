use crate::error::{IngestError, Result};
use crate::headers::HeaderMap;
use crate::record::profile_from_record;
use crate::stats::IngestStats;
use std::collections::HashSet;
use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use ystr_catalog::CleanCache;
use ystr_protocol::Profile;
use ystr_store::ProfileStore;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Parsed batches in flight between the reader thread and the store. Small
/// on purpose: it is what bounds peak memory for arbitrarily large sources.
const BATCH_CHANNEL_CAPACITY: usize = 4;

/// Cooperative pause after each committed batch so the host stays
/// responsive during a long load.
const YIELD_BETWEEN_BATCHES: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Profiles per store upsert.
    pub batch_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// A delimited-text source: a local file or a remote URL.
#[derive(Debug, Clone)]
pub enum DelimitedSource {
    Path(PathBuf),
    Url(String),
}

impl DelimitedSource {
    /// Open the raw byte stream and, when knowable, its total size.
    fn open(&self) -> Result<(Box<dyn Read + Send>, Option<u64>)> {
        match self {
            DelimitedSource::Path(path) => {
                let file = std::fs::File::open(path)?;
                let total = file.metadata()?.len();
                Ok((Box::new(file), Some(total)))
            }
            DelimitedSource::Url(url) => {
                let response = reqwest::blocking::get(url.as_str())
                    .and_then(|r| r.error_for_status())
                    .map_err(|source| IngestError::Fetch {
                        url: url.clone(),
                        source,
                    })?;
                let total = response.content_length();
                Ok((Box::new(response), total))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DelimitedSource::Path(path) => path.display().to_string(),
            DelimitedSource::Url(url) => url.clone(),
        }
    }
}

struct Batch {
    profiles: Vec<Profile>,
    percent: Option<f64>,
}

/// Stream a delimited source into the store.
///
/// The blocking read-and-parse loop runs on its own thread; parsed batches
/// flow through a bounded channel to this task, which commits each batch
/// before more input is read, then yields briefly. A failure partway
/// through leaves the store holding every batch that committed.
///
/// Progress is reported as a fraction of source bytes consumed (skipped
/// when the total size is unknowable). The returned profile list is a full
/// re-read of the store, which is authoritative over anything accumulated
/// in memory.
pub async fn load_delimited(
    source: DelimitedSource,
    store: &mut ProfileStore,
    options: IngestOptions,
    mut on_progress: impl FnMut(f64),
) -> Result<(Vec<Profile>, IngestStats)> {
    let started = Instant::now();
    log::info!("Loading delimited source {}", source.describe());

    let (tx, mut rx) = mpsc::channel::<Batch>(BATCH_CHANNEL_CAPACITY);
    let batch_size = options.batch_size.max(1);
    let reader = tokio::task::spawn_blocking(move || read_rows(source, batch_size, tx));

    let mut save_error: Option<IngestError> = None;
    while let Some(batch) = rx.recv().await {
        if let Err(err) = store.save_profiles(&batch.profiles).await {
            save_error = Some(err.into());
            break;
        }
        if let Some(percent) = batch.percent {
            on_progress(percent);
        }
        tokio::time::sleep(YIELD_BETWEEN_BATCHES).await;
    }
    // Dropping the receiver makes the reader's next send fail, which stops
    // it early when a store write already failed.
    drop(rx);

    let reader_result = reader
        .await
        .map_err(|err| IngestError::Reader(err.to_string()))?;
    if let Some(err) = save_error {
        return Err(err);
    }
    let mut stats = reader_result?;
    if stats.accepted == 0 {
        return Err(IngestError::NoProfiles);
    }

    on_progress(100.0);
    stats.time_ms = started.elapsed().as_millis() as u64;
    log::info!(
        "Loaded {} profiles ({} rows, {} duplicates, {} rejected) in {}ms",
        stats.accepted,
        stats.rows_read,
        stats.duplicates,
        stats.rejected,
        stats.time_ms
    );
    Ok((store.profiles(), stats))
}

fn read_rows(
    source: DelimitedSource,
    batch_size: usize,
    tx: mpsc::Sender<Batch>,
) -> Result<IngestStats> {
    let (input, total_bytes) = source.open()?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = HeaderMap::from_record(reader.headers()?);

    let mut stats = IngestStats::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cache = CleanCache::new();
    let mut batch: Vec<Profile> = Vec::with_capacity(batch_size);
    let mut record = csv::StringRecord::new();

    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                stats.rejected += 1;
                stats.add_error(format!("row {}: {err}", stats.rows_read + 1));
                log::warn!("Skipping unreadable row: {err}");
                continue;
            }
        }
        stats.rows_read += 1;

        let Some(profile) = profile_from_record(&headers, &record, &mut cache) else {
            stats.rejected += 1;
            continue;
        };
        // first occurrence wins within a run
        if !seen.insert(profile.kit_number.clone()) {
            stats.duplicates += 1;
            continue;
        }

        batch.push(profile);
        stats.accepted += 1;

        if batch.len() >= batch_size {
            let percent = progress_percent(reader.position().byte(), total_bytes);
            let full = Batch {
                profiles: std::mem::take(&mut batch),
                percent,
            };
            if tx.blocking_send(full).is_err() {
                return Ok(stats);
            }
        }
    }

    if !batch.is_empty() {
        let percent = progress_percent(reader.position().byte(), total_bytes);
        let _ = tx.blocking_send(Batch {
            profiles: batch,
            percent,
        });
    }
    Ok(stats)
}

fn progress_percent(consumed: u64, total: Option<u64>) -> Option<f64> {
    let total = total?;
    if total == 0 {
        return None;
    }
    Some((consumed as f64 / total as f64 * 100.0).min(100.0))
}
