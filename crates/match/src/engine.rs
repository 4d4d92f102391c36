use crate::distance::genetic_distance;
use crate::error::MatchError;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use ystr_catalog::Marker;
use ystr_protocol::{Match, MatchRequest, MatchResponse, Profile};

/// Candidates scanned between progress notifications.
const PROGRESS_INTERVAL: usize = 100;

const CHANNEL_CAPACITY: usize = 64;

/// The matching engine: scores one query against a reference collection on
/// a dedicated worker task.
///
/// Communication is message passing only: a request in, zero or more
/// `Progress` messages, then exactly one terminal `Complete` or `Error`.
/// The scan itself is single-threaded; callers are expected to serialize
/// runs per engine use. Dropping the receiver stops the worker at its next
/// send.
pub struct MatchEngine;

impl MatchEngine {
    pub fn spawn(request: MatchRequest) -> mpsc::Receiver<MatchResponse> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(run(request, tx));
        rx
    }
}

async fn run(request: MatchRequest, tx: mpsc::Sender<MatchResponse>) {
    match scan(&request, &tx).await {
        Ok(Some(matches)) => {
            log::debug!("Matching run complete: {} matches", matches.len());
            let _ = tx.send(MatchResponse::Complete { matches }).await;
        }
        // receiver dropped mid-run: nobody is listening, stop quietly
        Ok(None) => log::debug!("Matching run abandoned by caller"),
        Err(err) => {
            log::warn!("Matching run failed: {err}");
            let _ = tx
                .send(MatchResponse::Error {
                    message: err.to_string(),
                })
                .await;
        }
    }
}

/// Scan the reference collection. `Ok(None)` means the caller went away.
async fn scan(
    request: &MatchRequest,
    tx: &mpsc::Sender<MatchResponse>,
) -> Result<Option<Vec<Match>>, MatchError> {
    if request.max_matches == 0 {
        return Err(MatchError::InvalidRequest(
            "max_matches must be at least 1".to_string(),
        ));
    }

    // The effective query for the whole run: tier-prefix markers with
    // non-empty values.
    let query_markers: BTreeMap<Marker, String> = request
        .tier
        .marker_ids()
        .filter_map(|m| {
            request
                .query
                .marker_value(m)
                .map(|v| (m, v.to_string()))
        })
        .collect();
    let query = Profile {
        markers: query_markers,
        ..request.query.clone()
    };

    let total = request.database.len();
    let mut matches: Vec<Match> = Vec::new();

    for (scanned, candidate) in request.database.iter().enumerate() {
        if let Some(m) = score_candidate(&query, candidate, request) {
            matches.push(m);
        }

        let scanned = scanned + 1;
        if scanned % PROGRESS_INTERVAL == 0 {
            let percent = scanned as f64 / total as f64 * 100.0;
            if tx.send(MatchResponse::Progress { percent }).await.is_err() {
                return Ok(None);
            }
        }
    }

    // Stable sort: equal distances keep reference-collection order.
    matches.sort_by_key(|m| m.result.distance);
    matches.truncate(request.max_matches);
    Ok(Some(matches))
}

fn score_candidate(query: &Profile, candidate: &Profile, request: &MatchRequest) -> Option<Match> {
    if candidate.kit_number == query.kit_number {
        return None;
    }

    // Restrict the candidate to the markers the query supplies.
    let candidate_markers: BTreeMap<Marker, String> = query
        .markers
        .keys()
        .filter_map(|m| candidate.marker_value(*m).map(|v| (*m, v.to_string())))
        .collect();

    // Coverage gate: the candidate must supply a value for every marker the
    // query supplies. Independent of the eligibility threshold below.
    if candidate_markers.len() < query.markers.len() {
        return None;
    }

    let restricted = Profile {
        markers: candidate_markers,
        ..candidate.clone()
    };
    let result = genetic_distance(query, &restricted, request.tier);
    if !result.has_all_required_markers || result.distance > request.max_distance {
        return None;
    }

    Some(Match {
        profile: candidate.clone(),
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ystr_catalog::Tier;

    fn marker(name: &str) -> Marker {
        Marker::from_name(name).unwrap()
    }

    /// A profile with every tier-12 marker set; `offset` shifts DYS393.
    fn tier12_profile(kit: &str, offset: i32) -> Profile {
        let mut p = Profile::new(kit);
        for m in Tier::Y12.marker_ids() {
            let value = if m == marker("DYS385") {
                "11-14".to_string()
            } else {
                "13".to_string()
            };
            p.set_marker(m, value);
        }
        if offset != 0 {
            p.set_marker(marker("DYS393"), (13 + offset).to_string());
        }
        p
    }

    async fn collect(mut rx: mpsc::Receiver<MatchResponse>) -> Vec<MatchResponse> {
        let mut out = Vec::new();
        while let Some(msg) = rx.recv().await {
            out.push(msg);
        }
        out
    }

    fn request(database: Vec<Profile>, max_distance: u32, max_matches: usize) -> MatchRequest {
        MatchRequest {
            query: tier12_profile("QUERY", 0),
            database,
            tier: Tier::Y12,
            max_distance,
            max_matches,
        }
    }

    #[tokio::test]
    async fn complete_is_terminal_and_sorted() {
        let database = vec![
            tier12_profile("C-2", 2),
            tier12_profile("A-0", 0),
            tier12_profile("B-1", 1),
        ];
        let responses = collect(MatchEngine::spawn(request(database, 10, 10))).await;

        let MatchResponse::Complete { matches } = responses.last().unwrap() else {
            panic!("expected terminal complete");
        };
        let kits: Vec<&str> = matches.iter().map(|m| m.profile.kit_number.as_str()).collect();
        assert_eq!(kits, vec!["A-0", "B-1", "C-2"]);
        let distances: Vec<u32> = matches.iter().map(|m| m.result.distance).collect();
        assert_eq!(distances, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn equal_distances_keep_collection_order() {
        let database = vec![
            tier12_profile("Z-LAST", 1),
            tier12_profile("M-MID", 1),
            tier12_profile("A-FIRST", 1),
        ];
        let responses = collect(MatchEngine::spawn(request(database, 10, 10))).await;

        let MatchResponse::Complete { matches } = responses.last().unwrap() else {
            panic!("expected terminal complete");
        };
        let kits: Vec<&str> = matches.iter().map(|m| m.profile.kit_number.as_str()).collect();
        assert_eq!(kits, vec!["Z-LAST", "M-MID", "A-FIRST"]);
    }

    #[tokio::test]
    async fn query_kit_is_excluded() {
        let database = vec![tier12_profile("QUERY", 0), tier12_profile("A-0", 0)];
        let responses = collect(MatchEngine::spawn(request(database, 10, 10))).await;

        let MatchResponse::Complete { matches } = responses.last().unwrap() else {
            panic!("expected terminal complete");
        };
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].profile.kit_number, "A-0");
    }

    #[tokio::test]
    async fn coverage_gate_rejects_sparse_candidates() {
        // candidate shares only 8 of the query's 11 tier-12 markers
        let mut sparse = tier12_profile("SPARSE", 0);
        for name in ["DYS392", "DYS389i", "DYS389ii"] {
            sparse.markers.remove(&marker(name));
        }
        let database = vec![sparse, tier12_profile("FULL", 0)];
        let responses = collect(MatchEngine::spawn(request(database, 10, 10))).await;

        let MatchResponse::Complete { matches } = responses.last().unwrap() else {
            panic!("expected terminal complete");
        };
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].profile.kit_number, "FULL");
    }

    #[tokio::test]
    async fn max_distance_and_cap_are_enforced() {
        let database: Vec<Profile> = (0..5).map(|i| tier12_profile(&format!("K-{i}"), i)).collect();
        let responses = collect(MatchEngine::spawn(request(database, 1, 2))).await;

        let MatchResponse::Complete { matches } = responses.last().unwrap() else {
            panic!("expected terminal complete");
        };
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.result.distance <= 1));
        assert!(matches.iter().all(|m| m.result.has_all_required_markers));
    }

    #[tokio::test]
    async fn progress_is_emitted_every_hundred_candidates() {
        let database: Vec<Profile> =
            (0..250).map(|i| tier12_profile(&format!("K-{i}"), 0)).collect();
        let responses = collect(MatchEngine::spawn(request(database, 10, 5))).await;

        let percents: Vec<f64> = responses
            .iter()
            .filter_map(|r| match r {
                MatchResponse::Progress { percent } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![40.0, 80.0]);
        assert!(matches!(responses.last(), Some(MatchResponse::Complete { .. })));
    }

    #[tokio::test]
    async fn zero_max_matches_is_an_error() {
        let responses =
            collect(MatchEngine::spawn(request(vec![tier12_profile("A", 0)], 10, 0))).await;
        assert_eq!(responses.len(), 1);
        let MatchResponse::Error { message } = &responses[0] else {
            panic!("expected error");
        };
        assert!(message.contains("max_matches"));
    }

    #[tokio::test]
    async fn empty_database_completes_with_no_matches() {
        let responses = collect(MatchEngine::spawn(request(Vec::new(), 10, 10))).await;
        assert_eq!(responses.len(), 1);
        let MatchResponse::Complete { matches } = &responses[0] else {
            panic!("expected complete");
        };
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn malformed_candidates_are_skipped_not_fatal() {
        let database = vec![Profile::new("EMPTY"), tier12_profile("A-0", 0)];
        let responses = collect(MatchEngine::spawn(request(database, 10, 10))).await;

        let MatchResponse::Complete { matches } = responses.last().unwrap() else {
            panic!("expected terminal complete");
        };
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].profile.kit_number, "A-0");
    }
}
