//! # ystr-protocol
//!
//! Shared data types for the matching workspace: canonical profiles, match
//! results and the request/response vocabulary spoken between a caller and
//! the matching engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ystr_catalog::{Marker, Tier};

/// A tested individual's canonical STR profile.
///
/// Identity is the kit number (unique, non-empty, case-sensitive). The
/// marker map is sparse: most profiles carry values for only a subset of the
/// catalog. Multi-copy values are stored canonicalized (sub-values sorted
/// ascending, `-`-joined).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub kit_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haplogroup: Option<String>,
    #[serde(default)]
    pub markers: BTreeMap<Marker, String>,
}

impl Profile {
    pub fn new(kit_number: impl Into<String>) -> Self {
        Self {
            kit_number: kit_number.into(),
            name: None,
            country: None,
            haplogroup: None,
            markers: BTreeMap::new(),
        }
    }

    /// The trimmed value at `marker`, or `None` when absent or empty.
    ///
    /// Scoring and filtering treat absent and empty identically, so this is
    /// the accessor the whole workspace goes through.
    pub fn marker_value(&self, marker: Marker) -> Option<&str> {
        let value = self.markers.get(&marker)?.trim();
        (!value.is_empty()).then_some(value)
    }

    pub fn set_marker(&mut self, marker: Marker, value: impl Into<String>) {
        self.markers.insert(marker, value.into());
    }
}

/// Aggregate outcome of comparing two profiles over one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneticDistance {
    pub distance: u32,
    pub compared_markers: usize,
    pub identical_markers: usize,
    pub percent_identical: f64,
    pub has_all_required_markers: bool,
}

/// One ranked match from an engine run. Derived per run, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub profile: Profile,
    #[serde(flatten)]
    pub result: GeneticDistance,
}

/// One matching run: a query profile scored against a reference collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRequest {
    pub query: Profile,
    pub database: Vec<Profile>,
    pub tier: Tier,
    pub max_distance: u32,
    /// Result cap; must be at least 1.
    pub max_matches: usize,
}

/// Engine-to-caller messages: zero or more `Progress`, then exactly one
/// terminal `Complete` or `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchResponse {
    Progress { percent: f64 },
    Complete { matches: Vec<Match> },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn marker(name: &str) -> Marker {
        Marker::from_name(name).unwrap()
    }

    #[test]
    fn marker_value_treats_blank_as_absent() {
        let mut profile = Profile::new("K-1");
        profile.set_marker(marker("DYS393"), "13");
        profile.set_marker(marker("DYS390"), "  ");

        assert_eq!(profile.marker_value(marker("DYS393")), Some("13"));
        assert_eq!(profile.marker_value(marker("DYS390")), None);
        assert_eq!(profile.marker_value(marker("DYS19")), None);
    }

    #[test]
    fn profile_round_trips_through_json() {
        let mut profile = Profile::new("IN12345");
        profile.name = Some("Smith".to_string());
        profile.set_marker(marker("DYS385"), "11-14");
        profile.set_marker(marker("DYS393"), "13");

        let json = serde_json::to_string(&profile).unwrap();
        let back: Profile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
        // marker keys persist as plain names
        assert!(json.contains("\"DYS385\":\"11-14\""));
    }

    #[test]
    fn responses_are_tagged() {
        let progress = serde_json::to_value(MatchResponse::Progress { percent: 42.0 }).unwrap();
        assert_eq!(progress["type"], "progress");

        let error = serde_json::to_value(MatchResponse::Error {
            message: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "boom");
    }

    #[test]
    fn match_flattens_distance_fields() {
        let m = Match {
            profile: Profile::new("K-2"),
            result: GeneticDistance {
                distance: 3,
                compared_markers: 30,
                identical_markers: 27,
                percent_identical: 90.0,
                has_all_required_markers: true,
            },
        };
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["distance"], 3);
        assert_eq!(value["compared_markers"], 30);
    }
}
