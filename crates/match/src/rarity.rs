use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ystr_catalog::Marker;
use ystr_protocol::Match;

/// Fewest matches before a rarity percentage is considered meaningful.
const MIN_SAMPLE: usize = 20;

/// Severity identifier for how rare a shared marker value is within a match
/// set, rarest first. The presentation layer maps these to colors; the
/// engine only ever reports the band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RarityBand {
    /// <= 4% of the match set shares the value.
    ExtremelyRare,
    /// <= 8%
    VeryRare,
    /// <= 12%
    Rare,
    /// <= 20%
    Uncommon,
    /// <= 33%; anything more common carries no band at all.
    Notable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerRarity {
    pub percentage: f64,
    pub band: Option<RarityBand>,
}

impl MarkerRarity {
    const NONE: MarkerRarity = MarkerRarity {
        percentage: 0.0,
        band: None,
    };
}

fn band_for(percentage: f64) -> Option<RarityBand> {
    if percentage <= 4.0 {
        Some(RarityBand::ExtremelyRare)
    } else if percentage <= 8.0 {
        Some(RarityBand::VeryRare)
    } else if percentage <= 12.0 {
        Some(RarityBand::Rare)
    } else if percentage <= 20.0 {
        Some(RarityBand::Uncommon)
    } else if percentage <= 33.0 {
        Some(RarityBand::Notable)
    } else {
        None
    }
}

fn rarity_from_count(count: usize, total: usize) -> MarkerRarity {
    let percentage = count as f64 / total as f64 * 100.0;
    if total < MIN_SAMPLE {
        // sample too small for the band to mean anything
        return MarkerRarity {
            percentage,
            band: None,
        };
    }
    MarkerRarity {
        percentage,
        band: band_for(percentage),
    }
}

/// How common `query_value` is at `marker` across a realized match set.
///
/// Rarity is only meaningful where the candidate agrees with the query:
/// an empty or differing `match_value` scores 0 with no band.
pub fn marker_rarity(
    matches: &[Match],
    marker: Marker,
    match_value: &str,
    query_value: &str,
) -> MarkerRarity {
    if matches.is_empty() || match_value.is_empty() || match_value != query_value {
        return MarkerRarity::NONE;
    }

    let count = matches
        .iter()
        .filter(|m| m.profile.marker_value(marker) == Some(query_value))
        .count();
    rarity_from_count(count, matches.len())
}

/// Inverted marker -> value -> count index over one match set.
///
/// Built once per rendered result set so per-cell rarity lookups stay O(1)
/// instead of rescanning the matches for every marker column.
pub struct MatchSetIndex {
    total: usize,
    counts: HashMap<Marker, HashMap<String, usize>>,
}

impl MatchSetIndex {
    pub fn new(matches: &[Match]) -> Self {
        let mut counts: HashMap<Marker, HashMap<String, usize>> = HashMap::new();
        for m in matches {
            for marker in m.profile.markers.keys() {
                if let Some(value) = m.profile.marker_value(*marker) {
                    *counts
                        .entry(*marker)
                        .or_default()
                        .entry(value.to_string())
                        .or_insert(0) += 1;
                }
            }
        }
        Self {
            total: matches.len(),
            counts,
        }
    }

    pub fn value_count(&self, marker: Marker, value: &str) -> usize {
        self.counts
            .get(&marker)
            .and_then(|values| values.get(value))
            .copied()
            .unwrap_or(0)
    }

    /// Same contract as [`marker_rarity`], answered from the index.
    pub fn rarity(&self, marker: Marker, match_value: &str, query_value: &str) -> MarkerRarity {
        if self.total == 0 || match_value.is_empty() || match_value != query_value {
            return MarkerRarity::NONE;
        }
        rarity_from_count(self.value_count(marker, query_value), self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ystr_protocol::{GeneticDistance, Profile};

    fn marker(name: &str) -> Marker {
        Marker::from_name(name).unwrap()
    }

    fn match_with_value(kit: &str, value: Option<&str>) -> Match {
        let mut profile = Profile::new(kit);
        if let Some(value) = value {
            profile.set_marker(marker("DYS393"), value);
        }
        Match {
            profile,
            result: GeneticDistance {
                distance: 0,
                compared_markers: 12,
                identical_markers: 12,
                percent_identical: 100.0,
                has_all_required_markers: true,
            },
        }
    }

    fn match_set(sharing: usize, total: usize) -> Vec<Match> {
        (0..total)
            .map(|i| {
                let value = if i < sharing { Some("13") } else { Some("14") };
                match_with_value(&format!("K-{i}"), value)
            })
            .collect()
    }

    #[test]
    fn differing_value_scores_zero() {
        let matches = match_set(10, 25);
        let r = marker_rarity(&matches, marker("DYS393"), "14", "13");
        assert_eq!(r, MarkerRarity { percentage: 0.0, band: None });
        let r = marker_rarity(&matches, marker("DYS393"), "", "13");
        assert_eq!(r.band, None);
    }

    #[test]
    fn small_sample_has_percentage_but_no_band() {
        let matches = match_set(1, 10);
        let r = marker_rarity(&matches, marker("DYS393"), "13", "13");
        assert_eq!(r.percentage, 10.0);
        assert_eq!(r.band, None);
    }

    #[test]
    fn twelve_percent_of_twenty_five_lands_mid_band() {
        // 3 of 25 matches share the value: 12%, mid band
        let matches = match_set(3, 25);
        let r = marker_rarity(&matches, marker("DYS393"), "13", "13");
        assert_eq!(r.percentage, 12.0);
        assert_eq!(r.band, Some(RarityBand::Rare));
    }

    #[test]
    fn band_thresholds() {
        let cases = [
            (1, 25, Some(RarityBand::ExtremelyRare)), // 4%
            (2, 25, Some(RarityBand::VeryRare)),      // 8%
            (3, 25, Some(RarityBand::Rare)),          // 12%
            (5, 25, Some(RarityBand::Uncommon)),      // 20%
            (8, 25, Some(RarityBand::Notable)),       // 32%
            (10, 25, None),                           // 40%: too common
        ];
        for (sharing, total, expected) in cases {
            let matches = match_set(sharing, total);
            let r = marker_rarity(&matches, marker("DYS393"), "13", "13");
            assert_eq!(r.band, expected, "{sharing}/{total}");
        }
    }

    #[test]
    fn index_agrees_with_direct_scan() {
        let matches = match_set(3, 25);
        let index = MatchSetIndex::new(&matches);
        assert_eq!(index.value_count(marker("DYS393"), "13"), 3);
        assert_eq!(index.value_count(marker("DYS393"), "14"), 22);
        assert_eq!(index.value_count(marker("DYS390"), "24"), 0);

        let direct = marker_rarity(&matches, marker("DYS393"), "13", "13");
        let indexed = index.rarity(marker("DYS393"), "13", "13");
        assert_eq!(indexed, direct);
    }

    #[test]
    fn empty_match_set_scores_zero() {
        let r = marker_rarity(&[], marker("DYS393"), "13", "13");
        assert_eq!(r, MarkerRarity { percentage: 0.0, band: None });
    }
}
