use ystr_catalog::{Marker, Tier};
use ystr_protocol::{GeneticDistance, Profile};

/// Per-marker contribution ceiling. A single mutated marker, however far
/// off, never adds more than this to the aggregate distance.
const MARKER_DIFFERENCE_CAP: u64 = 2;

/// Difference between two values of one marker, or `None` when the pair is
/// not comparable (unparseable values, sub-value count mismatch).
///
/// Single-copy markers contribute `min(|a - b|, 2)`. Multi-copy markers sum
/// the per-copy differences and apply the same cap once to the whole
/// marker.
pub fn marker_difference(value1: &str, value2: &str, marker: Marker) -> Option<u32> {
    let Some(arity) = marker.multi_copy_arity() else {
        let v1: i64 = value1.trim().parse().ok()?;
        let v2: i64 = value2.trim().parse().ok()?;
        return Some(v1.abs_diff(v2).min(MARKER_DIFFERENCE_CAP) as u32);
    };

    let parts1: Vec<&str> = value1.split(['-', ',']).collect();
    let parts2: Vec<&str> = value2.split(['-', ',']).collect();
    if parts1.len() != arity || parts2.len() != arity {
        return None;
    }

    let mut total: u64 = 0;
    for (a, b) in parts1.iter().zip(parts2.iter()) {
        let a: i64 = a.trim().parse().ok()?;
        let b: i64 = b.trim().parse().ok()?;
        total += a.abs_diff(b);
    }
    Some(total.min(MARKER_DIFFERENCE_CAP) as u32)
}

/// Score two profiles over one tier's marker prefix.
///
/// Markers either profile lacks, and marker pairs that are not comparable,
/// are skipped without counting. Pure and symmetric in the two profiles.
pub fn genetic_distance(profile1: &Profile, profile2: &Profile, tier: Tier) -> GeneticDistance {
    let mut distance: u32 = 0;
    let mut compared: usize = 0;
    let mut identical: usize = 0;

    for marker in tier.marker_ids() {
        let (Some(value1), Some(value2)) =
            (profile1.marker_value(marker), profile2.marker_value(marker))
        else {
            continue;
        };

        let Some(diff) = marker_difference(value1, value2, marker) else {
            continue;
        };

        compared += 1;
        distance += diff;
        if diff == 0 {
            identical += 1;
        }
    }

    let percent_identical = if compared > 0 {
        identical as f64 / compared as f64 * 100.0
    } else {
        0.0
    };

    GeneticDistance {
        distance,
        compared_markers: compared,
        identical_markers: identical,
        percent_identical,
        has_all_required_markers: compared >= tier.min_required(),
    }
}
