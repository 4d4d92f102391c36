use crate::headers::HeaderMap;
use csv::StringRecord;
use ystr_catalog::{canonicalize_multi_copy, clean_text, CleanCache};
use ystr_protocol::Profile;

fn identity_field(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    let raw = record.get(idx?)?;
    let cleaned = clean_text(raw);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Build a candidate profile from one data row.
///
/// Returns `None` for rows that can never become a profile: empty kit
/// number, or no marker values at all. Duplicate handling is the caller's
/// concern.
pub fn profile_from_record(
    headers: &HeaderMap,
    record: &StringRecord,
    cache: &mut CleanCache,
) -> Option<Profile> {
    let kit_number = identity_field(record, headers.kit_number)?;

    let mut profile = Profile::new(kit_number);
    profile.name = identity_field(record, headers.name);
    profile.country = identity_field(record, headers.country);
    profile.haplogroup = identity_field(record, headers.haplogroup);

    for (idx, marker) in &headers.markers {
        let Some(raw) = record.get(*idx) else {
            continue;
        };
        let cleaned = cache.clean(raw);
        if cleaned.is_empty() {
            continue;
        }
        profile.set_marker(*marker, canonicalize_multi_copy(&cleaned, *marker));
    }

    if profile.markers.is_empty() {
        return None;
    }
    Some(profile)
}
