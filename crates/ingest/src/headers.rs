use csv::StringRecord;
use ystr_catalog::Marker;

pub const KIT_NUMBER: &str = "Kit Number";
pub const NAME: &str = "Name";
pub const COUNTRY: &str = "Country";
pub const HAPLOGROUP: &str = "Haplogroup";

/// Normalize one raw header cell: strip the BOM, drop characters outside
/// printable ASCII, collapse whitespace, and unify the known kit-number
/// aliases.
pub fn normalize_header(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| (' '..='~').contains(c))
        .collect();

    let mut collapsed = String::with_capacity(cleaned.len());
    let mut last_was_space = false;
    for c in cleaned.chars() {
        if c.is_whitespace() {
            if !last_was_space && !collapsed.is_empty() {
                collapsed.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed.push(c);
            last_was_space = false;
        }
    }
    let collapsed = collapsed.trim_end().to_string();

    match collapsed.as_str() {
        "KitNumber" | "Kit_Number" => KIT_NUMBER.to_string(),
        _ => collapsed,
    }
}

/// Column layout of one delimited source, resolved from its header row.
///
/// Identity columns are matched by name; every remaining header that names
/// a catalog marker becomes that marker's column. Unknown headers are
/// ignored, so a misspelled marker column silently drops out instead of
/// polluting profiles.
#[derive(Debug)]
pub struct HeaderMap {
    pub kit_number: Option<usize>,
    pub name: Option<usize>,
    pub country: Option<usize>,
    pub haplogroup: Option<usize>,
    pub markers: Vec<(usize, Marker)>,
}

impl HeaderMap {
    pub fn from_record(headers: &StringRecord) -> Self {
        let mut map = HeaderMap {
            kit_number: None,
            name: None,
            country: None,
            haplogroup: None,
            markers: Vec::new(),
        };

        for (idx, raw) in headers.iter().enumerate() {
            let header = normalize_header(raw);
            match header.as_str() {
                KIT_NUMBER => map.kit_number = Some(idx),
                NAME => map.name = Some(idx),
                COUNTRY => map.country = Some(idx),
                HAPLOGROUP => map.haplogroup = Some(idx),
                other => {
                    if let Some(marker) = Marker::from_name(other) {
                        map.markers.push((idx, marker));
                    }
                }
            }
        }

        if map.kit_number.is_none() {
            log::warn!("Source has no kit-number column; every row will be rejected");
        }
        map
    }
}
