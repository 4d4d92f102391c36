use crate::markers::Marker;
use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use std::num::NonZeroUsize;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Raw source cells carry copy-paste noise: non-breaking spaces, zero-width
/// characters, BOMs and stray whitespace inside the value.
fn strip_invisible(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '\u{00a0}' | '\u{200b}'..='\u{200d}' | '\u{feff}'))
        .collect()
}

/// Clean a raw marker value: trim, strip invisible characters and remove all
/// interior whitespace. Empty input yields an empty string.
pub fn clean(raw: &str) -> String {
    let stripped = strip_invisible(raw.trim());
    WHITESPACE.replace_all(&stripped, "").into_owned()
}

/// Clean an identity field (kit number, name, country, haplogroup):
/// invisible characters are stripped and interior whitespace collapses to a
/// single space instead of disappearing.
pub fn clean_text(raw: &str) -> String {
    let stripped = strip_invisible(raw.trim());
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Canonicalize a multi-copy marker value: split on `-` or `,`, clean each
/// sub-value, sort ascending numerically and rejoin with `-`.
///
/// If `marker` is single-copy, or the split does not match the registered
/// sub-value count, the input is returned unchanged (no repair attempted).
/// Idempotent: canonicalizing a canonical value is a no-op.
pub fn canonicalize_multi_copy(value: &str, marker: Marker) -> String {
    let Some(arity) = marker.multi_copy_arity() else {
        return value.to_string();
    };

    let parts: Vec<&str> = value.split(['-', ',']).collect();
    if parts.len() != arity {
        return value.to_string();
    }

    let mut cleaned: Vec<String> = parts.into_iter().map(clean).collect();
    // Stable sort: unparseable sub-values sink to the end in input order.
    cleaned.sort_by_key(|v| match v.parse::<i64>() {
        Ok(n) => (false, n),
        Err(_) => (true, 0),
    });
    cleaned.join("-")
}

/// Bounded memo over [`clean`] for the hot ingestion path.
///
/// Raw cell values repeat heavily across rows (repeat counts cluster in a
/// narrow range), so the cache hit rate is high. Purely an optimization:
/// results are identical with or without it.
pub struct CleanCache {
    cache: LruCache<String, String>,
}

const CLEAN_CACHE_CAPACITY: usize = 10_000;

impl CleanCache {
    pub fn new() -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(CLEAN_CACHE_CAPACITY).expect("nonzero capacity"),
            ),
        }
    }

    pub fn clean(&mut self, raw: &str) -> String {
        if let Some(hit) = self.cache.get(raw) {
            return hit.clone();
        }
        let cleaned = clean(raw);
        self.cache.put(raw.to_string(), cleaned.clone());
        cleaned
    }
}

impl Default for CleanCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn marker(name: &str) -> Marker {
        Marker::from_name(name).unwrap()
    }

    #[test]
    fn clean_strips_noise() {
        assert_eq!(clean("  13 "), "13");
        assert_eq!(clean("1\u{00a0}3"), "13");
        assert_eq!(clean("\u{feff}14\u{200b}"), "14");
        assert_eq!(clean("1 4"), "14");
        assert_eq!(clean(""), "");
        assert_eq!(clean("   "), "");
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  John   Smith "), "John Smith");
        assert_eq!(clean_text("Kit\u{00a0}123"), "Kit123");
    }

    #[test]
    fn canonicalize_sorts_sub_values() {
        assert_eq!(canonicalize_multi_copy("14-11", marker("DYS385")), "11-14");
        assert_eq!(canonicalize_multi_copy("11,14", marker("DYS385")), "11-14");
        assert_eq!(
            canonicalize_multi_copy("17-15-16-15", marker("DYS464")),
            "15-15-16-17"
        );
    }

    #[test]
    fn canonicalize_rejects_wrong_arity() {
        // 3 sub-values against a 2-copy marker: leave it alone
        assert_eq!(
            canonicalize_multi_copy("11-14-15", marker("DYS385")),
            "11-14-15"
        );
        assert_eq!(canonicalize_multi_copy("11", marker("DYS385")), "11");
    }

    #[test]
    fn canonicalize_ignores_single_copy_markers() {
        assert_eq!(canonicalize_multi_copy("13", marker("DYS393")), "13");
        // even when the value looks splittable
        assert_eq!(canonicalize_multi_copy("13-14", marker("DYS393")), "13-14");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let cases = [
            ("14-11", "DYS385"),
            ("17,15,16,15", "DYS464"),
            ("11-14-15", "DYS385"),
            ("13", "DYS393"),
        ];
        for (value, name) in cases {
            let once = canonicalize_multi_copy(value, marker(name));
            let twice = canonicalize_multi_copy(&once, marker(name));
            assert_eq!(twice, once, "not idempotent for {value}");
        }
    }

    #[test]
    fn cache_matches_plain_clean() {
        let mut cache = CleanCache::new();
        for raw in ["  13 ", "1\u{00a0}3", "  13 ", "14"] {
            assert_eq!(cache.clean(raw), clean(raw));
        }
    }
}
