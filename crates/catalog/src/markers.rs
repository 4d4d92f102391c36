use once_cell::sync::Lazy;
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Canonical Y-STR marker panel in historical testing order.
///
/// The order is a fixed convention shared by every data source this tool
/// ingests; tier boundaries below are defined by *named* markers inside this
/// sequence, not by raw indices.
pub const MARKERS: [&str; 102] = [
    "DYS393", "DYS390", "DYS19", "DYS391", "DYS385",
    "DYS426", "DYS388", "DYS439", "DYS389i", "DYS392",
    "DYS389ii", "DYS458", "DYS459", "DYS455", "DYS454",
    "DYS447", "DYS437", "DYS448", "DYS449", "DYS464",
    "DYS460", "Y-GATA-H4", "YCAII", "DYS456", "DYS607",
    "DYS576", "DYS570", "CDY", "DYS442", "DYS438",
    "DYS531", "DYS578", "DYF395S1", "DYS590", "DYS537",
    "DYS641", "DYS472", "DYF406S1", "DYS511", "DYS425",
    "DYS413", "DYS557", "DYS594", "DYS436", "DYS490",
    "DYS534", "DYS450", "DYS444", "DYS481", "DYS520",
    "DYS446", "DYS617", "DYS568", "DYS487", "DYS572",
    "DYS640", "DYS492", "DYS565", "DYS710", "DYS485",
    "DYS632", "DYS495", "DYS540", "DYS714", "DYS716",
    "DYS717", "DYS505", "DYS556", "DYS549", "DYS589",
    "DYS522", "DYS494", "DYS533", "DYS636", "DYS575",
    "DYS638", "DYS462", "DYS452", "DYS445", "Y-GATA-A10",
    "DYS463", "DYS441", "Y-GGAAT-1B07", "DYS525", "DYS712",
    "DYS593", "DYS650", "DYS532", "DYS715", "DYS504",
    "DYS513", "DYS561", "DYS552", "DYS726", "DYS635",
    "DYS587", "DYS643", "DYS497", "DYS510", "DYS434",
    "DYS461", "DYS435",
];

/// Multi-copy ("palindromic") markers and their sub-value count.
///
/// These report several hyphen-separated repeat counts instead of one.
const MULTI_COPY: [(&str, usize); 7] = [
    ("DYS385", 2),
    ("DYS464", 4),
    ("DYS459", 2),
    ("YCAII", 2),
    ("CDY", 2),
    ("DYF395S1", 2),
    ("DYS413", 2),
];

static MARKER_INDEX: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    MARKERS
        .iter()
        .enumerate()
        .map(|(idx, name)| (*name, idx as u8))
        .collect()
});

/// A marker identifier drawn from the closed catalog enumeration.
///
/// Profile maps are keyed by `Marker` rather than free-form strings so a
/// misspelled source column cannot silently create an unscorable marker.
/// Serializes as the marker name, so persisted profiles stay ordinary JSON
/// objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Marker(u8);

impl Marker {
    /// Look up a marker by its exact catalog name.
    pub fn from_name(name: &str) -> Option<Self> {
        MARKER_INDEX.get(name).map(|idx| Marker(*idx))
    }

    pub fn name(&self) -> &'static str {
        MARKERS[self.0 as usize]
    }

    /// Position in the canonical panel order.
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Sub-value count for multi-copy markers, `None` for single-copy ones.
    pub fn multi_copy_arity(&self) -> Option<usize> {
        let name = self.name();
        MULTI_COPY
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, arity)| *arity)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Marker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

struct MarkerVisitor;

impl Visitor<'_> for MarkerVisitor {
    type Value = Marker;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a catalog marker name")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Marker, E> {
        Marker::from_name(value)
            .ok_or_else(|| E::custom(format!("unknown marker: {value}")))
    }
}

impl<'de> Deserialize<'de> for Marker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(MarkerVisitor)
    }
}

/// Standard comparison panel sizes. Each tier is a prefix of [`MARKERS`]
/// bounded by a named terminal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Y12,
    Y37,
    Y67,
    Y111,
}

static TIER_BOUNDS: Lazy<[usize; 4]> = Lazy::new(|| {
    let bound = |terminal: &str| {
        MARKERS
            .iter()
            .position(|m| *m == terminal)
            .expect("tier terminal marker present in catalog")
    };
    [
        bound("DYS389ii"),
        bound("DYS438"),
        bound("DYS492"),
        MARKERS.len() - 1,
    ]
});

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Y12, Tier::Y37, Tier::Y67, Tier::Y111];

    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            12 => Some(Tier::Y12),
            37 => Some(Tier::Y37),
            67 => Some(Tier::Y67),
            111 => Some(Tier::Y111),
            _ => None,
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            Tier::Y12 => 12,
            Tier::Y37 => 37,
            Tier::Y67 => 67,
            Tier::Y111 => 111,
        }
    }

    /// Marker name ending this tier's prefix (inclusive).
    pub fn terminal_marker(&self) -> &'static str {
        MARKERS[self.boundary_index()]
    }

    fn boundary_index(&self) -> usize {
        let slot = match self {
            Tier::Y12 => 0,
            Tier::Y37 => 1,
            Tier::Y67 => 2,
            Tier::Y111 => 3,
        };
        TIER_BOUNDS[slot]
    }

    /// The tier's ordered marker prefix, up to and including the terminal
    /// marker.
    pub fn markers(&self) -> &'static [&'static str] {
        &MARKERS[..=self.boundary_index()]
    }

    /// Iterate the tier's markers as catalog identifiers.
    pub fn marker_ids(&self) -> impl Iterator<Item = Marker> {
        (0..=self.boundary_index() as u8).map(Marker)
    }

    /// Minimum compared markers for a result to be eligible at this tier.
    pub fn min_required(&self) -> usize {
        match self {
            Tier::Y12 => 10,
            _ => 25,
        }
    }

    /// Default genetic-distance ceiling used when the caller gives none.
    pub fn default_max_distance(&self) -> u32 {
        match self {
            Tier::Y12 => 5,
            Tier::Y37 => 25,
            Tier::Y67 => 35,
            Tier::Y111 => 50,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

impl Serialize for Tier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.count())
    }
}

struct TierVisitor;

impl Visitor<'_> for TierVisitor {
    type Value = Tier;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a marker panel size (12, 37, 67 or 111)")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Tier, E> {
        u32::try_from(value)
            .ok()
            .and_then(Tier::from_count)
            .ok_or_else(|| E::custom(format!("unknown panel size: {value}")))
    }
}

impl<'de> Deserialize<'de> for Tier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_u64(TierVisitor)
    }
}
