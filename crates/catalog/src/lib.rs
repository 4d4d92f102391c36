//! # ystr-catalog
//!
//! Static Y-STR marker catalog and raw-value normalization.
//!
//! The catalog is the closed vocabulary the rest of the workspace is keyed
//! by: an ordered 111-marker panel, four nested comparison tiers bounded by
//! named terminal markers, and the registry of multi-copy markers with
//! their sub-value counts. Built once at process start, shared by
//! reference, never mutated.

mod markers;
mod normalize;

pub use markers::{Marker, Tier, MARKERS};
pub use normalize::{canonicalize_multi_copy, clean, clean_text, CleanCache};
