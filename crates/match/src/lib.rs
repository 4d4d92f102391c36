//! # ystr-match
//!
//! Genetic-distance scoring and the matching engine.
//!
//! ## Pipeline
//!
//! ```text
//! MatchRequest
//!     │
//!     ├──> effective query (tier prefix, non-empty markers)
//!     │
//!     ├──> per candidate: coverage gate ──> distance ──> eligibility
//!     │
//!     └──> stable sort by distance, truncate
//!            └─> Progress / Complete / Error messages
//! ```
//!
//! The engine runs on a dedicated task and speaks only through its response
//! channel; see [`MatchEngine`].

mod distance;
mod engine;
mod error;
mod rarity;

pub use distance::{genetic_distance, marker_difference};
pub use engine::MatchEngine;
pub use error::{MatchError, Result};
pub use rarity::{marker_rarity, MarkerRarity, MatchSetIndex, RarityBand};
