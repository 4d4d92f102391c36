//! # ystr-ingest
//!
//! Streaming ingestion of raw tabular sources into the profile store.
//!
//! ## Pipeline
//!
//! ```text
//! Delimited file / URL            Chunked JSON collection
//!     │                               │
//!     ├──> csv reader (own thread)    ├──> per-chunk fetch (skip on failure)
//!     │      └─> normalize headers    │
//!     ├──> clean + canonicalize rows, dedup first-seen-wins
//!     │
//!     └──> batched store upserts, cooperative yields, progress callbacks
//!            └─> authoritative re-read of the store
//! ```
//!
//! Deduplication is scoped to one run: a later load upserts over whatever
//! the store already holds.

mod chunked;
mod delimited;
mod error;
mod headers;
mod record;
mod stats;

pub use chunked::{load_chunked, ChunkedSource, CHUNK_BATCH_SIZE};
pub use delimited::{load_delimited, DelimitedSource, IngestOptions, DEFAULT_BATCH_SIZE};
pub use error::{IngestError, Result};
pub use headers::{normalize_header, HeaderMap};
pub use record::profile_from_record;
pub use stats::IngestStats;
