use serde::{Deserialize, Serialize};

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Data rows (or chunk records) seen.
    pub rows_read: usize,

    /// Profiles accepted and handed to the store.
    pub accepted: usize,

    /// Rows dropped because their kit number was already seen this run.
    pub duplicates: usize,

    /// Rows dropped for an empty kit number, no marker values, or a parse
    /// failure.
    pub rejected: usize,

    /// Chunked-source only: chunks that failed to fetch or decode.
    pub chunks_failed: usize,

    /// Time taken in milliseconds.
    pub time_ms: u64,

    /// Non-fatal problems encountered along the way.
    pub errors: Vec<String>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }
}
