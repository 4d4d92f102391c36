use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Fetch error for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Store error: {0}")]
    Store(#[from] ystr_store::StoreError),

    #[error("No valid profiles found in the data")]
    NoProfiles,

    #[error("Reader thread failed: {0}")]
    Reader(String),
}
