/// Errors surfaced while constructing or running the output connector.
///
/// Delivery failures are reported through the event bus rather than through
/// this type; once a batch is handed to the flusher, errors no longer
/// propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid filter pattern `{pattern}` in group {group}: {source}")]
    InvalidFilter {
        group: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to compress payload: {0}")]
    Compression(#[from] std::io::Error),

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}
