pub mod auth;
pub mod goals;
pub mod profiles;
pub mod rest;

/// Error code the data API uses when a single-row request matched nothing.
pub const NO_ROWS_CODE: &str = "PGRST116";

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Unexpected response from {0}: {1}")]
    Decode(String, String),
    #[error("No rows returned from {0}")]
    NotFound(String),
    #[error("Expected at most one row from {0}, got {1}")]
    Ambiguous(String, usize),
}
