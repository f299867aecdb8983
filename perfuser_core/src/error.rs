use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("link error: {0}")]
    Link(String),
    #[error("timeout waiting for pump reply")]
    Timeout,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing pump link")]
    MissingLink,
    #[error("missing isolation valve")]
    MissingValve,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Map a trait-boundary error to a typed `CoreError`.
///
/// The seams in `perfuser_traits` return `Box<dyn Error + Send + Sync>`
/// for flexibility; timeouts are detected by message so drivers do not
/// need a shared error type.
pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> CoreError {
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CoreError::Timeout
    } else {
        CoreError::Link(s)
    }
}
