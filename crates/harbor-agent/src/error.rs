use thiserror::Error;

/// Remote-call failure. Callers treat every variant the same way: log it,
/// clear any in-flight flag, keep whatever data they already had.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend error: {0}")]
    Backend(String),
}
