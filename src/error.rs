use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

/// Failures reported by the rendering engine and its page contexts.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("navigation to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("page error: {0}")]
    Page(String),
}

impl RenderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
