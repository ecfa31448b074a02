use std::path::PathBuf;
use thiserror::Error;

/// Conditions a caller must tell apart; everything else is `anyhow` context.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("image not found: {}", .0.display())]
    ImageNotFound(PathBuf),
    #[error("text detection failed: {0}")]
    Detection(String),
}
