//! Engine errors

use thiserror::Error;

/// Errors raised while building an engine or loading rules.
///
/// Matching itself never fails.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cache capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    #[error("failed to read rules: {0}")]
    Io(#[from] std::io::Error),
}
