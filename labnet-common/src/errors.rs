use thiserror::Error;

/// Failure to turn a value into bytes or back.
///
/// On the simulated network these always indicate a mismatch between what a
/// caller sends and what a handler expects, never a transient condition.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bincode codec error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
}
