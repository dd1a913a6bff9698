use labnet_kv::KvStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("client {client}: unexpected status {status} for {key}")]
    Unexpected {
        client: usize,
        key: String,
        status: KvStatus,
    },

    #[error("{key}: expected {expected}, found {found:?}")]
    Mismatch {
        key: String,
        expected: usize,
        found: String,
    },

    #[error("{key}: stored counter {value:?} is not a number")]
    Corrupt { key: String, value: String },

    #[error("workload task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
