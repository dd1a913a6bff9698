use labnet_common::EndName;
use thiserror::Error;

/// Misuse of the network's end-point table.
///
/// These are wiring bugs in the code configuring the network. The panicking
/// forms (`make_end`, `delete_end`) turn them into process faults.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("client end {0} already exists")]
    DuplicateEnd(EndName),

    #[error("client end {0} doesn't exist")]
    UnknownEnd(EndName),
}
