use labnet_common::EndName;
use tokio::sync::oneshot;

/// A call travelling from a client end to the router.
#[derive(Debug)]
pub(crate) struct RequestMsg {
    /// Name of the sending end.
    pub end: EndName,
    /// e.g. "Raft.AppendEntries"
    pub method: String,
    /// Type name of the encoded argument, checked against the handler's.
    pub arg_type: &'static str,
    pub args: Vec<u8>,
    pub reply_tx: oneshot::Sender<Reply>,
}

/// Outcome of one call. `bytes` is empty whenever `ok` is false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub ok: bool,
    pub bytes: Vec<u8>,
}

impl Reply {
    pub fn success(bytes: Vec<u8>) -> Self {
        Reply { ok: true, bytes }
    }

    pub fn failure() -> Self {
        Reply { ok: false, bytes: Vec::new() }
    }
}
