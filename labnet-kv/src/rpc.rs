use serde::{Deserialize, Serialize};

pub type Version = u64;

/// Status carried in every key/value reply.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KvStatus {
    #[default]
    Ok,
    /// The key does not exist.
    NoKey,
    /// The version in a `Put` did not match the stored one.
    Version,
    /// A retried `Put` saw `Version`: the first attempt may or may not have
    /// been applied. Only the clerk produces this; servers never do.
    Maybe,
    /// Reserved for replicated servers that are not the leader.
    WrongLeader,
}

impl std::fmt::Display for KvStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KvStatus::Ok => "OK",
            KvStatus::NoKey => "ErrNoKey",
            KvStatus::Version => "ErrVersion",
            KvStatus::Maybe => "ErrMaybe",
            KvStatus::WrongLeader => "ErrWrongLeader",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutArgs {
    pub key: String,
    pub value: String,
    pub version: Version,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutReply {
    pub err: KvStatus,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetArgs {
    pub key: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReply {
    pub value: String,
    pub version: Version,
    pub err: KvStatus,
}
