//! name.rs
//!
//! Opaque names used to address the simulated network.
//!
//! A client end and a server live in separate namespaces, so each gets its
//! own wrapper type. Both are plain `String` newtypes so they can be used as
//! `HashMap` keys and printed directly in logs.

use serde::{Deserialize, Serialize};

/// Name of a client end-point, unique within one network.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndName(pub String);

/// Name under which a server is registered on the network.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerName(pub String);

impl std::fmt::Display for EndName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ServerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EndName {
    fn from(s: &str) -> Self {
        EndName(s.to_string())
    }
}

impl From<String> for EndName {
    fn from(s: String) -> Self {
        EndName(s)
    }
}

impl From<&EndName> for EndName {
    fn from(name: &EndName) -> Self {
        name.clone()
    }
}

impl From<&str> for ServerName {
    fn from(s: &str) -> Self {
        ServerName(s.to_string())
    }
}

impl From<String> for ServerName {
    fn from(s: String) -> Self {
        ServerName(s)
    }
}

impl From<&ServerName> for ServerName {
    fn from(name: &ServerName) -> Self {
        name.clone()
    }
}
