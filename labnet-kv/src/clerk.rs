use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use labnet_rpc::{Client, ServerName};
use tracing::{debug, trace};

use crate::rpc::{GetArgs, GetReply, KvStatus, PutArgs, PutReply, Version};

pub const RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[async_trait]
pub trait KvClerk: Send + Sync {
    /// Fetches the current value and version of `key`. A missing key yields
    /// `("", 0, NoKey)`.
    async fn get(&self, key: &str) -> (String, Version, KvStatus);

    /// Conditionally writes `value` at `version`.
    async fn put(&self, key: &str, value: &str, version: Version) -> KvStatus;
}

/// Talks to a single `KvServer` and hides lost messages by retrying.
pub struct Clerk {
    client: Arc<Client>,
    server: ServerName,
    retry: Duration,
}

impl Clerk {
    pub fn new(client: Arc<Client>, server: impl Into<ServerName>) -> Self {
        Self {
            client,
            server: server.into(),
            retry: RETRY_INTERVAL,
        }
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    pub fn server(&self) -> &ServerName {
        &self.server
    }
}

#[async_trait]
impl KvClerk for Clerk {
    async fn get(&self, key: &str) -> (String, Version, KvStatus) {
        let args = GetArgs { key: key.to_string() };
        loop {
            let mut reply = GetReply::default();
            if self.client.call(&self.server, "KvServer.Get", &args, &mut reply).await {
                return (reply.value, reply.version, reply.err);
            }
            trace!("clerk {}: Get({}) lost, retrying", self.client.id(), key);
            tokio::time::sleep(self.retry).await;
        }
    }

    async fn put(&self, key: &str, value: &str, version: Version) -> KvStatus {
        let args = PutArgs {
            key: key.to_string(),
            value: value.to_string(),
            version,
        };
        let mut first = true;
        loop {
            let mut reply = PutReply::default();
            if self.client.call(&self.server, "KvServer.Put", &args, &mut reply).await {
                // A retry that sees a version mismatch can't tell whether the
                // earlier attempt was applied and only its reply was lost.
                if reply.err == KvStatus::Version && !first {
                    debug!("clerk {}: Put({}, v{}) is Maybe", self.client.id(), key, version);
                    return KvStatus::Maybe;
                }
                return reply.err;
            }
            first = false;
            trace!("clerk {}: Put({}) lost, retrying", self.client.id(), key);
            tokio::time::sleep(self.retry).await;
        }
    }
}
