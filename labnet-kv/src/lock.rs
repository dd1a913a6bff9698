use std::{sync::Arc, time::Duration};

use rand::{distributions::Alphanumeric, Rng};
use tracing::debug;

use crate::{clerk::KvClerk, rpc::KvStatus};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Mutual exclusion built from conditional puts on one key. The key holds
/// the holder's id, or the empty string when the lock is free.
pub struct Lock {
    clerk: Arc<dyn KvClerk>,
    key: String,
    id: String,
}

impl Lock {
    pub fn new(clerk: Arc<dyn KvClerk>, key: impl Into<String>) -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        Self {
            clerk,
            key: key.into(),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Blocks until this lock's id is stored under the key.
    pub async fn acquire(&self) {
        loop {
            let (value, version, err) = self.clerk.get(&self.key).await;
            if value == self.id {
                break;
            }
            if err == KvStatus::NoKey || value.is_empty() {
                match self.clerk.put(&self.key, &self.id, version).await {
                    KvStatus::Ok => break,
                    // The next read settles whether our put landed.
                    KvStatus::Maybe => continue,
                    _ => {}
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        debug!("lock {} acquired by {}", self.key, self.id);
    }

    /// Frees the lock if this holder owns it.
    pub async fn release(&self) {
        loop {
            let (value, version, _) = self.clerk.get(&self.key).await;
            if value != self.id {
                break;
            }
            match self.clerk.put(&self.key, "", version).await {
                KvStatus::Ok => break,
                _ => continue,
            }
        }
        debug!("lock {} released by {}", self.key, self.id);
    }
}
