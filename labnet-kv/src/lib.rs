//! A versioned key/value service running over the simulated network, with a
//! retrying clerk and a lock built on top of it.

pub mod clerk;
pub mod lock;
pub mod rpc;
pub mod server;

pub use clerk::{Clerk, KvClerk};
pub use lock::Lock;
pub use rpc::{GetArgs, GetReply, KvStatus, PutArgs, PutReply, Version};
pub use server::KvServer;
