//! Channel-based RPC over a simulated network.
//!
//! The network can lose requests, lose replies, delay and reorder messages,
//! and cut particular client ends off entirely. Nothing touches a real socket.
//!
//! ```text
//! net = Network::new()               -- holds ends, servers, fault settings
//! end = net.make_end("c1")           -- a client end-point
//! net.add_server("s1", server)       -- a named collection of services
//! net.connect("c1", "s1")            -- point the end at a server
//! net.enable("c1", true)             -- ends start disabled
//! end.call("Raft.AppendEntries", &args, &mut reply).await
//! ```
//!
//! `call` returns `true` when the server executed the request and `reply`
//! holds its answer, and `false` when the network lost the request or the
//! reply, or the server is unreachable.

pub mod client;
pub mod client_end;
pub mod config;
pub mod error;
pub mod message;
pub mod network;
pub mod server;
pub mod service;

pub use client::Client;
pub use client_end::ClientEnd;
pub use config::FaultConfig;
pub use error::NetworkError;
pub use labnet_common::{BincodeCodec, Codec, EndName, JsonCodec, ServerName};
pub use message::Reply;
pub use network::Network;
pub use server::Server;
pub use service::{ReceiverService, Service};
