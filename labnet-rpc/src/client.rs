//! client.rs
//!
//! A client that can talk to any server by name.
//!
//! Protocol code usually addresses servers, not ends. `Client` keeps one
//! `ClientEnd` per server it has talked to, creating, connecting and enabling
//! it on first use. Partitioning the client disables all of its ends at once.

use std::{collections::HashMap, sync::Mutex};

use labnet_common::{BincodeCodec, Codec, EndName, ServerName};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::{client_end::ClientEnd, network::Network};

pub struct Client<C: Codec = BincodeCodec> {
    id: String,
    net: Network<C>,
    state: Mutex<ClientState<C>>,
}

struct ClientState<C: Codec> {
    ends: HashMap<ServerName, ClientEnd<C>>,
    enabled: bool,
}

impl<C: Codec> Client<C> {
    pub fn new(net: &Network<C>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            net: net.clone(),
            state: Mutex::new(ClientState {
                ends: HashMap::new(),
                enabled: true,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the end this client uses for `server`.
    pub fn end_name(&self, server: &ServerName) -> EndName {
        EndName(format!("{}->{}", self.id, server))
    }

    fn end_for(&self, server: &ServerName) -> ClientEnd<C> {
        let mut state = self.state.lock().unwrap();
        if let Some(end) = state.ends.get(server) {
            return end.clone();
        }

        let name = self.end_name(server);
        let end = self.net.make_end(name.clone());
        self.net.connect(name.clone(), server.clone());
        self.net.enable(name, state.enabled);
        state.ends.insert(server.clone(), end.clone());
        end
    }

    /// Calls `method` on the named server. Same contract as
    /// [`ClientEnd::call`].
    pub async fn call<A, R>(&self, server: impl Into<ServerName>, method: &str, args: &A, reply: &mut R) -> bool
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let end = self.end_for(&server.into());
        end.call(method, args, reply).await
    }

    /// Connects (`true`) or partitions (`false`) every end of this client,
    /// including ends created later.
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.state.lock().unwrap();
        state.enabled = enabled;
        for end in state.ends.values() {
            self.net.enable(end.name(), enabled);
        }
        debug!("client {} enabled={}", self.id, enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    /// Deletes every end this client created.
    pub fn remove(&self) {
        let mut state = self.state.lock().unwrap();
        for (_, end) in state.ends.drain() {
            self.net.delete_end(end.name());
        }
    }
}
