use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use labnet_rpc::Service;
use tracing::debug;

use crate::rpc::{GetArgs, GetReply, KvStatus, PutArgs, PutReply, Version};

/// Single-node key/value store where every key carries a version.
///
/// Versions make `Put` conditional: a write only lands when the writer has
/// seen the latest value, which lets clients build retries and locks without
/// any server-side session state.
#[derive(Debug, Default)]
pub struct KvServer {
    // key -> (value, version)
    store: Mutex<HashMap<String, (String, Version)>>,
}

impl KvServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// RPC surface: `KvServer.Get` and `KvServer.Put`.
    pub fn service(self: &Arc<Self>) -> Service {
        Service::for_receiver(Arc::clone(self))
            .method("Get", KvServer::get)
            .method("Put", KvServer::put)
            .build()
    }

    /// Returns the value and version for `args.key`, or `NoKey`.
    pub fn get(&self, args: GetArgs, reply: &mut GetReply) {
        let store = self.store.lock().unwrap();
        match store.get(&args.key) {
            Some((value, version)) => {
                reply.value = value.clone();
                reply.version = *version;
                reply.err = KvStatus::Ok;
            }
            None => reply.err = KvStatus::NoKey,
        }
    }

    /// Installs `args.value` if `args.version` matches the stored version,
    /// bumping the version. A missing key is created only by version 0.
    pub fn put(&self, args: PutArgs, reply: &mut PutReply) {
        let mut store = self.store.lock().unwrap();
        reply.err = match store.get_mut(&args.key) {
            Some((value, version)) if *version == args.version => {
                *value = args.value;
                *version += 1;
                KvStatus::Ok
            }
            Some(_) => KvStatus::Version,
            None if args.version == 0 => {
                store.insert(args.key.clone(), (args.value, 1));
                KvStatus::Ok
            }
            None => KvStatus::NoKey,
        };
        debug!("put {} v{} -> {}", args.key, args.version, reply.err);
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
