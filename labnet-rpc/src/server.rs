//! server.rs
//!
//! A server is a collection of services sharing one dispatcher, so that e.g.
//! both a Raft service and a key/value service answer on the same endpoint.

use std::{
    collections::HashMap,
    marker::PhantomData,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use labnet_common::{BincodeCodec, Codec};
use tracing::error;

use crate::{message::Reply, service::Service};

pub struct Server<C: Codec = BincodeCodec> {
    services: Mutex<HashMap<String, Arc<Service<C>>>>,
    count: AtomicUsize,
    _codec: PhantomData<fn() -> C>,
}

impl Server<BincodeCodec> {
    pub fn new() -> Self {
        Self::with_codec()
    }
}

impl Default for Server<BincodeCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> Server<C> {
    pub fn with_codec() -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
            count: AtomicUsize::new(0),
            _codec: PhantomData,
        }
    }

    /// Adds (or replaces) a service under its own name.
    pub fn add_service(&self, svc: Service<C>) {
        let mut services = self.services.lock().unwrap();
        services.insert(svc.name().to_string(), Arc::new(svc));
    }

    /// Fluent form of [`Server::add_service`].
    pub fn with_service(self, svc: Service<C>) -> Self {
        self.add_service(svc);
        self
    }

    /// Number of requests this server has received.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Routes `"Service.Method"` to the matching handler.
    ///
    /// # Panics
    ///
    /// When the qualified name has no `.`, or names a service this server
    /// does not host. Calling an unregistered service is a wiring bug in the
    /// caller, not a network condition.
    pub fn dispatch(&self, qualified: &str, arg_type: &'static str, args: &[u8]) -> Reply {
        let (service_name, method_name) = match qualified.rsplit_once('.') {
            Some(parts) => parts,
            None => {
                error!("malformed method name {}", qualified);
                panic!("labnet: method name {qualified:?} is not of the form Service.Method");
            }
        };

        let service = {
            let services = self.services.lock().unwrap();
            self.count.fetch_add(1, Ordering::SeqCst);
            services.get(service_name).cloned()
        };

        match service {
            Some(service) => service.dispatch(method_name, arg_type, args),
            None => {
                let mut choices: Vec<String> = self.services.lock().unwrap().keys().cloned().collect();
                choices.sort();
                error!("unknown service {} in {}; expecting one of {:?}", service_name, qualified, choices);
                panic!("labnet: unknown service {service_name} in {qualified}; expecting one of {choices:?}");
            }
        }
    }
}
