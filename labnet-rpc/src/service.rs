//! service.rs
//!
//! Named groups of remotely callable methods.
//!
//! A handler has exactly the shape `Fn(args, &mut reply)`: it receives the
//! decoded argument and a `Default` reply, and fills the reply in. Anything
//! else simply does not satisfy the registration bounds.

use std::{any::type_name, collections::HashMap, marker::PhantomData, sync::Arc};

use labnet_common::{BincodeCodec, Codec};
use serde::{de::DeserializeOwned, Serialize};
use tracing::error;

use crate::message::Reply;

/// Type-erased handler: (argument type tag, argument bytes) -> reply.
type HandlerFn = dyn Fn(&'static str, &[u8]) -> Reply + Send + Sync;

pub struct Service<C: Codec = BincodeCodec> {
    name: String,
    methods: HashMap<String, Box<HandlerFn>>,
    _codec: PhantomData<fn() -> C>,
}

impl Service<BincodeCodec> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_codec(name)
    }

    /// Starts a service whose methods are bound to `rcvr`. The service is
    /// named after the receiver's type, so methods of a `KvServer` are
    /// called as `"KvServer.Get"`.
    pub fn for_receiver<T: Send + Sync + 'static>(rcvr: Arc<T>) -> ReceiverService<T, BincodeCodec> {
        Self::receiver_with_codec(rcvr)
    }
}

impl<C: Codec> Service<C> {
    pub fn with_codec(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
            _codec: PhantomData,
        }
    }

    pub fn receiver_with_codec<T: Send + Sync + 'static>(rcvr: Arc<T>) -> ReceiverService<T, C> {
        ReceiverService {
            service: Self::with_codec(short_type_name::<T>()),
            rcvr,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registers `method`. A later registration under the same name replaces
    /// the earlier one.
    pub fn handler<A, R, F>(mut self, method: &str, f: F) -> Self
    where
        A: DeserializeOwned + 'static,
        R: Serialize + Default + 'static,
        F: Fn(A, &mut R) + Send + Sync + 'static,
    {
        let qualified = format!("{}.{}", self.name, method);
        let expected = type_name::<A>();

        // The caller's type tag only labels the failure: `&str` and `String`
        // share an encoding, so the bytes decide whether the call fits.
        let handler = move |arg_type: &'static str, bytes: &[u8]| -> Reply {
            let args: A = match C::decode(bytes) {
                Ok(args) => args,
                Err(e) => {
                    error!(
                        "{}: cannot decode {} argument as {}: {}",
                        qualified, arg_type, expected, e
                    );
                    panic!("{qualified}: called with {arg_type}, handler expects {expected}: {e}");
                }
            };

            let mut reply = R::default();
            f(args, &mut reply);

            match C::encode(&reply) {
                Ok(bytes) => Reply::success(bytes),
                Err(e) => {
                    error!("{}: unencodable reply: {}", qualified, e);
                    panic!("{qualified}: encode reply: {e}");
                }
            }
        };

        self.methods.insert(method.to_string(), Box::new(handler));
        self
    }

    /// Runs `method` on the encoded argument.
    ///
    /// # Panics
    ///
    /// On an unknown method, or an argument that does not fit the handler.
    /// Both mean the caller and the registered handlers disagree, which no
    /// retry can fix.
    pub fn dispatch(&self, method: &str, arg_type: &'static str, args: &[u8]) -> Reply {
        match self.methods.get(method) {
            Some(handler) => handler(arg_type, args),
            None => {
                let choices = self.methods();
                error!("unknown method {} in service {}; expecting one of {:?}", method, self.name, choices);
                panic!(
                    "labnet: unknown method {method} in {}.{method}; expecting one of {choices:?}",
                    self.name
                );
            }
        }
    }
}

/// Builder binding handlers to one shared receiver object.
pub struct ReceiverService<T, C: Codec = BincodeCodec> {
    service: Service<C>,
    rcvr: Arc<T>,
}

impl<T: Send + Sync + 'static, C: Codec> ReceiverService<T, C> {
    pub fn method<A, R, F>(mut self, name: &str, f: F) -> Self
    where
        A: DeserializeOwned + 'static,
        R: Serialize + Default + 'static,
        F: Fn(&T, A, &mut R) + Send + Sync + 'static,
    {
        let rcvr = Arc::clone(&self.rcvr);
        self.service = self.service.handler(name, move |args: A, reply: &mut R| f(rcvr.as_ref(), args, reply));
        self
    }

    pub fn build(self) -> Service<C> {
        self.service
    }
}

// "labnet_kv::server::KvServer" -> "KvServer"
fn short_type_name<T>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
