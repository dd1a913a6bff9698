use std::{any::type_name, marker::PhantomData};

use labnet_common::{BincodeCodec, Codec, EndName};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::error;

use crate::{
    message::{Reply, RequestMsg},
    network::wait_done,
};

/// One client's binding point on the network.
///
/// Created by [`crate::Network::make_end`]. It is fine to have several calls
/// in flight on the same end at once; the network may deliver them in any
/// order.
pub struct ClientEnd<C: Codec = BincodeCodec> {
    name: EndName,
    end_tx: mpsc::Sender<RequestMsg>,
    done_rx: watch::Receiver<bool>,
    _codec: PhantomData<fn() -> C>,
}

impl<C: Codec> Clone for ClientEnd<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            end_tx: self.end_tx.clone(),
            done_rx: self.done_rx.clone(),
            _codec: PhantomData,
        }
    }
}

impl<C: Codec> std::fmt::Debug for ClientEnd<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEnd").field("name", &self.name).finish()
    }
}

impl<C: Codec> ClientEnd<C> {
    pub(crate) fn new(name: EndName, end_tx: mpsc::Sender<RequestMsg>, done_rx: watch::Receiver<bool>) -> Self {
        Self {
            name,
            end_tx,
            done_rx,
            _codec: PhantomData,
        }
    }

    pub fn name(&self) -> &EndName {
        &self.name
    }

    /// Sends an RPC and waits for the reply.
    ///
    /// Returns `true` when the server executed the request and `reply` now
    /// holds its answer. Returns `false`, leaving `reply` untouched, when the
    /// request or reply was lost, the server is unreachable, or the network
    /// has been shut down. Argument and reply types must match the types the
    /// handler was registered with.
    ///
    /// # Panics
    ///
    /// When the reply cannot be decoded into `R`, or the server rejected the
    /// call as a protocol violation (unknown service/method, an argument the
    /// handler cannot decode).
    pub async fn call<A, R>(&self, method: &str, args: &A, reply: &mut R) -> bool
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let bytes = match C::encode(args) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("ClientEnd::call({}): encode argument: {}", method, e);
                panic!("ClientEnd::call({method}): encode argument: {e}");
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let req = RequestMsg {
            end: self.name.clone(),
            method: method.to_string(),
            arg_type: type_name::<A>(),
            args: bytes,
            reply_tx,
        };

        let mut done = self.done_rx.clone();

        // send the request, unless the whole network has been torn down
        tokio::select! {
            sent = self.end_tx.send(req) => {
                if sent.is_err() {
                    return false;
                }
            }
            _ = wait_done(&mut done) => return false,
        }

        let rep = tokio::select! {
            rep = reply_rx => rep,
            _ = wait_done(&mut done) => return false,
        };

        match rep {
            Ok(Reply { ok: true, bytes }) => match C::decode::<R>(&bytes) {
                Ok(value) => {
                    *reply = value;
                    true
                }
                Err(e) => {
                    error!("ClientEnd::call({}): decode reply: {}", method, e);
                    panic!("ClientEnd::call({method}): decode reply: {e}");
                }
            },
            Ok(_) => false,
            Err(_) => {
                if *self.done_rx.borrow() {
                    return false;
                }
                error!("ClientEnd::call({}): request aborted without a reply", method);
                panic!("ClientEnd::call({method}): request aborted without a reply");
            }
        }
    }
}
