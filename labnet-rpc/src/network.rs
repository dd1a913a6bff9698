//! network.rs
//!
//! The router: owns every end, server and fault setting, and decides the
//! fate of each request.
//!
//! A single ingestion task receives requests from all client ends and spawns
//! one task per request. That task snapshots the configuration once, then
//! delays, drops, delivers or reorders as the snapshot dictates. Handlers run
//! on the blocking pool so the request task can keep checking that the
//! server it is waiting on has not been deleted.

use std::{
    collections::{HashMap, HashSet},
    marker::PhantomData,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
    time::Duration,
};

use labnet_common::{BincodeCodec, Codec, EndName, ServerName};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    sync::{mpsc, watch},
    time::{self, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    client_end::ClientEnd,
    config::FaultConfig,
    error::NetworkError,
    message::{Reply, RequestMsg},
    server::Server,
};

/// Handle to a simulated network. Clones share the same network.
///
/// Must be created inside a tokio runtime. The network shuts down on
/// [`Network::shutdown`] or when the last handle is dropped.
pub struct Network<C: Codec = BincodeCodec> {
    inner: Arc<Inner<C>>,
}

impl<C: Codec> Clone for Network<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<C: Codec> {
    state: Mutex<NetState<C>>,
    config: FaultConfig,
    rng: Mutex<StdRng>,
    end_tx: mpsc::Sender<RequestMsg>,
    done_tx: watch::Sender<bool>,
    /// total RPC count, for statistics
    count: AtomicU64,
    /// total bytes sent, for statistics
    bytes: AtomicU64,
    _codec: PhantomData<fn() -> C>,
}

struct NetState<C: Codec> {
    reliable: bool,
    /// pause a long time before failing a call on a disabled connection
    long_delays: bool,
    /// sometimes hold replies back a long time
    long_reordering: bool,
    ends: HashSet<EndName>,
    enabled: HashMap<EndName, bool>,
    connections: HashMap<EndName, ServerName>,
    /// `None` marks a deleted server
    servers: HashMap<ServerName, Option<Arc<Server<C>>>>,
}

/// What a request sees of the network when its processing starts.
struct Snapshot<C: Codec> {
    enabled: bool,
    target: Option<(ServerName, Arc<Server<C>>)>,
    reliable: bool,
    long_reordering: bool,
}

impl Network<BincodeCodec> {
    pub fn new() -> Self {
        Self::with_config(FaultConfig::default())
    }
}

impl Default for Network<BincodeCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> Network<C> {
    pub fn with_config(config: FaultConfig) -> Self {
        let (end_tx, end_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (done_tx, done_rx) = watch::channel(false);

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let inner = Arc::new(Inner {
            state: Mutex::new(NetState {
                reliable: true,
                long_delays: false,
                long_reordering: false,
                ends: HashSet::new(),
                enabled: HashMap::new(),
                connections: HashMap::new(),
                servers: HashMap::new(),
            }),
            config,
            rng: Mutex::new(rng),
            end_tx,
            done_tx,
            count: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            _codec: PhantomData,
        });

        tokio::spawn(ingest(Arc::downgrade(&inner), end_rx, done_rx));

        Self { inner }
    }

    pub fn config(&self) -> &FaultConfig {
        &self.inner.config
    }

    /// Tears the network down. Blocked and future calls return `false`.
    pub fn shutdown(&self) {
        if !self.inner.done_tx.send_replace(true) {
            info!("network shut down");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.inner.done_tx.borrow()
    }

    /// `false` means drop and delay messages.
    pub fn set_reliable(&self, yes: bool) {
        self.inner.state.lock().unwrap().reliable = yes;
        info!("network reliable={}", yes);
    }

    pub fn is_reliable(&self) -> bool {
        self.inner.state.lock().unwrap().reliable
    }

    pub fn set_long_delays(&self, yes: bool) {
        self.inner.state.lock().unwrap().long_delays = yes;
        info!("network long_delays={}", yes);
    }

    pub fn is_long_delays(&self) -> bool {
        self.inner.is_long_delays()
    }

    pub fn set_long_reordering(&self, yes: bool) {
        self.inner.state.lock().unwrap().long_reordering = yes;
        info!("network long_reordering={}", yes);
    }

    pub fn is_long_reordering(&self) -> bool {
        self.inner.state.lock().unwrap().long_reordering
    }

    /// Creates a client end. New ends are disabled and unconnected.
    pub fn try_make_end(&self, name: impl Into<EndName>) -> Result<ClientEnd<C>, NetworkError> {
        let name = name.into();
        let mut state = self.inner.state.lock().unwrap();

        if !state.ends.insert(name.clone()) {
            return Err(NetworkError::DuplicateEnd(name));
        }
        state.enabled.insert(name.clone(), false);
        state.connections.remove(&name);
        drop(state);

        info!("client end {} created", name);
        Ok(ClientEnd::new(name, self.inner.end_tx.clone(), self.inner.done_tx.subscribe()))
    }

    /// # Panics
    ///
    /// If an end with this name already exists.
    pub fn make_end(&self, name: impl Into<EndName>) -> ClientEnd<C> {
        match self.try_make_end(name) {
            Ok(end) => end,
            Err(e) => {
                error!("make_end: {}", e);
                panic!("make_end: {e}");
            }
        }
    }

    /// Removes an end along with its connection and enabled state.
    pub fn try_delete_end(&self, name: impl Into<EndName>) -> Result<(), NetworkError> {
        let name = name.into();
        let mut state = self.inner.state.lock().unwrap();

        if !state.ends.remove(&name) {
            return Err(NetworkError::UnknownEnd(name));
        }
        state.enabled.remove(&name);
        state.connections.remove(&name);
        drop(state);

        info!("client end {} deleted", name);
        Ok(())
    }

    /// # Panics
    ///
    /// If no end with this name exists.
    pub fn delete_end(&self, name: impl Into<EndName>) {
        if let Err(e) = self.try_delete_end(name) {
            error!("delete_end: {}", e);
            panic!("delete_end: {e}");
        }
    }

    pub fn add_server(&self, name: impl Into<ServerName>, server: impl Into<Arc<Server<C>>>) {
        let name = name.into();
        self.inner.state.lock().unwrap().servers.insert(name.clone(), Some(server.into()));
        info!("server {} added", name);
    }

    /// Kills the named server. Calls already running on it get a failed
    /// reply; their handlers keep running but their results are discarded.
    pub fn delete_server(&self, name: impl Into<ServerName>) {
        let name = name.into();
        self.inner.state.lock().unwrap().servers.insert(name.clone(), None);
        info!("server {} deleted", name);
    }

    /// Points a client end at a server.
    pub fn connect(&self, end: impl Into<EndName>, server: impl Into<ServerName>) {
        let (end, server) = (end.into(), server.into());
        self.inner.state.lock().unwrap().connections.insert(end.clone(), server.clone());
        info!("client end {} connected to {}", end, server);
    }

    /// Enables or disables a client end.
    pub fn enable(&self, end: impl Into<EndName>, enabled: bool) {
        let end = end.into();
        self.inner.state.lock().unwrap().enabled.insert(end.clone(), enabled);
        info!("client end {} enabled={}", end, enabled);
    }

    /// Count of requests received by the named server; zero when it is
    /// unknown or deleted.
    pub fn server_count(&self, name: impl Into<ServerName>) -> usize {
        let name = name.into();
        let state = self.inner.state.lock().unwrap();
        match state.servers.get(&name) {
            Some(Some(server)) => server.count(),
            _ => 0,
        }
    }

    pub fn total_count(&self) -> u64 {
        self.inner.count.load(Ordering::SeqCst)
    }

    pub fn total_bytes(&self) -> u64 {
        self.inner.bytes.load(Ordering::SeqCst)
    }
}

impl<C: Codec> Inner<C> {
    fn snapshot(&self, end: &EndName) -> Snapshot<C> {
        let state = self.state.lock().unwrap();

        let enabled = state.enabled.get(end).copied().unwrap_or(false);
        let target = state.connections.get(end).and_then(|server_name| {
            match state.servers.get(server_name) {
                Some(Some(server)) => Some((server_name.clone(), Arc::clone(server))),
                _ => None,
            }
        });

        Snapshot {
            enabled,
            target,
            reliable: state.reliable,
            long_reordering: state.long_reordering,
        }
    }

    /// True once the end was disabled or the server replaced or deleted.
    fn is_server_dead(&self, end: &EndName, server_name: &ServerName, server: &Arc<Server<C>>) -> bool {
        let state = self.state.lock().unwrap();

        if !state.enabled.get(end).copied().unwrap_or(false) {
            return true;
        }
        match state.servers.get(server_name) {
            Some(Some(current)) => !Arc::ptr_eq(current, server),
            _ => true,
        }
    }

    fn is_long_delays(&self) -> bool {
        self.state.lock().unwrap().long_delays
    }

    fn random_ms(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        self.rng.lock().unwrap().gen_range(0..upper)
    }

    fn chance(&self, probability: f64) -> bool {
        self.rng.lock().unwrap().gen_bool(probability.clamp(0.0, 1.0))
    }

    /// Hold-back for a reordered reply: skewed towards short, with a long tail.
    fn reorder_delay_ms(&self) -> u64 {
        let spread = self.config.reorder_spread_ms;
        let mut rng = self.rng.lock().unwrap();
        let bound = if spread == 0 { 0 } else { rng.gen_range(0..spread) };
        self.config.reorder_min_ms + rng.gen_range(0..=bound)
    }

    /// Sleeps, cut short if the network shuts down.
    async fn pause(&self, ms: u64) {
        if ms == 0 {
            return;
        }
        let mut done = self.done_tx.subscribe();
        tokio::select! {
            _ = time::sleep(Duration::from_millis(ms)) => {}
            _ = wait_done(&mut done) => {}
        }
    }
}

impl<C: Codec> Drop for Inner<C> {
    fn drop(&mut self) {
        self.done_tx.send_replace(true);
    }
}

/// Resolves once the network has been shut down.
pub(crate) async fn wait_done(done: &mut watch::Receiver<bool>) {
    let _ = done.wait_for(|d| *d).await;
}

/// Single task handling every `ClientEnd::call`.
async fn ingest<C: Codec>(
    inner: Weak<Inner<C>>,
    mut end_rx: mpsc::Receiver<RequestMsg>,
    mut done_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            req = end_rx.recv() => {
                let Some(req) = req else { break };
                let Some(inner) = inner.upgrade() else { break };

                inner.count.fetch_add(1, Ordering::SeqCst);
                inner.bytes.fetch_add(req.args.len() as u64, Ordering::SeqCst);

                tokio::spawn(process_request(inner, req));
            }
            _ = wait_done(&mut done_rx) => break,
        }
    }
    debug!("ingestion loop stopped");
}

async fn process_request<C: Codec>(inner: Arc<Inner<C>>, req: RequestMsg) {
    let RequestMsg {
        end,
        method,
        arg_type,
        args,
        reply_tx,
    } = req;

    let snap = inner.snapshot(&end);

    let (server_name, server) = match snap.target {
        Some(target) if snap.enabled => target,
        _ => {
            // simulate no reply and eventual timeout
            let upper = if inner.is_long_delays() {
                // lets protocol tests check that a leader never waits on a
                // call synchronously
                inner.config.long_delay_ms
            } else {
                // clients must be able to try each server in fairly rapid
                // succession
                inner.config.unreachable_delay_ms
            };
            let ms = inner.random_ms(upper);
            debug!("{} from {}: unreachable, failing after {}ms", method, end, ms);
            inner.pause(ms).await;
            let _ = reply_tx.send(Reply::failure());
            return;
        }
    };

    if !snap.reliable {
        inner.pause(inner.random_ms(inner.config.short_delay_ms)).await;

        if inner.chance(inner.config.drop_probability) {
            debug!("{} from {}: request dropped", method, end);
            let _ = reply_tx.send(Reply::failure());
            return;
        }
    }

    // run the handler on its own thread so a server deleted mid-call can
    // still be noticed and answered with a failure
    let dispatch_server = Arc::clone(&server);
    let dispatch_method = method.clone();
    let mut handler =
        tokio::task::spawn_blocking(move || dispatch_server.dispatch(&dispatch_method, arg_type, &args));

    let poll = inner.config.liveness_poll();
    let mut ticker = time::interval_at(Instant::now() + poll, poll);

    let outcome = loop {
        tokio::select! {
            res = &mut handler => break Some(res),
            _ = ticker.tick() => {
                if inner.is_server_dead(&end, &server_name, &server) {
                    break None;
                }
            }
        }
    };

    let reply = match outcome {
        Some(Ok(reply)) => reply,
        Some(Err(e)) => {
            drop(reply_tx);
            if e.is_panic() {
                error!("{} on {}: handler panicked", method, server_name);
                std::panic::resume_unwind(e.into_panic());
            }
            return;
        }
        None => {
            warn!("{} on {}: server died mid-call, failing request", method, server_name);
            let _ = reply_tx.send(Reply::failure());
            // the handler cannot be interrupted; join it and discard its result
            if let Err(e) = handler.await {
                if e.is_panic() {
                    error!("{} on {}: handler panicked after its server died", method, server_name);
                    std::panic::resume_unwind(e.into_panic());
                }
            }
            return;
        }
    };

    // do not reply if the server was deleted while the handler ran: the
    // caller must never see a success from a server that has been replaced
    if inner.is_server_dead(&end, &server_name, &server) {
        warn!("{} on {}: server died before reply, failing request", method, server_name);
        let _ = reply_tx.send(Reply::failure());
        return;
    }

    if !snap.reliable && inner.chance(inner.config.drop_probability) {
        debug!("{} from {}: reply dropped", method, end);
        let _ = reply_tx.send(Reply::failure());
        return;
    }

    if snap.long_reordering && inner.chance(inner.config.reorder_probability) {
        let ms = inner.reorder_delay_ms();
        debug!("{} from {}: reply held back {}ms", method, end, ms);
        inner.pause(ms).await;
    }

    inner.bytes.fetch_add(reply.bytes.len() as u64, Ordering::SeqCst);
    let _ = reply_tx.send(reply);
}
