use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use labnet_kv::{Clerk, KvClerk, KvServer, KvStatus};
use labnet_rpc::{Client, Network, Server};
use tracing::{debug, info};

use crate::{config::SimConfig, error::SimError};

const SERVER: &str = "kv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub clients: usize,
    pub ops: usize,
    pub maybes: usize,
    pub rpc_count: u64,
    pub rpc_bytes: u64,
    pub server_rpcs: usize,
    pub elapsed: Duration,
}

fn counter_key(client: usize) -> String {
    format!("counter-{}", client)
}

/// Starts a `KvServer`, lets every client bump its own counter
/// `ops_per_client` times, then checks each counter.
pub async fn run(cfg: &SimConfig) -> Result<Report, SimError> {
    let net = Network::with_config(cfg.fault.clone());
    net.set_reliable(!cfg.unreliable);
    net.set_long_reordering(cfg.long_reordering);
    net.set_long_delays(cfg.long_delays);

    let kv = Arc::new(KvServer::new());
    net.add_server(SERVER, Server::new().with_service(kv.service()));

    let start = Instant::now();
    let tasks: Vec<_> = (0..cfg.clients)
        .map(|i| {
            let client = Arc::new(Client::new(&net, format!("c{}", i)));
            let clerk = Clerk::new(client, SERVER);
            let ops = cfg.ops_per_client;
            tokio::spawn(async move { increment(&clerk, i, ops).await })
        })
        .collect();

    let mut maybes = 0;
    for task in futures::future::join_all(tasks).await {
        maybes += task??;
    }

    let checker = Clerk::new(Arc::new(Client::new(&net, "checker")), SERVER);
    for i in 0..cfg.clients {
        let key = counter_key(i);
        let (value, _, _) = checker.get(&key).await;
        if value != cfg.ops_per_client.to_string() {
            return Err(SimError::Mismatch {
                key,
                expected: cfg.ops_per_client,
                found: value,
            });
        }
    }

    let report = Report {
        clients: cfg.clients,
        ops: cfg.clients * cfg.ops_per_client,
        maybes,
        rpc_count: net.total_count(),
        rpc_bytes: net.total_bytes(),
        server_rpcs: net.server_count(SERVER),
        elapsed: start.elapsed(),
    };
    info!(
        "{} ops by {} clients in {:?}: {} rpcs, {} bytes, {} maybe",
        report.ops, report.clients, report.elapsed, report.rpc_count, report.rpc_bytes, report.maybes
    );

    net.shutdown();
    Ok(report)
}

fn parse_counter(key: &str, value: String) -> Result<usize, SimError> {
    value.parse::<usize>().map_err(|_| SimError::Corrupt {
        key: key.to_string(),
        value,
    })
}

/// Bumps this client's counter `ops` times and returns how many puts came
/// back `Maybe`.
async fn increment(clerk: &Clerk, client: usize, ops: usize) -> Result<usize, SimError> {
    let key = counter_key(client);
    let mut maybes = 0;
    let mut done = 0;

    while done < ops {
        let (value, version, err) = clerk.get(&key).await;
        let current = match err {
            KvStatus::Ok => parse_counter(&key, value)?,
            KvStatus::NoKey => 0,
            status => {
                return Err(SimError::Unexpected { client, key, status });
            }
        };
        let next = (current + 1).to_string();

        match clerk.put(&key, &next, version).await {
            KvStatus::Ok => done = current + 1,
            KvStatus::Maybe => {
                // only this client writes the key, so a re-read settles it
                maybes += 1;
                let (value, _, _) = clerk.get(&key).await;
                if value == next {
                    done = current + 1;
                }
            }
            status => {
                return Err(SimError::Unexpected { client, key, status });
            }
        }
    }

    debug!("client {} finished {} increments", client, ops);
    Ok(maybes)
}
