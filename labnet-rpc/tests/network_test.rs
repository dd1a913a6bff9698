use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use labnet_rpc::{FaultConfig, JsonCodec, Network, Server, Service};
use serde::{Deserialize, Serialize};

fn echo_service() -> Service {
    Service::new("Echo").handler("Echo", |args: String, reply: &mut String| {
        *reply = args;
    })
}

/// Handler that sleeps on its own thread before answering.
fn slow_service(delay: Duration, finished: Arc<AtomicUsize>) -> Service {
    Service::new("Slow").handler("Wait", move |args: u64, reply: &mut u64| {
        std::thread::sleep(delay);
        finished.fetch_add(1, Ordering::SeqCst);
        *reply = args;
    })
}

fn wire(net: &Network, end: &str, server: &str) {
    net.connect(end, server);
    net.enable(end, true);
}

#[tokio::test]
async fn test_echo_disable_and_delete_scenario() {
    let net = Network::new();
    let end = net.make_end("c1");
    net.add_server("s1", Server::new().with_service(echo_service()));
    wire(&net, "c1", "s1");

    let mut reply = String::new();
    assert!(end.call("Echo.Echo", &"hi".to_string(), &mut reply).await);
    assert_eq!(reply, "hi");

    net.enable("c1", false);
    let mut reply = String::new();
    assert!(!end.call("Echo.Echo", &"hi".to_string(), &mut reply).await);
    assert_eq!(reply, "");

    net.delete_server("s1");
    net.enable("c1", true);
    assert!(!end.call("Echo.Echo", &"hi".to_string(), &mut reply).await);
    assert_eq!(reply, "");

    net.shutdown();
}

#[tokio::test]
async fn test_unreachable_calls_fail_in_bounded_time() {
    let net = Network::new();
    net.add_server("s1", Server::new().with_service(echo_service()));

    // never connected
    let lonely = net.make_end("lonely");
    net.enable("lonely", true);

    // connected but disabled
    let off = net.make_end("off");
    net.connect("off", "s1");

    let start = Instant::now();
    let mut reply = String::new();
    assert!(!lonely.call("Echo.Echo", &"x".to_string(), &mut reply).await);
    assert!(!off.call("Echo.Echo", &"x".to_string(), &mut reply).await);

    let bound = Duration::from_millis(2 * net.config().unreachable_delay_ms + 500);
    assert!(start.elapsed() < bound, "took {:?}", start.elapsed());
    assert_eq!(net.server_count("s1"), 0, "no handler may run for an unreachable end");

    net.shutdown();
}

#[tokio::test]
async fn test_long_delays_stretch_unreachable_failures() {
    let cfg = FaultConfig {
        long_delay_ms: 400,
        unreachable_delay_ms: 1,
        ..FaultConfig::default()
    }
    .with_seed(11);
    let net: Network = Network::with_config(cfg);
    let end = net.make_end("c1");
    net.set_long_delays(true);
    assert!(net.is_long_delays());

    let start = Instant::now();
    let mut reply = String::new();
    for _ in 0..5 {
        assert!(!end.call("Echo.Echo", &"x".to_string(), &mut reply).await);
    }
    // the 1ms normal-mode bound would finish almost instantly
    assert!(start.elapsed() > Duration::from_millis(5));
    assert!(start.elapsed() < net.config().max_unreachable_delay() * 5 + Duration::from_millis(500));

    net.shutdown();
}

#[tokio::test]
async fn test_server_deleted_during_handler_fails_call() {
    let net = Network::new();
    let finished = Arc::new(AtomicUsize::new(0));
    let end = net.make_end("c1");
    net.add_server(
        "s1",
        Server::new().with_service(slow_service(Duration::from_millis(600), Arc::clone(&finished))),
    );
    wire(&net, "c1", "s1");

    let killer = net.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        killer.delete_server("s1");
    });

    let start = Instant::now();
    let mut reply = 0u64;
    assert!(!end.call("Slow.Wait", &42u64, &mut reply).await);
    assert_eq!(reply, 0);
    // failed by the liveness poll, well before the handler returned
    assert!(start.elapsed() < Duration::from_millis(500), "took {:?}", start.elapsed());

    // the handler still runs to completion and is joined
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);

    net.shutdown();
}

#[tokio::test]
async fn test_replacing_server_mid_call_fails_call() {
    let net = Network::new();
    let finished = Arc::new(AtomicUsize::new(0));
    let end = net.make_end("c1");
    net.add_server(
        "s1",
        Server::new().with_service(slow_service(Duration::from_millis(300), Arc::clone(&finished))),
    );
    wire(&net, "c1", "s1");

    let restarter = net.clone();
    let restarted = Arc::clone(&finished);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        restarter.add_server(
            "s1",
            Server::new().with_service(slow_service(Duration::from_millis(300), restarted)),
        );
    });

    let mut reply = 0u64;
    assert!(!end.call("Slow.Wait", &1u64, &mut reply).await);

    // the restarted server answers fine
    assert!(end.call("Slow.Wait", &2u64, &mut reply).await);
    assert_eq!(reply, 2);

    net.shutdown();
}

#[tokio::test]
async fn test_server_deleted_before_liveness_tick_fails_call() {
    // The poll never fires while the handler runs, so only the check made
    // after the handler returns can notice the deletion.
    let cfg = FaultConfig {
        liveness_poll_ms: 5000,
        ..FaultConfig::default()
    };
    let net = Network::with_config(cfg);
    let finished = Arc::new(AtomicUsize::new(0));
    let end = net.make_end("c1");
    net.add_server(
        "s1",
        Server::new().with_service(slow_service(Duration::from_millis(200), Arc::clone(&finished))),
    );
    wire(&net, "c1", "s1");

    let killer = net.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        killer.delete_server("s1");
    });

    let start = Instant::now();
    let mut reply = 0u64;
    assert!(!end.call("Slow.Wait", &7u64, &mut reply).await);
    assert_eq!(reply, 0);
    assert_eq!(finished.load(Ordering::SeqCst), 1, "the handler ran to completion");
    assert!(start.elapsed() < Duration::from_millis(1000), "took {:?}", start.elapsed());

    net.shutdown();
}

#[tokio::test]
async fn test_borrowed_str_reaches_string_handler() {
    let net = Network::new();
    let end = net.make_end("c1");
    net.add_server("s1", Server::new().with_service(echo_service()));
    wire(&net, "c1", "s1");

    let mut reply = String::new();
    assert!(end.call("Echo.Echo", &"hi", &mut reply).await);
    assert_eq!(reply, "hi");

    net.shutdown();
}

#[tokio::test]
async fn test_unreliable_success_rate() {
    let net = Network::with_config(FaultConfig::default().with_seed(2024));
    net.add_server("s1", Server::new().with_service(echo_service()));
    net.set_reliable(false);
    assert!(!net.is_reliable());

    const CALLS: usize = 1000;
    let mut tasks = Vec::with_capacity(CALLS);
    for i in 0..CALLS {
        let end = net.make_end(format!("c{i}"));
        wire(&net, &format!("c{i}"), "s1");
        tasks.push(tokio::spawn(async move {
            let mut reply = String::new();
            let ok = end.call("Echo.Echo", &format!("m{i}"), &mut reply).await;
            if ok {
                assert_eq!(reply, format!("m{i}"));
            }
            ok
        }));
    }

    let results = futures::future::join_all(tasks).await;
    let successes = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();

    let p = net.config().drop_probability;
    let expected = (1.0 - p) * (1.0 - p);
    let observed = successes as f64 / CALLS as f64;
    assert!(
        (observed - expected).abs() < 0.05,
        "observed {observed}, expected about {expected}"
    );

    net.shutdown();
}

#[tokio::test]
async fn test_shutdown_releases_blocked_calls() {
    let net = Network::new();
    let finished = Arc::new(AtomicUsize::new(0));
    net.add_server(
        "s1",
        Server::new().with_service(slow_service(Duration::from_millis(1500), Arc::clone(&finished))),
    );

    let mut tasks = Vec::new();
    for i in 0..5 {
        let end = net.make_end(format!("c{i}"));
        wire(&net, &format!("c{i}"), "s1");
        tasks.push(tokio::spawn(async move {
            let mut reply = 0u64;
            end.call("Slow.Wait", &7u64, &mut reply).await
        }));
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    let start = Instant::now();
    net.shutdown();

    let results = tokio::time::timeout(Duration::from_millis(500), futures::future::join_all(tasks))
        .await
        .expect("blocked calls must return promptly after shutdown");
    for r in results {
        assert!(!r.unwrap());
    }
    assert!(start.elapsed() < Duration::from_millis(500));

    // calls issued after shutdown fail immediately
    let late = net.make_end("late");
    wire(&net, "late", "s1");
    let mut reply = 0u64;
    assert!(!late.call("Slow.Wait", &7u64, &mut reply).await);
}

#[tokio::test]
async fn test_counts_and_bytes() {
    let net = Network::new();
    let end = net.make_end("c1");
    net.add_server("s1", Server::new().with_service(echo_service()));
    wire(&net, "c1", "s1");

    let mut reply = String::new();
    for _ in 0..3 {
        assert!(end.call("Echo.Echo", &"payload".to_string(), &mut reply).await);
    }

    assert_eq!(net.total_count(), 3);
    assert_eq!(net.server_count("s1"), 3);
    // every byte is counted once on the way out and once on the way back
    let one_way = bincode::serialize(&"payload".to_string()).unwrap().len() as u64;
    assert_eq!(net.total_bytes(), 3 * 2 * one_way);

    net.delete_server("s1");
    assert_eq!(net.server_count("s1"), 0);
    assert_eq!(net.server_count("nobody"), 0);

    net.shutdown();
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct VoteArgs {
    term: u64,
    candidate: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct VoteReply {
    term: u64,
    granted: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GetArgs {
    key: String,
}

#[tokio::test]
async fn test_one_server_hosts_several_services() {
    let net = Network::new();
    let end = net.make_end("c1");

    let server = Server::new()
        .with_service(Service::new("Raft").handler("RequestVote", |args: VoteArgs, reply: &mut VoteReply| {
            reply.term = args.term;
            reply.granted = args.candidate == "s2";
        }))
        .with_service(Service::new("KV").handler("Get", |args: GetArgs, reply: &mut String| {
            *reply = format!("value:{}", args.key);
        }));
    net.add_server("s1", server);
    wire(&net, "c1", "s1");

    let mut vote = VoteReply::default();
    let args = VoteArgs {
        term: 3,
        candidate: "s2".to_string(),
    };
    assert!(end.call("Raft.RequestVote", &args, &mut vote).await);
    assert_eq!(vote, VoteReply { term: 3, granted: true });

    let mut value = String::new();
    assert!(end.call("KV.Get", &GetArgs { key: "x".to_string() }, &mut value).await);
    assert_eq!(value, "value:x");

    net.shutdown();
}

#[tokio::test]
async fn test_long_reordering_still_delivers() {
    let cfg = FaultConfig {
        reorder_min_ms: 20,
        reorder_spread_ms: 200,
        ..FaultConfig::default()
    }
    .with_seed(5);
    let net = Network::with_config(cfg);
    net.add_server("s1", Server::new().with_service(echo_service()));
    net.set_long_reordering(true);
    assert!(net.is_long_reordering());

    let mut tasks = Vec::new();
    for i in 0..20 {
        let end = net.make_end(format!("c{i}"));
        wire(&net, &format!("c{i}"), "s1");
        tasks.push(tokio::spawn(async move {
            let mut reply = String::new();
            let ok = end.call("Echo.Echo", &format!("r{i}"), &mut reply).await;
            (ok, reply, i)
        }));
    }

    for res in futures::future::join_all(tasks).await {
        let (ok, reply, i) = res.unwrap();
        assert!(ok, "a reliable network never loses a reordered reply");
        assert_eq!(reply, format!("r{i}"));
    }

    net.shutdown();
}

#[tokio::test]
async fn test_concurrent_calls_on_one_end() {
    let net = Network::new();
    let end = net.make_end("c1");
    net.add_server("s1", Server::new().with_service(echo_service()));
    wire(&net, "c1", "s1");

    let calls = (0..10).map(|i| {
        let end = end.clone();
        async move {
            let mut reply = String::new();
            let ok = end.call("Echo.Echo", &i.to_string(), &mut reply).await;
            ok && reply == i.to_string()
        }
    });

    let results = futures::future::join_all(calls).await;
    assert!(results.into_iter().all(|ok| ok));

    net.shutdown();
}

#[tokio::test]
async fn test_duplicate_and_unknown_ends() {
    let net = Network::new();
    let _end = net.make_end("c1");

    assert!(net.try_make_end("c1").is_err());
    assert!(net.try_delete_end("c2").is_err());

    net.delete_end("c1");
    assert!(net.try_make_end("c1").is_ok());

    net.shutdown();
}

#[tokio::test]
#[should_panic(expected = "already exists")]
async fn test_make_end_twice_panics() {
    let net = Network::new();
    let _a = net.make_end("c1");
    let _b = net.make_end("c1");
}

#[tokio::test]
#[should_panic(expected = "aborted without a reply")]
async fn test_unknown_service_is_fatal_to_caller() {
    let net = Network::new();
    let end = net.make_end("c1");
    net.add_server("s1", Server::new().with_service(echo_service()));
    wire(&net, "c1", "s1");

    let mut reply = String::new();
    end.call("Raft.AppendEntries", &"x".to_string(), &mut reply).await;
}

#[tokio::test]
async fn test_json_codec_network() {
    let net: Network<JsonCodec> = Network::with_config(FaultConfig::default());
    let end = net.make_end("c1");
    let server = Server::<JsonCodec>::with_codec().with_service(Service::<JsonCodec>::with_codec("Echo").handler(
        "Echo",
        |args: String, reply: &mut String| {
            *reply = args.to_uppercase();
        },
    ));
    net.add_server("s1", server);
    net.connect("c1", "s1");
    net.enable("c1", true);

    let mut reply = String::new();
    assert!(end.call("Echo.Echo", &"json".to_string(), &mut reply).await);
    assert_eq!(reply, "JSON");

    // "json" is six bytes of JSON each way
    assert_eq!(net.total_bytes(), 12);

    net.shutdown();
}
