//! Relay tests over real loopback TCP connections.
//!
//! Each test builds the full topology:
//! `client -> [inbound] relay [outbound] -> remote`.
#![allow(clippy::tests_outside_test_module)]

use std::time::Duration;

use tcprelay_core::{Direction, Leg, Relay, RelayError, RelayOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};

// ============================================================================
// Test Helpers
// ============================================================================

struct Topology {
    client: TcpStream,
    remote: TcpStream,
    relay: JoinHandle<Result<(), RelayError>>,
}

/// Accept one inbound connection and relay it to a fresh remote listener.
async fn start(options: impl FnOnce(String) -> RelayOptions) -> Topology {
    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr = remote_listener.local_addr().unwrap();

    let client = TcpStream::connect(proxy_listener.local_addr().unwrap())
        .await
        .unwrap();
    let (inbound, _) = proxy_listener.accept().await.unwrap();

    let relay = Relay::new(options(remote_addr.to_string())).unwrap();
    let relay = tokio::spawn(async move { relay.proxy(inbound).await });

    let (remote, _) = remote_listener.accept().await.unwrap();
    Topology {
        client,
        remote,
        relay,
    }
}

async fn start_with_timeout(io_timeout: Duration) -> Topology {
    start(|addr| {
        RelayOptions::new(addr)
            .connect_timeout(Duration::from_secs(10))
            .io_timeout(io_timeout)
    })
    .await
}

/// Assert the peer of `stream` has closed: EOF or reset, promptly.
async fn assert_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 16];
    let res = timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("peer connection still open");
    assert!(matches!(res, Ok(0) | Err(_)), "unexpected read: {res:?}");
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

// ============================================================================
// Data Forwarding
// ============================================================================

#[tokio::test]
async fn forwards_request_and_response() {
    let Topology {
        mut client,
        mut remote,
        relay,
    } = start_with_timeout(Duration::from_secs(10)).await;

    client.write_all(b"test data").await.unwrap();
    let mut buf = [0u8; 128];
    let n = remote.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"test data");

    remote.write_all(b"test response").await.unwrap();
    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"test response");

    drop(client);
    relay.await.unwrap().unwrap();
    assert_closed(&mut remote).await;
}

#[tokio::test]
async fn large_payloads_arrive_intact_in_both_directions() {
    let Topology {
        mut client,
        mut remote,
        relay,
    } = start(|addr| {
        RelayOptions::new(addr)
            .io_timeout(Duration::from_secs(10))
            .buffer_size(1024)
    })
    .await;

    let up = pattern(256 * 1024, 1);
    let down = pattern(192 * 1024 + 7, 2);

    {
        let (mut client_r, mut client_w) = client.split();
        let (mut remote_r, mut remote_w) = remote.split();

        let send_up = client_w.write_all(&up);
        let send_down = remote_w.write_all(&down);
        let recv_up = async {
            let mut got = vec![0u8; up.len()];
            remote_r.read_exact(&mut got).await.map(|_| got)
        };
        let recv_down = async {
            let mut got = vec![0u8; down.len()];
            client_r.read_exact(&mut got).await.map(|_| got)
        };

        let (s1, s2, r1, r2) = tokio::join!(send_up, send_down, recv_up, recv_down);
        s1.unwrap();
        s2.unwrap();
        assert_eq!(r1.unwrap(), up);
        assert_eq!(r2.unwrap(), down);
    }

    drop(client);
    relay.await.unwrap().unwrap();
}

// ============================================================================
// Graceful End
// ============================================================================

#[tokio::test]
async fn inbound_close_ends_relay_without_error() {
    let Topology {
        client,
        mut remote,
        relay,
    } = start_with_timeout(Duration::from_secs(30)).await;

    drop(client);

    // Well under the idle timeout: closure propagates, it is not waited out.
    let result = timeout(Duration::from_secs(5), relay)
        .await
        .expect("relay did not finish after inbound close")
        .unwrap();
    result.unwrap();
    assert_closed(&mut remote).await;
}

#[tokio::test]
async fn remote_close_ends_relay_without_error() {
    let Topology {
        mut client,
        remote,
        relay,
    } = start_with_timeout(Duration::from_secs(30)).await;

    drop(remote);

    let result = timeout(Duration::from_secs(5), relay)
        .await
        .expect("relay did not finish after remote close")
        .unwrap();
    result.unwrap();
    assert_closed(&mut client).await;
}

#[tokio::test]
async fn data_before_close_is_delivered() {
    let Topology {
        mut client,
        mut remote,
        relay,
    } = start_with_timeout(Duration::from_secs(10)).await;

    remote.write_all(b"last words").await.unwrap();
    let mut buf = [0u8; 32];
    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"last words");

    drop(remote);
    relay.await.unwrap().unwrap();
    assert_closed(&mut client).await;
}

// ============================================================================
// Idle Timeout
// ============================================================================

#[tokio::test]
async fn idle_relay_times_out_after_io_timeout() {
    let Topology {
        mut client,
        mut remote,
        relay,
    } = start_with_timeout(Duration::from_secs(1)).await;

    client.write_all(b"test data").await.unwrap();
    let mut buf = [0u8; 128];
    let n = remote.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"test data");

    remote.write_all(b"test response").await.unwrap();
    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"test response");

    let last_byte = Instant::now();
    let err = timeout(Duration::from_secs(2), relay)
        .await
        .expect("relay outlived twice its idle timeout")
        .unwrap()
        .unwrap_err();
    let elapsed = last_byte.elapsed();

    assert!(err.is_timeout(), "{err:?}");
    assert!(matches!(err, RelayError::ReadTimeout { .. }), "{err:?}");
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1800), "{elapsed:?}");

    assert_closed(&mut client).await;
    assert_closed(&mut remote).await;
}

#[tokio::test]
async fn one_idle_direction_times_out() {
    let Topology {
        mut client,
        mut remote,
        relay,
    } = start_with_timeout(Duration::from_millis(500)).await;

    // Keep upstream busy; downstream never carries anything.
    let keepalive = async {
        for _ in 0..20 {
            if client.write_all(b".").await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    };
    let drain = async {
        let mut buf = [0u8; 64];
        while let Ok(n) = remote.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
    };
    let relay_result = async { relay.await.unwrap() };

    let (_, _, result) = tokio::join!(keepalive, drain, relay_result);
    let err = result.unwrap_err();
    match err {
        RelayError::ReadTimeout { leg, direction, .. } => {
            assert_eq!(leg, Leg::Outbound);
            assert_eq!(direction, Direction::Downstream);
        }
        other => panic!("expected downstream read timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn unrepresentable_io_timeout_still_forwards() {
    let Topology {
        mut client,
        mut remote,
        relay,
    } = start_with_timeout(Duration::from_secs(u64::MAX)).await;

    client.write_all(b"hi").await.unwrap();
    let mut buf = [0u8; 2];
    remote.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hi");

    remote.write_all(b"ok").await.unwrap();
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ok");

    drop(client);
    relay.await.unwrap().unwrap();
}

#[tokio::test]
async fn active_traffic_outlives_io_timeout() {
    let Topology {
        mut client,
        mut remote,
        relay,
    } = start_with_timeout(Duration::from_millis(400)).await;

    // Ping-pong for well over the idle timeout in total.
    let mut buf = [0u8; 8];
    for i in 0..8u8 {
        client.write_all(&[i]).await.unwrap();
        remote.read_exact(&mut buf[..1]).await.unwrap();
        assert_eq!(buf[0], i);
        remote.write_all(&[i]).await.unwrap();
        client.read_exact(&mut buf[..1]).await.unwrap();
        assert_eq!(buf[0], i);
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    assert!(!relay.is_finished());

    drop(client);
    relay.await.unwrap().unwrap();
}

// ============================================================================
// Connect Failures
// ============================================================================

#[tokio::test]
async fn refused_dial_returns_connect_error() {
    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };

    let _client = TcpStream::connect(proxy_listener.local_addr().unwrap())
        .await
        .unwrap();
    let (inbound, _) = proxy_listener.accept().await.unwrap();

    let relay = Relay::new(RelayOptions::new(dead_addr.to_string())).unwrap();
    let err = relay.proxy(inbound).await.unwrap_err();
    assert!(err.is_connect(), "{err:?}");
    assert!(matches!(err, RelayError::Connect { .. }));
}

/// A listener whose accept queue is full and never drained: further
/// handshakes stall, so a dial to it blocks until its timeout.
async fn saturated_listener() -> (TcpListener, Vec<TcpStream>) {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut queued = Vec::new();
    for _ in 0..64 {
        match timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => queued.push(stream),
            Ok(Err(e)) => panic!("filling accept queue failed: {e}"),
            Err(_) => return (listener, queued),
        }
    }
    panic!("accept queue never filled");
}

#[tokio::test]
async fn stalled_dial_times_out_without_forwarding() {
    let (stalled, _queued) = saturated_listener().await;
    let stalled_addr = stalled.local_addr().unwrap();

    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut client = TcpStream::connect(proxy_listener.local_addr().unwrap())
        .await
        .unwrap();
    let (inbound, _) = proxy_listener.accept().await.unwrap();

    let relay = Relay::new(
        RelayOptions::new(stalled_addr.to_string()).connect_timeout(Duration::from_millis(300)),
    )
    .unwrap();

    let start = Instant::now();
    let err = relay.proxy(inbound).await.unwrap_err();
    let elapsed = start.elapsed();

    match &err {
        RelayError::ConnectTimeout { addr, timeout } => {
            assert_eq!(addr, &stalled_addr.to_string());
            assert_eq!(*timeout, Duration::from_millis(300));
        }
        other => panic!("expected connect timeout, got {other:?}"),
    }
    assert!(err.is_connect() && err.is_timeout());
    assert!(elapsed >= Duration::from_millis(250), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");

    // No forwarding happened: the inbound peer sees only the close.
    let mut buf = [0u8; 16];
    let res = timeout(Duration::from_secs(2), client.read(&mut buf))
        .await
        .expect("inbound connection still open");
    assert!(matches!(res, Ok(0) | Err(_)), "unexpected read: {res:?}");
}

#[tokio::test]
async fn failed_dial_leaves_inbound_with_caller() {
    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = {
        let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };

    let mut client = TcpStream::connect(proxy_listener.local_addr().unwrap())
        .await
        .unwrap();
    let (mut inbound, _) = proxy_listener.accept().await.unwrap();

    let relay = Relay::new(RelayOptions::new(dead_addr.to_string())).unwrap();
    assert!(relay.dial().await.unwrap_err().is_connect());

    // The caller still owns a working inbound connection.
    inbound.write_all(b"503").await.unwrap();
    let mut buf = [0u8; 8];
    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"503");
}

// ============================================================================
// Stats
// ============================================================================

#[tokio::test]
async fn forward_with_stats_counts_bytes() {
    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let remote_addr = remote_listener.local_addr().unwrap();

    let mut client = TcpStream::connect(proxy_listener.local_addr().unwrap())
        .await
        .unwrap();
    let (inbound, _) = proxy_listener.accept().await.unwrap();

    let relay = Relay::new(RelayOptions::new(remote_addr.to_string())).unwrap();
    let outbound = relay.dial().await.unwrap();
    let (mut remote, _) = remote_listener.accept().await.unwrap();

    let handle =
        tokio::spawn(async move { relay.forward_with_stats(inbound, outbound).await });

    client.write_all(b"0123456789").await.unwrap();
    let mut buf = [0u8; 10];
    remote.read_exact(&mut buf).await.unwrap();
    remote.write_all(b"abc").await.unwrap();
    client.read_exact(&mut buf[..3]).await.unwrap();

    drop(remote);
    let (stats, result) = handle.await.unwrap();
    result.unwrap();
    assert_eq!(stats.upstream_bytes, 10);
    assert_eq!(stats.downstream_bytes, 3);
}
