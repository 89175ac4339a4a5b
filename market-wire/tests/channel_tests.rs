//! Integration tests for the stop-and-wait reliable channel.
//!
//! Each test binds real `tokio::net::UdpSocket`s on loopback, runs a scripted
//! peer in a background task, and drives one or more exchanges through a
//! [`ReliableChannel`].

use std::net::SocketAddr;
use std::time::Duration;

use market_wire::{
    ChannelConfig, Message, Opcode, ReliableChannel, SimulatorConfig, Socket, TimerConfig,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ephemeral() -> Socket {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr).await.expect("bind failed")
}

fn config(timeout_ms: u64) -> ChannelConfig {
    ChannelConfig {
        timer: TimerConfig {
            timeout: Duration::from_millis(timeout_ms),
        },
        simulator: None,
    }
}

async fn channel(config: &ChannelConfig) -> ReliableChannel {
    ReliableChannel::bind("127.0.0.1:0".parse().unwrap(), config)
        .await
        .expect("bind channel")
}

/// Answer every request with `SUCCESS` and the request payload, forever.
fn spawn_echo(server: Socket) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let (req, from) = server.recv_from().await.expect("server recv");
            let reply = Message::new(Opcode::Success, req.payload);
            server.send_to(&reply, from).await.expect("server send");
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_returns_reply() {
    let server = ephemeral().await;
    let server_addr = server.local_addr;
    let echo = spawn_echo(server);

    let mut ch = channel(&config(1000)).await;
    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        ch.request(server_addr, Message::new(Opcode::Lookup, "Store")),
    )
    .await
    .expect("request timed out");

    assert_eq!(reply, Message::new(Opcode::Success, "Store"));
    echo.abort();
}

/// The first datagram is "lost" by the peer; the identical retransmission is answered.
#[tokio::test]
async fn retransmits_identical_request_after_timeout() {
    let server = ephemeral().await;
    let server_addr = server.local_addr;

    let peer = tokio::spawn(async move {
        let (first, _) = server.recv_from().await.unwrap();
        let (second, from) = server.recv_from().await.unwrap();
        server
            .send_to(&Message::empty(Opcode::Ok), from)
            .await
            .unwrap();
        (first, second)
    });

    let mut ch = channel(&config(50)).await;
    let request = Message::new(Opcode::ValidateTransaction, "3\n9.99\n1234567891234567");
    let reply = tokio::time::timeout(Duration::from_secs(5), ch.request(server_addr, request.clone()))
        .await
        .expect("request timed out");
    assert_eq!(reply.opcode, Opcode::Ok);

    let (first, second) = peer.await.unwrap();
    assert_eq!(first, request);
    assert_eq!(second, request);
}

/// With p < 1 and a peer that always answers, every exchange finishes.
#[tokio::test]
async fn lossy_channel_eventually_completes() {
    let server = ephemeral().await;
    let server_addr = server.local_addr;
    let echo = spawn_echo(server);

    let cfg = ChannelConfig {
        timer: TimerConfig {
            timeout: Duration::from_millis(20),
        },
        simulator: Some(SimulatorConfig {
            loss_rate: 0.5,
            seed: Some(42),
        }),
    };
    let mut ch = channel(&cfg).await;

    for i in 0..10 {
        let payload = format!("item-{i}");
        let reply = tokio::time::timeout(
            Duration::from_secs(10),
            ch.request(server_addr, Message::new(Opcode::ContentRequest, payload.clone())),
        )
        .await
        .expect("lossy request never completed");
        assert_eq!(reply.payload, payload);
    }

    let (_, passed) = ch.loss_stats().unwrap();
    assert!(passed >= 10, "each completed exchange needs one delivered send");
    echo.abort();
}

/// With p = 1 nothing ever leaves the host, so the exchange never finishes.
/// This is the documented behaviour, not a hang bug.
#[tokio::test]
async fn total_loss_never_completes() {
    let server = ephemeral().await;
    let server_addr = server.local_addr;
    let echo = spawn_echo(server);

    let cfg = ChannelConfig {
        timer: TimerConfig {
            timeout: Duration::from_millis(10),
        },
        simulator: Some(SimulatorConfig {
            loss_rate: 1.0,
            seed: Some(1),
        }),
    };
    let mut ch = channel(&cfg).await;

    let outcome = tokio::time::timeout(
        Duration::from_millis(300),
        ch.request(server_addr, Message::new(Opcode::Lookup, "Bank")),
    )
    .await;
    assert!(outcome.is_err(), "exchange must still be retrying");

    let (dropped, passed) = ch.loss_stats().unwrap();
    assert_eq!(passed, 0);
    assert!(dropped > 1, "expected retransmissions, saw {dropped} sends");
    echo.abort();
}

#[tokio::test]
async fn ignores_replies_from_other_peers() {
    let server = ephemeral().await;
    let server_addr = server.local_addr;
    let intruder = ephemeral().await;

    let peer = tokio::spawn(async move {
        let (_, from) = server.recv_from().await.unwrap();
        intruder
            .send_to(&Message::new(Opcode::Fail, "not me"), from)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        server
            .send_to(&Message::new(Opcode::Success, "real"), from)
            .await
            .unwrap();
    });

    let mut ch = channel(&config(1000)).await;
    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        ch.request(server_addr, Message::new(Opcode::Lookup, "Content")),
    )
    .await
    .unwrap();

    assert_eq!(reply, Message::new(Opcode::Success, "real"));
    peer.await.unwrap();
}

#[tokio::test]
async fn skips_undecodable_reply() {
    let raw = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server_addr = raw.local_addr().unwrap();

    let peer = tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        let (_, from) = raw.recv_from(&mut buf).await.unwrap();
        raw.send_to(&[0x00, 0x01], from).await.unwrap();
        raw.send_to(&Message::empty(Opcode::NotOk).encode(), from)
            .await
            .unwrap();
    });

    let mut ch = channel(&config(1000)).await;
    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        ch.request(server_addr, Message::new(Opcode::ValidateTransaction, "2\n1.0\n1")),
    )
    .await
    .unwrap();

    assert_eq!(reply.opcode, Opcode::NotOk);
    peer.await.unwrap();
}

/// A slow (not lost) reply lets the retransmission through as well: the peer
/// processes the same request twice.  At-least-once, by construction.
#[tokio::test]
async fn delayed_reply_means_duplicate_processing() {
    let server = ephemeral().await;
    let server_addr = server.local_addr;

    let peer = tokio::spawn(async move {
        let (first, from) = server.recv_from().await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        let (second, _) = server.recv_from().await.unwrap();
        server
            .send_to(&Message::new(Opcode::Success, "once"), from)
            .await
            .unwrap();
        server
            .send_to(&Message::new(Opcode::Success, "twice"), from)
            .await
            .unwrap();
        (first, second)
    });

    let mut ch = channel(&config(40)).await;
    let request = Message::new(Opcode::Register, "Bank\n127.0.0.1\n22000");
    let reply = tokio::time::timeout(Duration::from_secs(5), ch.request(server_addr, request.clone()))
        .await
        .unwrap();

    assert_eq!(reply.payload, "once");
    let (first, second) = peer.await.unwrap();
    assert_eq!(first, request);
    assert_eq!(second, request);
}

/// A duplicate reply left over from one exchange must not answer the next.
#[tokio::test]
async fn stale_duplicate_reply_is_not_taken_for_next_exchange() {
    let server = ephemeral().await;
    let server_addr = server.local_addr;

    let peer = tokio::spawn(async move {
        let (first, from) = server.recv_from().await.unwrap();
        // Both the original and a retransmission got answered.
        let verdict = Message::new(Opcode::Ok, first.payload);
        server.send_to(&verdict, from).await.unwrap();
        server.send_to(&verdict, from).await.unwrap();

        let (second, from) = server.recv_from().await.unwrap();
        server
            .send_to(&Message::new(Opcode::NotOk, second.payload), from)
            .await
            .unwrap();
    });

    let mut ch = channel(&config(1000)).await;
    let first = tokio::time::timeout(
        Duration::from_secs(5),
        ch.request(server_addr, Message::new(Opcode::ValidateTransaction, "1\n5.0\n42")),
    )
    .await
    .unwrap();
    assert_eq!(first, Message::new(Opcode::Ok, "1\n5.0\n42"));

    // Let the duplicate land in the socket before the next exchange starts.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = tokio::time::timeout(
        Duration::from_secs(5),
        ch.request(server_addr, Message::new(Opcode::ValidateTransaction, "2\n7.5\n42")),
    )
    .await
    .unwrap();
    assert_eq!(second, Message::new(Opcode::NotOk, "2\n7.5\n42"));
    peer.await.unwrap();
}
