//! Integration tests for `Listener::listen`.
//!
//! Each channel connection is an in-memory duplex pipe whose far end is
//! driven by a small fake chat server task. Tests run on a paused clock, so
//! "tick N" below means "during second N of the listening duration".
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use twl_core::{ChannelList, ChannelName, CloseReason, Identity, ListenerConfig, SessionState};
use twl_listener::{Connector, ListenError, Listener};

// ============================================================================
// Constants
// ============================================================================

const PING: &[u8] = b"PING :tmi.twitch.tv\r\n";
const PONG: &[u8] = b"PONG :tmi.twitch.tv\r\n";
const PIPE_CAPACITY: usize = 64 * 1024;

// ============================================================================
// Test Helpers
// ============================================================================

/// Duplex pipe that can be made to fail reads on demand.
struct TestStream {
    inner: DuplexStream,
    poisoned: Arc<AtomicBool>,
}

impl AsyncRead for TestStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.poisoned.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by test",
            )));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TestStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Server side of one channel connection.
struct FakeServer {
    stream: DuplexStream,
    poisoned: Arc<AtomicBool>,
}

impl FakeServer {
    /// Reads the join handshake and checks it byte for byte.
    async fn expect_handshake(&mut self, target: &str) {
        let expected = format!("PASS oauth:secret\nNICK listener\nJOIN {target}\n");
        let mut buf = vec![0u8; expected.len()];
        self.stream.read_exact(&mut buf).await.expect("read handshake");
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    async fn send(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.expect("server write");
    }

    async fn expect_pong(&mut self) {
        let mut buf = vec![0u8; PONG.len()];
        self.stream.read_exact(&mut buf).await.expect("read pong");
        assert_eq!(buf, PONG);
    }

    /// Makes the client's next read fail, waking it with a dummy byte.
    async fn fail_reads(&mut self) {
        self.poisoned.store(true, Ordering::SeqCst);
        let _ = self.stream.write_all(b"x").await;
    }

    /// Waits for the client to close; returns anything else it wrote.
    async fn expect_closed(mut self) -> Vec<u8> {
        let mut rest = Vec::new();
        self.stream.read_to_end(&mut rest).await.expect("read to eof");
        rest
    }
}

/// Hands out one prepared connection per channel name.
#[derive(Default)]
struct TestConnector {
    streams: Mutex<HashMap<String, TestStream>>,
}

impl TestConnector {
    fn add(&self, channel: &str) -> FakeServer {
        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        let poisoned = Arc::new(AtomicBool::new(false));
        self.streams.lock().unwrap().insert(
            channel.to_string(),
            TestStream {
                inner: client,
                poisoned: Arc::clone(&poisoned),
            },
        );
        FakeServer {
            stream: server,
            poisoned,
        }
    }
}

impl Connector for TestConnector {
    type Stream = TestStream;

    async fn connect(&self, channel: &ChannelName) -> io::Result<TestStream> {
        self.streams
            .lock()
            .unwrap()
            .remove(channel.as_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "unknown channel"))
    }
}

fn identity() -> Identity {
    Identity::new("listener", "secret", "test-client").unwrap()
}

fn listener(connector: TestConnector) -> Listener<TestConnector> {
    Listener::new(identity(), ListenerConfig::default(), connector)
}

fn read_log(root: &Path, channel: &str) -> String {
    std::fs::read_to_string(root.join(format!("{channel}.log"))).expect("read log")
}

fn at(start: Instant, secs: f64) -> Instant {
    start + Duration::from_secs_f64(secs)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_alpha_beta_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let connector = TestConnector::default();
    let mut alpha = connector.add("alpha");
    let mut beta = connector.add("beta");
    let start = Instant::now();

    let alpha_task = tokio::spawn(async move {
        alpha.expect_handshake("#alpha").await;
        sleep_until(at(start, 1.5)).await;
        alpha.send(PING).await;
        alpha.expect_pong().await;
        sleep_until(at(start, 3.5)).await;
        alpha.send(b"hello\n").await;
        let rest = alpha.expect_closed().await;
        (rest, Instant::now())
    });
    let beta_task = tokio::spawn(async move {
        beta.expect_handshake("#beta").await;
        let rest = beta.expect_closed().await;
        (rest, Instant::now())
    });

    let channels = ChannelList::parse(["alpha", "beta"]).unwrap();
    let summary = listener(connector)
        .listen(dir.path(), &channels, Duration::from_secs(5))
        .await
        .unwrap();

    // Logs: the ping is answered, not logged; beta stays empty.
    assert_eq!(read_log(dir.path(), "alpha"), "hello\n");
    assert_eq!(read_log(dir.path(), "beta"), "");

    // Both connections were closed after the duration, with nothing extra sent.
    let (alpha_rest, alpha_closed) = alpha_task.await.unwrap();
    let (beta_rest, beta_closed) = beta_task.await.unwrap();
    assert!(alpha_rest.is_empty());
    assert!(beta_rest.is_empty());
    assert!(alpha_closed >= at(start, 5.0));
    assert!(beta_closed >= at(start, 5.0));

    assert!(!summary.cancelled);
    assert!(summary.elapsed_ms >= 5000);
    assert!(summary.elapsed_ms <= 6100);
    let names: Vec<&str> = summary.channels.iter().map(|c| c.channel.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);

    let alpha_report = &summary.channels[0];
    assert_eq!(alpha_report.state, SessionState::Closed);
    assert_eq!(alpha_report.close_reason, CloseReason::DurationElapsed);
    assert_eq!(alpha_report.stats.pings_answered, 1);
    assert_eq!(alpha_report.stats.chunks_logged, 1);
    assert_eq!(alpha_report.stats.bytes_logged, 6);

    let beta_report = &summary.channels[1];
    assert_eq!(beta_report.close_reason, CloseReason::DurationElapsed);
    assert_eq!(beta_report.stats.chunks_logged, 0);
    assert_eq!(summary.failed_channels().count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_channel_does_not_stop_others() {
    let dir = tempfile::tempdir().unwrap();
    let connector = TestConnector::default();
    let mut alpha = connector.add("alpha");
    let mut beta = connector.add("beta");
    let start = Instant::now();

    let alpha_task = tokio::spawn(async move {
        alpha.expect_handshake("#alpha").await;
        for (secs, line) in [(1.5, "one\n"), (3.5, "three\n"), (4.5, "four\n")] {
            sleep_until(at(start, secs)).await;
            alpha.send(line.as_bytes()).await;
        }
        alpha.expect_closed().await
    });
    let beta_task = tokio::spawn(async move {
        beta.expect_handshake("#beta").await;
        sleep_until(at(start, 2.5)).await;
        beta.fail_reads().await;
        let rest = beta.expect_closed().await;
        (rest, Instant::now())
    });

    let channels = ChannelList::parse(["alpha", "beta"]).unwrap();
    let summary = listener(connector)
        .listen(dir.path(), &channels, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(read_log(dir.path(), "alpha"), "one\nthree\nfour\n");
    assert_eq!(read_log(dir.path(), "beta"), "");

    alpha_task.await.unwrap();
    let (_, beta_closed) = beta_task.await.unwrap();
    // Beta is closed as soon as it fails, not at the end.
    assert!(beta_closed < at(start, 5.0));

    assert_eq!(summary.channels[0].close_reason, CloseReason::DurationElapsed);
    assert!(matches!(summary.channels[1].close_reason, CloseReason::Io(_)));
    let failed: Vec<&str> = summary.failed_channels().map(|c| c.channel.as_str()).collect();
    assert_eq!(failed, vec!["beta"]);
}

#[cfg(target_os = "linux")]
#[tokio::test(start_paused = true)]
async fn test_log_write_failure_does_not_stop_others() {
    let dir = tempfile::tempdir().unwrap();
    // Every write to beta's log fails with ENOSPC.
    std::os::unix::fs::symlink("/dev/full", dir.path().join("beta.log")).unwrap();
    let connector = TestConnector::default();
    let mut alpha = connector.add("alpha");
    let mut beta = connector.add("beta");
    let start = Instant::now();

    let alpha_task = tokio::spawn(async move {
        alpha.expect_handshake("#alpha").await;
        for (secs, line) in [(1.5, "one\n"), (2.5, "two\n"), (3.5, "three\n")] {
            sleep_until(at(start, secs)).await;
            alpha.send(line.as_bytes()).await;
        }
        alpha.expect_closed().await
    });
    let beta_task = tokio::spawn(async move {
        beta.expect_handshake("#beta").await;
        sleep_until(at(start, 1.5)).await;
        beta.send(b"lost\n").await;
        let rest = beta.expect_closed().await;
        (rest, Instant::now())
    });

    let channels = ChannelList::parse(["alpha", "beta"]).unwrap();
    let summary = listener(connector)
        .listen(dir.path(), &channels, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(read_log(dir.path(), "alpha"), "one\ntwo\nthree\n");
    alpha_task.await.unwrap();
    let (_, beta_closed) = beta_task.await.unwrap();
    assert!(beta_closed < at(start, 5.0));

    assert_eq!(summary.channels[0].close_reason, CloseReason::DurationElapsed);
    assert_eq!(summary.channels[0].stats.chunks_logged, 3);
    assert!(matches!(summary.channels[1].close_reason, CloseReason::Io(_)));
    assert_eq!(summary.channels[1].stats.chunks_logged, 0);
    let failed: Vec<&str> = summary.failed_channels().map(|c| c.channel.as_str()).collect();
    assert_eq!(failed, vec!["beta"]);
}

#[tokio::test(start_paused = true)]
async fn test_server_hangup_closes_channel() {
    let dir = tempfile::tempdir().unwrap();
    let connector = TestConnector::default();
    let mut alpha = connector.add("alpha");
    let start = Instant::now();

    tokio::spawn(async move {
        alpha.expect_handshake("#alpha").await;
        alpha.send(b"bye\n").await;
        sleep_until(at(start, 1.0)).await;
        drop(alpha);
    });

    let channels = ChannelList::parse(["alpha"]).unwrap();
    let summary = listener(connector)
        .listen(dir.path(), &channels, Duration::from_secs(3))
        .await
        .unwrap();

    assert_eq!(read_log(dir.path(), "alpha"), "bye\n");
    assert_eq!(summary.channels[0].close_reason, CloseReason::Eof);
    // The loop still runs to the end of the duration.
    assert!(summary.elapsed_ms >= 3000);
}

#[tokio::test(start_paused = true)]
async fn test_join_failure_aborts_everything() {
    let dir = tempfile::tempdir().unwrap();
    let connector = TestConnector::default();
    let mut alpha = connector.add("alpha");
    // No connection prepared for beta.

    let alpha_task = tokio::spawn(async move {
        alpha.expect_handshake("#alpha").await;
        alpha.expect_closed().await
    });

    let channels = ChannelList::parse(["alpha", "beta"]).unwrap();
    let err = listener(connector)
        .listen(dir.path(), &channels, Duration::from_secs(5))
        .await
        .unwrap_err();

    match err {
        ListenError::Connection { channel, .. } => assert_eq!(channel.as_str(), "beta"),
        other => panic!("expected connection error, got {other:?}"),
    }
    // The already joined channel is closed again.
    assert!(alpha_task.await.unwrap().is_empty());
    assert_eq!(read_log(dir.path(), "alpha"), "");
}

#[tokio::test]
async fn test_no_channels() {
    let dir = tempfile::tempdir().unwrap();
    let err = listener(TestConnector::default())
        .listen(dir.path(), &ChannelList::default(), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ListenError::NoChannels));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_ends_listen_early() {
    let dir = tempfile::tempdir().unwrap();
    let connector = TestConnector::default();
    let mut alpha = connector.add("alpha");

    let alpha_task = tokio::spawn(async move {
        alpha.expect_handshake("#alpha").await;
        alpha.expect_closed().await
    });

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        canceller.cancel();
    });

    let channels = ChannelList::parse(["alpha"]).unwrap();
    let summary = listener(connector)
        .with_cancellation(token)
        .listen(dir.path(), &channels, Duration::from_secs(60))
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert!(summary.elapsed_ms < 4000);
    assert_eq!(summary.channels[0].close_reason, CloseReason::Cancelled);
    assert!(alpha_task.await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_split_character_is_logged_whole() {
    let dir = tempfile::tempdir().unwrap();
    let connector = TestConnector::default();
    let mut alpha = connector.add("alpha");
    let start = Instant::now();

    let line = "caf\u{e9}\n".as_bytes().to_vec();
    tokio::spawn(async move {
        alpha.expect_handshake("#alpha").await;
        // Split the two-byte character across reads.
        alpha.send(&line[..4]).await;
        sleep_until(at(start, 1.5)).await;
        alpha.send(&line[4..]).await;
        alpha.expect_closed().await
    });

    let channels = ChannelList::parse(["alpha"]).unwrap();
    listener(connector)
        .listen(dir.path(), &channels, Duration::from_secs(3))
        .await
        .unwrap();

    assert_eq!(read_log(dir.path(), "alpha"), "caf\u{e9}\n");
}
