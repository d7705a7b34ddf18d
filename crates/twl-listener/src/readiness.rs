//! Readiness across all channel connections.
//!
//! The polling loop only needs one capability: "block up to a timeout and
//! return whatever the connections have produced". [`Readiness`] is that
//! seam; [`ReaderPool`] implements it with one reader task per connection
//! feeding a shared queue.
//!
//! ```text
//! ┌──────────┐  ReadEvent  ┌────────────┐  wait_ready()  ┌───────────┐
//! │ reader 0 │────────────▶│            │───────────────▶│           │
//! ├──────────┤             │ mpsc queue │                │ poll loop │
//! │ reader 1 │────────────▶│            │                │           │
//! └──────────┘             └────────────┘                └───────────┘
//! ```
//!
//! Readers never write and never touch the logs, so writes and appends
//! stay serialized on the loop.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Queue capacity shared by all readers.
const EVENT_BUFFER: usize = 256;

/// Result of one read on a connection.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Up to one read buffer of bytes
    Data(Vec<u8>),
    /// The peer closed the connection
    Eof,
    /// The read failed
    Failed(io::Error),
}

/// A read that completed on connection `slot`.
#[derive(Debug)]
pub struct ReadEvent {
    pub slot: usize,
    pub outcome: ReadOutcome,
}

/// Blocking readiness check over a set of connections.
pub trait Readiness {
    /// Waits up to `timeout` for at least one connection to produce
    /// something and returns every event available at that point, ordered
    /// by slot. Events of one slot keep their read order. Returns an empty
    /// list when the timeout expires.
    fn wait_ready(&mut self, timeout: Duration) -> impl Future<Output = Vec<ReadEvent>> + Send;

    /// Stops watching `slot`; later events for it are not delivered.
    fn release(&mut self, slot: usize);
}

/// One reader task per registered connection.
///
/// Dropping the pool aborts every reader, which drops the read halves.
#[derive(Debug)]
pub struct ReaderPool {
    buffer_size: usize,
    tx: mpsc::Sender<ReadEvent>,
    rx: mpsc::Receiver<ReadEvent>,
    readers: Vec<Option<JoinHandle<()>>>,
}

impl ReaderPool {
    /// Creates an empty pool that reads at most `buffer_size` bytes at once.
    pub fn new(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            buffer_size: buffer_size.max(1),
            tx,
            rx,
            readers: Vec::new(),
        }
    }

    /// Starts reading `reader` and returns its slot.
    ///
    /// Slots are handed out in registration order starting at 0.
    pub fn register<R>(&mut self, reader: R) -> usize
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let slot = self.readers.len();
        let handle = tokio::spawn(read_loop(slot, reader, self.tx.clone(), self.buffer_size));
        self.readers.push(Some(handle));
        slot
    }

    /// Number of slots still being read.
    pub fn active(&self) -> usize {
        self.readers.iter().filter(|r| r.is_some()).count()
    }

    fn is_active(&self, slot: usize) -> bool {
        matches!(self.readers.get(slot), Some(Some(_)))
    }
}

impl Readiness for ReaderPool {
    async fn wait_ready(&mut self, timeout: Duration) -> Vec<ReadEvent> {
        let mut ready = Vec::new();

        // The pool holds a sender itself, so `recv` only ends by timeout.
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => ready.push(event),
            Ok(None) | Err(_) => return ready,
        }
        while let Ok(event) = self.rx.try_recv() {
            ready.push(event);
        }

        ready.retain(|event| self.is_active(event.slot));
        // Stable, so per-slot order is kept.
        ready.sort_by_key(|event| event.slot);
        ready
    }

    fn release(&mut self, slot: usize) {
        if let Some(entry) = self.readers.get_mut(slot) {
            if let Some(handle) = entry.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for ReaderPool {
    fn drop(&mut self) {
        for handle in self.readers.iter_mut().filter_map(Option::take) {
            handle.abort();
        }
    }
}

async fn read_loop<R>(slot: usize, mut reader: R, tx: mpsc::Sender<ReadEvent>, buffer_size: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    loop {
        let outcome = match reader.read(&mut buf).await {
            Ok(0) => ReadOutcome::Eof,
            Ok(n) => ReadOutcome::Data(buf.get(..n).map(<[u8]>::to_vec).unwrap_or_default()),
            Err(e) => ReadOutcome::Failed(e),
        };
        let last = !matches!(outcome, ReadOutcome::Data(_));
        trace!(slot, last, "Read completed");

        if tx.send(ReadEvent { slot, outcome }).await.is_err() || last {
            break;
        }
    }
}
