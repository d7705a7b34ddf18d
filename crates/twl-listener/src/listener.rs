//! Multiplexed listener: joins channels, polls them and records traffic.
//!
//! `listen` runs in three phases:
//!
//! 1. **Join** - one [`ChannelSession`] per channel, in order. Any failure
//!    aborts the whole call; sessions joined so far are closed first.
//! 2. **Poll** - until the duration elapses: wait (bounded by the poll
//!    timeout) for ready connections, handle every ready chunk in join
//!    order, then sleep whatever is left of the tick budget.
//! 3. **Teardown** - close every remaining session in join order.
//!
//! A channel whose connection fails during polling is closed and dropped
//! from the readiness set; the other channels keep being polled.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncWrite, WriteHalf};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use twl_core::{ChannelList, CloseReason, Identity, ListenerConfig};

use crate::connector::{Connector, TcpConnector};
use crate::error::ListenError;
use crate::pacing::{Pacer, RateLimit};
use crate::readiness::{ReadOutcome, Readiness, ReaderPool};
use crate::session::{ChannelReport, ChannelSession, Joined};
use crate::summary::ListenSummary;

/// Joins channels and records them for a bounded duration.
///
/// Owns the identity and configuration; every `listen` call builds a fresh
/// set of sessions and tears all of them down before returning.
pub struct Listener<C> {
    identity: Identity,
    config: ListenerConfig,
    connector: C,
    cancel: Option<CancellationToken>,
}

impl Listener<TcpConnector> {
    /// Creates a listener that connects to the server named in `config`.
    pub fn tcp(identity: Identity, config: ListenerConfig) -> Self {
        let connector = TcpConnector::from_config(&config);
        Self::new(identity, config, connector)
    }
}

impl<C: Connector> Listener<C> {
    pub fn new(identity: Identity, config: ListenerConfig, connector: C) -> Self {
        Self {
            identity,
            config,
            connector,
            cancel: None,
        }
    }

    /// Lets `token` end the polling loop early.
    ///
    /// The token is checked once per tick and interrupts the pacing sleep;
    /// teardown runs as usual.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Joins `channels`, records them to `<log_root>/<channel>.log` for
    /// `duration`, then closes everything.
    ///
    /// Returns an error only when joining fails (or no channel was given);
    /// failures of individual channels while polling are reported in the
    /// summary.
    pub async fn listen(
        &self,
        log_root: &Path,
        channels: &ChannelList,
        duration: Duration,
    ) -> Result<ListenSummary, ListenError> {
        if channels.is_empty() {
            return Err(ListenError::NoChannels);
        }

        let started_at = Utc::now();
        let joined = self.join_all(log_root, channels).await?;

        let mut pool = ReaderPool::new(self.config.read_buffer_size);
        let mut slots = Vec::with_capacity(joined.len());
        for Joined { session, reader } in joined {
            pool.register(reader);
            slots.push(ChannelSlot::open(session));
        }

        let plan = LoopPlan {
            duration,
            poll_timeout: self.config.poll_timeout(),
            rate_limit: RateLimit::from_config(&self.config.rate_limit),
        };
        info!(
            channels = slots.len(),
            duration_secs = duration.as_secs_f64(),
            tick_budget_ms = plan.rate_limit.tick_budget().as_millis() as u64,
            "Listening"
        );

        let stats = run_loop(&mut slots, &mut pool, &plan, self.cancel.as_ref()).await;

        let reason = if stats.cancelled {
            CloseReason::Cancelled
        } else {
            CloseReason::DurationElapsed
        };
        let mut reports = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            pool.release(index);
            if let Some(report) = slot.finish(reason.clone()).await {
                reports.push(report);
            }
        }
        drop(pool);

        info!(
            ticks = stats.ticks,
            elapsed_ms = millis(stats.elapsed),
            cancelled = stats.cancelled,
            "Listening finished"
        );

        Ok(ListenSummary {
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: millis(stats.elapsed),
            ticks: stats.ticks,
            paced_ms: millis(stats.paced),
            cancelled: stats.cancelled,
            channels: reports,
        })
    }

    /// Joins every channel in order, all or nothing.
    async fn join_all(
        &self,
        log_root: &Path,
        channels: &ChannelList,
    ) -> Result<Vec<Joined<C::Stream>>, ListenError> {
        let mut joined: Vec<Joined<C::Stream>> = Vec::with_capacity(channels.len());

        for channel in channels {
            let result = ChannelSession::<WriteHalf<C::Stream>>::join(
                &self.connector,
                &self.identity,
                channel,
                log_root,
                &self.config,
            )
            .await;

            match result {
                Ok(session) => joined.push(session),
                Err(e) => {
                    error!(channel = %channel, error = %e, "Join failed, abandoning all channels");
                    for Joined { session, reader } in joined {
                        drop(reader);
                        session.close(CloseReason::JoinAborted).await;
                    }
                    return Err(e);
                }
            }
        }

        Ok(joined)
    }
}

/// Fixed parameters of one polling run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoopPlan {
    pub duration: Duration,
    pub poll_timeout: Duration,
    pub rate_limit: RateLimit,
}

/// Totals of one polling run.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LoopStats {
    pub ticks: u64,
    pub paced: Duration,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// A session position in join order; keeps its report once closed.
pub(crate) struct ChannelSlot<W> {
    session: Option<ChannelSession<W>>,
    report: Option<ChannelReport>,
}

impl<W> ChannelSlot<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub(crate) fn open(session: ChannelSession<W>) -> Self {
        Self {
            session: Some(session),
            report: None,
        }
    }

    async fn close(&mut self, reason: CloseReason, allowance: Duration) {
        if let Some(session) = self.session.take() {
            self.report = Some(session.close_within(reason, allowance).await);
        }
    }

    /// Closes the session if still open and returns the channel's report.
    pub(crate) async fn finish(self, reason: CloseReason) -> Option<ChannelReport> {
        match self.session {
            Some(session) => Some(session.close(reason).await),
            None => self.report,
        }
    }
}

/// The polling loop.
///
/// Runs until `plan.duration` has elapsed since entry or `cancel` fires,
/// and never past `duration + poll_timeout`: keep-alive replies and the
/// closing of failed channels only get the time left before that deadline. Replies are written as soon as
/// their chunk is handled and are never delayed by pacing; pacing only
/// spaces out whole ticks.
pub(crate) async fn run_loop<W, R>(
    slots: &mut [ChannelSlot<W>],
    readiness: &mut R,
    plan: &LoopPlan,
    cancel: Option<&CancellationToken>,
) -> LoopStats
where
    W: AsyncWrite + Unpin + Send,
    R: Readiness,
{
    let start = Instant::now();
    let end = start + plan.duration;
    let deadline = end + plan.poll_timeout;
    let mut pacer = Pacer::new(plan.rate_limit);
    let mut cancelled = false;

    while start.elapsed() < plan.duration {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            cancelled = true;
            break;
        }

        let tick_start = Instant::now();
        let ready = readiness.wait_ready(plan.poll_timeout).await;
        trace!(tick = pacer.ticks(), ready = ready.len(), "Tick");

        for event in ready {
            let Some(slot) = slots.get_mut(event.slot) else {
                continue;
            };
            let Some(session) = slot.session.as_mut() else {
                continue;
            };

            let fault = match event.outcome {
                ReadOutcome::Data(bytes) => {
                    let allowance = deadline.saturating_duration_since(Instant::now());
                    match session.handle_chunk(&bytes, allowance).await {
                        Ok(outcome) => {
                            trace!(channel = %session.name(), ?outcome, "Chunk handled");
                            None
                        }
                        Err(e) => Some(CloseReason::Io(e.to_string())),
                    }
                }
                ReadOutcome::Eof => Some(CloseReason::Eof),
                ReadOutcome::Failed(e) => Some(CloseReason::Io(e.to_string())),
            };

            if let Some(reason) = fault {
                warn!(
                    channel = %session.name(),
                    reason = %reason,
                    "Channel failed, removing it from polling"
                );
                readiness.release(event.slot);
                let allowance = deadline.saturating_duration_since(Instant::now());
                slot.close(reason, allowance).await;
            }
        }

        if let Some(owed) = pacer.delay_after(tick_start.elapsed()) {
            let delay = owed.min(end.saturating_duration_since(Instant::now()));
            match cancel {
                Some(token) => {
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = token.cancelled() => {
                            debug!("Cancelled during pacing sleep");
                        }
                    }
                }
                None => sleep(delay).await,
            }
        }
    }

    LoopStats {
        ticks: pacer.ticks(),
        paced: pacer.paced(),
        elapsed: start.elapsed(),
        cancelled,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
