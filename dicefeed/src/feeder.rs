//! The periodic feed loop.
//!
//! Ticks are aligned to wall-clock multiples of the configured interval:
//! with a one minute interval the loop fires on minute boundaries rather
//! than at process start plus one minute. The loop is an explicit
//! compute-deadline, wait-or-cancel state machine over an injected
//! [`Clock`] so alignment and cancellation priority are testable without
//! real waits.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rand::rngs::OsRng;
use tracing::{debug, error, info};

use crate::{config::Config, graphite, sample};

#[async_trait]
/// The clock that drives [`Feeder`].
pub trait Clock {
    /// Wall-clock time, as a duration since the Unix epoch.
    fn now(&self) -> Duration;
    /// Suspend until `deadline` (a duration since the Unix epoch) has
    /// passed. Returns immediately if it already has.
    async fn sleep_until(&self, deadline: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
/// A clock that operates with respect to real wall-clock time.
pub struct RealClock;

#[async_trait]
impl Clock for RealClock {
    /// # Panics
    ///
    /// Function will panic if the system clock is set before the Unix
    /// epoch.
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock set before the Unix epoch")
    }

    async fn sleep_until(&self, deadline: Duration) {
        if let Some(remaining) = deadline.checked_sub(self.now()) {
            tokio::time::sleep(remaining).await;
        }
    }
}

/// Smallest multiple of `interval` strictly greater than `now`, both
/// measured from the Unix epoch.
///
/// # Panics
///
/// Function will panic if `interval` is zero or if the next boundary does
/// not fit in `u64` nanoseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn next_aligned(now: Duration, interval: Duration) -> Duration {
    assert!(!interval.is_zero(), "interval must be non-zero");
    let interval = interval.as_nanos();
    let next = ((now.as_nanos() / interval) + 1) * interval;
    assert!(
        next <= u128::from(u64::MAX),
        "aligned deadline beyond year 2554"
    );
    Duration::from_nanos(next as u64)
}

#[derive(Debug)]
/// The periodic feeder.
///
/// Drives one batch of samples to the backend per aligned tick until
/// cancelled.
pub struct Feeder<C = RealClock> {
    config: Config,
    client: graphite::Client,
    clock: C,
    shutdown: dicefeed_signal::Watcher,
}

impl Feeder<RealClock> {
    /// Create a new [`Feeder`] driven by the system clock.
    #[must_use]
    pub fn new(config: Config, shutdown: dicefeed_signal::Watcher) -> Self {
        Self::with_clock(config, RealClock, shutdown)
    }
}

impl<C> Feeder<C>
where
    C: Clock + Send + Sync,
{
    /// Create a new [`Feeder`] driven by the given clock.
    #[must_use]
    pub fn with_clock(config: Config, clock: C, shutdown: dicefeed_signal::Watcher) -> Self {
        let client = graphite::Client::new(&config.graphite_addr, config.graphite_port);
        Self {
            config,
            client,
            clock,
            shutdown,
        }
    }

    /// Run the feed loop until cancellation.
    ///
    /// Wakes at every interval boundary and submits one batch per wake. A
    /// failed submission is logged and the loop carries on; only the
    /// cancellation signal ends it. When a tick and cancellation are ready
    /// at the same time, cancellation wins.
    pub async fn spin(self) {
        let Self {
            config,
            client,
            clock,
            shutdown,
        } = self;
        let interval = config.interval();

        let now = clock.now();
        let mut deadline = next_aligned(now, interval);
        info!(
            "{server_id} sleeping {sleep:?} until first aligned tick at unix {wake}",
            server_id = config.server_id,
            sleep = deadline.saturating_sub(now),
            wake = deadline.as_secs(),
        );

        let shutdown_wait = shutdown.recv();
        tokio::pin!(shutdown_wait);
        loop {
            tokio::select! {
                biased;

                () = &mut shutdown_wait => {
                    info!("shutdown signal received");
                    return;
                }
                () = clock.sleep_until(deadline) => {
                    tick(&config, &client, deadline).await;
                    // Overruns skip boundaries instead of queueing ticks:
                    // the next deadline comes from the clock, not from the
                    // previous deadline.
                    deadline = next_aligned(clock.now(), interval);
                    debug!("next tick at unix {wake}", wake = deadline.as_secs());
                }
            }
        }
    }
}

/// Generate and submit one batch, stamped with the tick's nominal time.
async fn tick(config: &Config, client: &graphite::Client, deadline: Duration) {
    let mut rng = OsRng;
    let batch = sample::build_batch(&mut rng, deadline.as_secs(), config);

    let start = Instant::now();
    match client.submit(&batch).await {
        Ok(()) => info!(
            "submitted {count} samples for {server_id} in {elapsed:?}",
            count = batch.len(),
            server_id = config.server_id,
            elapsed = start.elapsed(),
        ),
        Err(err) => error!(
            "failed to submit batch for {server_id} after {elapsed:?}: {err}",
            server_id = config.server_id,
            elapsed = start.elapsed(),
        ),
    }
}
