//! The run loop: one lookup per tick until shutdown, then release.
//!
//! ```text
//! Idle --run()--> Running --shutdown--> Stopping --release()--> Stopped
//!                  ^    |
//!                  +tick+
//! ```
//!
//! The wait between ticks is a single biased `select!` with the shutdown
//! branch first. Once shutdown has been observed no further lookup starts,
//! even if a tick is ready at the same instant.

use std::fmt;
use std::future::Future;

use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::attach::AttachmentManager;
use crate::key::TargetKey;
use crate::program::InspectionProgram;
use crate::table::{CounterReading, CounterTable};

/// `interval` panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// One observable event emitted by the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Reading(CounterReading),
    LookupFailed(String),
    ShuttingDown,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Reading(reading) => write!(f, "{reading}"),
            Report::LookupFailed(reason) => write!(f, "lookup failed: {reason}"),
            Report::ShuttingDown => f.write_str("shutting down"),
        }
    }
}

/// Where the loop sends its reports.
pub trait ReportSink {
    fn report(&mut self, report: &Report);
}

/// Production sink: one log line per report.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    target: TargetKey,
}

impl LogSink {
    pub fn new(target: TargetKey) -> Self {
        Self { target }
    }
}

impl ReportSink for LogSink {
    fn report(&mut self, report: &Report) {
        match report {
            Report::Reading(CounterReading::Observed(count)) => {
                info!("received {} packets from {}", count, self.target);
            }
            Report::Reading(CounterReading::NotYetObserved) => {
                info!("waiting for first packet from {}", self.target);
            }
            Report::LookupFailed(reason) => {
                warn!("counter lookup for {} failed: {}", self.target, reason);
            }
            Report::ShuttingDown => info!("received shutdown signal, exiting"),
        }
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    /// Ticks that performed a lookup.
    pub ticks: u64,
    /// Whether this run released a live attachment on the way out.
    pub released: bool,
}

pub struct PollLoop<'a, P: InspectionProgram, S: ReportSink> {
    attachment: &'a mut AttachmentManager<P>,
    key: TargetKey,
    period: Duration,
    sink: S,
    state: PollState,
    ticks: u64,
}

impl<'a, P: InspectionProgram, S: ReportSink> PollLoop<'a, P, S> {
    pub fn new(
        attachment: &'a mut AttachmentManager<P>,
        key: TargetKey,
        period: Duration,
        sink: S,
    ) -> Self {
        Self {
            attachment,
            key,
            period: period.max(MIN_PERIOD),
            sink,
            state: PollState::Idle,
            ticks: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Poll until `shutdown` resolves, then release the attachment.
    ///
    /// The first tick fires one period after the call. A loop that has
    /// already run returns immediately without touching the attachment.
    pub async fn run<F>(&mut self, shutdown: F) -> PollSummary
    where
        F: Future<Output = ()>,
    {
        if self.state != PollState::Idle {
            warn!("poll loop already ran (state {:?})", self.state);
            return PollSummary {
                ticks: self.ticks,
                released: false,
            };
        }
        self.state = PollState::Running;

        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => self.tick(),
            }
        }

        self.state = PollState::Stopping;
        self.sink.report(&Report::ShuttingDown);
        let released = self.attachment.release();
        self.state = PollState::Stopped;

        PollSummary {
            ticks: self.ticks,
            released,
        }
    }

    fn tick(&mut self) {
        self.ticks += 1;
        let report = match self.attachment.lookup(self.key) {
            Ok(reading) => Report::Reading(reading),
            Err(e) => Report::LookupFailed(e.to_string()),
        };
        self.sink.report(&report);
    }
}
