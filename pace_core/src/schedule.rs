//! Cooperative, drift-corrected periodic scheduler.
//!
//! Each registered routine keeps an absolute next-fire target. A due routine
//! runs synchronously on the polling thread, then its target advances by
//! exactly one period from the previous target, so the routine's own run
//! time never accumulates as drift. Routines are visited in registration
//! order on every poll.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use pace_traits::Clock;

use crate::error::Result;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A scheduled routine. `S` is the state all routines share.
pub type Routine<S> = Box<dyn FnMut(&mut S) -> Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Firing {
    /// The time the routine was due.
    pub target: Instant,
    /// When it actually started.
    pub started: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    MaxFirings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub firings: usize,
    pub reason: StopReason,
}

struct Entry<S> {
    name: String,
    period: Duration,
    next_fire: Option<Instant>,
    routine: Routine<S>,
    log: Vec<Firing>,
}

pub struct Scheduler<S, C: Clock> {
    clock: C,
    entries: Vec<Entry<S>>,
    poll_interval: Duration,
    sim_period: Option<Duration>,
    max_firings: Option<usize>,
    firings: usize,
}

impl<S, C: Clock> Scheduler<S, C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            entries: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            sim_period: None,
            max_firings: None,
            firings: 0,
        }
    }

    pub fn with_poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    /// Replace every period with `period` to exercise the routines quickly.
    pub fn simulate(mut self, period: Duration) -> Self {
        self.sim_period = Some(period);
        self
    }

    /// Stop `run_until` after this many firings in total.
    pub fn with_max_firings(mut self, n: usize) -> Self {
        self.max_firings = Some(n);
        self
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        period: Duration,
        routine: impl FnMut(&mut S) -> Result<()> + 'static,
    ) {
        let name = name.into();
        tracing::debug!(task = %name, period_s = period.as_secs_f64(), "routine registered");
        self.entries.push(Entry {
            name,
            period,
            next_fire: None,
            routine: Box::new(routine),
            log: Vec::new(),
        });
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Total firings so far.
    pub fn firings(&self) -> usize {
        self.firings
    }

    /// Firings of the routine registered as `name`, oldest first.
    pub fn fire_log(&self, name: &str) -> Option<&[Firing]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.log.as_slice())
    }

    pub fn next_fire(&self, name: &str) -> Option<Instant> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.next_fire)
    }

    fn limit_reached(&self) -> bool {
        self.max_firings.is_some_and(|n| self.firings >= n)
    }

    /// Visit every routine once, running those that are due. Returns how many
    /// fired. A failing routine stops the visit and its error is returned.
    pub fn poll_once(&mut self, state: &mut S) -> Result<usize> {
        let mut fired = 0;
        for i in 0..self.entries.len() {
            if self.limit_reached() {
                break;
            }
            let now = self.clock.now();
            let period = self.sim_period.unwrap_or(self.entries[i].period);
            let entry = &mut self.entries[i];
            let target = *entry.next_fire.get_or_insert(now);
            if now < target {
                continue;
            }
            tracing::info!(
                task = %entry.name,
                late_ms = now.saturating_duration_since(target).as_millis() as u64,
                "firing"
            );
            entry.log.push(Firing {
                target,
                started: now,
            });
            let name = &entry.name;
            (entry.routine)(state).wrap_err_with(|| format!("scheduled routine `{name}`"))?;
            entry.next_fire = Some(target + period);
            fired += 1;
            self.firings += 1;
        }
        Ok(fired)
    }

    /// Poll until `shutdown` is set, the firing limit is reached, or a routine
    /// fails. Sleeps one poll interval after every poll that fired nothing.
    pub fn run_until(&mut self, state: &mut S, shutdown: &AtomicBool) -> Result<RunSummary> {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!(firings = self.firings, "shutdown requested");
                return Ok(RunSummary {
                    firings: self.firings,
                    reason: StopReason::Shutdown,
                });
            }
            if self.limit_reached() {
                tracing::info!(firings = self.firings, "firing limit reached");
                return Ok(RunSummary {
                    firings: self.firings,
                    reason: StopReason::MaxFirings,
                });
            }
            if self.poll_once(state)? == 0 {
                self.clock.sleep(self.poll_interval);
            }
        }
    }
}
