//! Cooperative wall-clock budgets and named timers.
//!
//! A [`Deadline`] is a stack of absolute cutoffs. The outermost one is set by
//! the caller; nested computations push a sub-deadline covering a fraction of
//! whatever time remains and pop it when they finish, so an inner search can
//! never overrun the share its caller granted it. Long-running loops poll
//! [`Deadline::expired`] and stop early with whatever they have built.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{debug, warn};

/// Stack of cutoffs; `None` entries are unlimited.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    stack: Vec<Option<Instant>>,
}

impl Deadline {
    /// A budget with no cutoff.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// A budget expiring `seconds` from now.
    #[must_use]
    pub fn from_now(seconds: f64) -> Self {
        let mut deadline = Self::default();
        deadline.set_from_now(seconds);
        deadline
    }

    /// Pushes a cutoff `seconds` from now. Negative or non-finite values
    /// count as zero.
    pub fn set_from_now(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.stack
            .push(Some(Instant::now() + Duration::from_secs_f64(seconds)));
    }

    /// Pushes a cutoff at `fraction` of the time left before the current one.
    /// Under an unlimited budget the sub-deadline is unlimited as well.
    pub fn push_subdeadline(&mut self, fraction: f64) {
        let sub = self.current().map(|cutoff| {
            let now = Instant::now();
            if cutoff < now {
                warn!(
                    "deadline missed by {:?} before pushing a sub-deadline",
                    now - cutoff
                );
                return cutoff;
            }
            let fraction = fraction.clamp(0.0, 1.0);
            now + (cutoff - now).mul_f64(fraction)
        });
        self.stack.push(sub);
    }

    /// Drops the innermost cutoff. Popping an empty stack is a no-op.
    pub fn pop_subdeadline(&mut self) {
        self.stack.pop();
    }

    /// Innermost cutoff, or `None` if unlimited.
    #[must_use]
    pub fn current(&self) -> Option<Instant> {
        self.stack.last().copied().flatten()
    }

    /// Time left before the innermost cutoff, or `None` if unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.current()
            .map(|cutoff| cutoff.saturating_duration_since(Instant::now()))
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.current().is_some_and(|cutoff| Instant::now() > cutoff)
    }

    /// Number of pushed cutoffs.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Accumulated wall-clock time per named section.
#[derive(Debug, Clone, Default)]
pub struct Timers {
    totals: BTreeMap<&'static str, Duration>,
}

impl Timers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        *self.totals.entry(name).or_default() += elapsed;
    }

    #[must_use]
    pub fn total(&self, name: &str) -> Duration {
        self.totals.get(name).copied().unwrap_or_default()
    }

    /// Logs every total at debug level, one line per section.
    pub fn report(&self) {
        for (name, total) in &self.totals {
            debug!("# {name}_time = {:.6}", total.as_secs_f64());
        }
    }
}
