// ABOUTME: Counters shared between the inbound and submission sides of a load test
// ABOUTME: Message id minting, per-kind dispatch counts and the submission batch summary

use crate::client::{SmppError, SmppResult, SubmitResponse};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Mints `msgID_<n>` identifiers for deliver_sm responses.
///
/// Incremented before use, so a counter created with `new()` hands out
/// `msgID_2` first. Safe to share across any number of inbound tasks.
#[derive(Debug)]
pub struct InboundMessageCounter {
    value: AtomicU64,
}

impl InboundMessageCounter {
    pub const INITIAL: u64 = 1;

    pub fn new() -> Self {
        Self::starting_at(Self::INITIAL)
    }

    pub fn starting_at(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    /// Increment and return the new value
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn next_id(&self) -> String {
        format!("msgID_{}", self.next())
    }

    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for InboundMessageCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-kind counts of what the dispatcher did
#[derive(Debug, Default)]
pub struct DispatchStats {
    deliveries: AtomicU64,
    unbinds: AtomicU64,
    enquire_links: AtomicU64,
    generic_nacks: AtomicU64,
    malformed: AtomicU64,
    respond_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub deliveries: u64,
    pub unbinds: u64,
    pub enquire_links: u64,
    pub generic_nacks: u64,
    pub malformed: u64,
    pub respond_failures: u64,
}

impl DispatchStats {
    pub fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unbind(&self) {
        self.unbinds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enquire_link(&self) {
        self.enquire_links.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generic_nack(&self) {
        self.generic_nacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_respond_failure(&self) {
        self.respond_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            deliveries: self.deliveries.load(Ordering::Relaxed),
            unbinds: self.unbinds.load(Ordering::Relaxed),
            enquire_links: self.enquire_links.load(Ordering::Relaxed),
            generic_nacks: self.generic_nacks.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            respond_failures: self.respond_failures.load(Ordering::Relaxed),
        }
    }
}

/// Result of sending one record. Folded into `SubmissionSummary`, never stored.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub succeeded: bool,
    pub error: Option<SmppError>,
}

impl From<SmppResult<SubmitResponse>> for SubmissionOutcome {
    fn from(result: SmppResult<SubmitResponse>) -> Self {
        match result {
            Ok(_) => SubmissionOutcome {
                succeeded: true,
                error: None,
            },
            Err(error) => SubmissionOutcome {
                succeeded: false,
                error: Some(error),
            },
        }
    }
}

/// Totals for one submission batch
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubmissionSummary {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Wall clock for the whole batch, file loading included
    pub elapsed: Duration,
}

impl SubmissionSummary {
    pub fn record(&mut self, outcome: &SubmissionOutcome) {
        self.attempted += 1;
        if outcome.succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Attempted sends per second, `None` when no time was measured
    pub fn throughput(&self) -> Option<f64> {
        let seconds = self.elapsed.as_secs_f64();
        (seconds > 0.0).then(|| self.attempted as f64 / seconds)
    }
}
