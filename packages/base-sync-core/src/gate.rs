//! Duplicate and stale delivery filter keyed on notification sequence numbers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of presenting a notification number to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Number is above the high-water mark, which now equals it.
    Accepted {
        /// High-water mark before this notification
        previous: u64,
        /// Numbers skipped between `previous` and this one (0 before the first accept)
        missed: u64,
    },
    /// Number is at or below the high-water mark; drop the notification.
    Rejected { last_processed: u64 },
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted { .. })
    }
}

/// Tracks the highest processed notification number.
///
/// The mark advances in [`admit`](Self::admit), before any change of the
/// batch is applied, so a batch that fails halfway is never processed twice.
/// Gaps are reported through the `missed` count of an accepted decision but
/// never block acceptance.
#[derive(Debug, Default)]
pub struct NotificationGate {
    last_processed: AtomicU64,
}

impl NotificationGate {
    /// Creates a gate that accepts any number above 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gate whose high-water mark starts at `number`.
    pub fn starting_at(number: u64) -> Self {
        Self {
            last_processed: AtomicU64::new(number),
        }
    }

    /// Accepts `number` if it exceeds the high-water mark, advancing the mark.
    pub fn admit(&self, number: u64) -> GateDecision {
        let advanced = self.last_processed.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |last| (number > last).then_some(number),
        );
        match advanced {
            Ok(previous) => GateDecision::Accepted {
                previous,
                missed: if previous == 0 {
                    0
                } else {
                    number - previous - 1
                },
            },
            Err(last_processed) => GateDecision::Rejected { last_processed },
        }
    }

    /// Returns the highest number accepted so far.
    pub fn last_processed(&self) -> u64 {
        self.last_processed.load(Ordering::Acquire)
    }

    /// Resets the high-water mark to 0.
    pub fn reset(&self) {
        self.last_processed.store(0, Ordering::Release);
    }
}
