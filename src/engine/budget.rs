//! The global record cap, shared by every worker of a run.
//!
//! Each mailbox index owns one claim counter. A worker may start a page only
//! while the claims of all mailboxes together are below the cap, so once the
//! cap is reached no new page is started anywhere; pages already in flight
//! still finish, which bounds the overshoot to one page per other worker.
//!
//! What a finished page may claim is the cap minus the claims of mailboxes
//! `0..=i`: a later mailbox never takes budget away from an earlier one whose
//! page was in flight at the same time. Those extra claims are dropped when
//! the result is truncated in enumeration order.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug)]
pub struct RecordBudget {
    cap: usize,
    claimed: Vec<AtomicUsize>,
    cancelled: AtomicBool,
}

impl RecordBudget {
    pub fn new(cap: usize, units: usize) -> Self {
        Self {
            cap,
            claimed: (0..units).map(|_| AtomicUsize::new(0)).collect(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Whether any worker may start another page.
    pub fn has_room(&self) -> bool {
        !self.is_cancelled() && self.claimed_total() < self.cap
    }

    /// Records mailbox `index` may still claim. Zero once cancelled.
    pub fn remaining_for(&self, index: usize) -> usize {
        if self.is_cancelled() {
            return 0;
        }
        let used: usize = self.claimed[..=index]
            .iter()
            .map(|c| c.load(Ordering::Acquire))
            .sum();
        self.cap.saturating_sub(used)
    }

    /// Claim up to `wanted` records for mailbox `index` after its page came
    /// back; returns how many were granted. Only the worker for `index`
    /// writes its counter.
    pub fn claim(&self, index: usize, wanted: usize) -> usize {
        let granted = wanted.min(self.remaining_for(index));
        if granted > 0 {
            self.claimed[index].fetch_add(granted, Ordering::AcqRel);
        }
        granted
    }

    /// Claims of every mailbox. May exceed the cap by what in-flight pages
    /// of earlier mailboxes claimed.
    pub fn claimed_total(&self) -> usize {
        self.claimed.iter().map(|c| c.load(Ordering::Acquire)).sum()
    }

    /// Stop every worker before its next page.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
