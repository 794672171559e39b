//! Page-change throttling.
//!
//! A committed change locks navigation for `min_interval`. Requests that
//! arrive while locked, or while a page is still loading, are parked rather
//! than dropped; only the newest parked request survives, and it is
//! re-issued after `retry_delay`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavTarget {
    pub page: u32,
    /// Set when the change continues playback across a page boundary rather
    /// than coming from the user.
    pub continue_playback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDecision {
    Commit,
    /// Parked. `retry_after` is set when the caller must schedule a retry;
    /// at most one retry is outstanding at a time.
    Defer { retry_after: Option<Duration> },
}

#[derive(Debug, Clone)]
pub struct NavThrottle {
    min_interval: Duration,
    retry_delay: Duration,
    locked_until: Option<Instant>,
    deferred: Option<NavTarget>,
    retry_scheduled: bool,
}

impl NavThrottle {
    pub fn new(min_interval: Duration, retry_delay: Duration) -> Self {
        Self {
            min_interval,
            retry_delay,
            locked_until: None,
            deferred: None,
            retry_scheduled: false,
        }
    }

    pub fn is_locked(&self, at: Instant) -> bool {
        self.locked_until.is_some_and(|until| at < until)
    }

    pub fn deferred(&self) -> Option<NavTarget> {
        self.deferred
    }

    pub fn request(&mut self, target: NavTarget, at: Instant, busy: bool) -> NavDecision {
        if busy || self.is_locked(at) {
            self.deferred = Some(target);
            let retry_after = if self.retry_scheduled {
                None
            } else {
                self.retry_scheduled = true;
                Some(self.retry_delay)
            };
            return NavDecision::Defer { retry_after };
        }
        self.commit(at);
        NavDecision::Commit
    }

    /// Records a change made without asking, starting a new lock window.
    pub fn commit(&mut self, at: Instant) {
        self.locked_until = Some(at + self.min_interval);
        self.deferred = None;
    }

    /// Drops a parked request if it would resume playback. Returns whether
    /// one was dropped.
    pub fn drop_continuation(&mut self) -> bool {
        if self.deferred.is_some_and(|target| target.continue_playback) {
            self.deferred = None;
            return true;
        }
        false
    }

    /// Called when the scheduled retry fires.
    pub fn take_deferred(&mut self) -> Option<NavTarget> {
        self.retry_scheduled = false;
        self.deferred.take()
    }

    pub fn reset(&mut self) {
        self.locked_until = None;
        self.deferred = None;
        self.retry_scheduled = false;
    }
}
