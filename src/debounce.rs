//! Debounced render scheduling.
//!
//! A completed crop gesture does not render immediately. It schedules a render
//! one quiet period later; a newer completion before that deadline cancels the
//! pending render and schedules a fresh one. N completions inside the window
//! therefore produce exactly one render, `delay` after the last.
//!
//! Time comes from `tokio::time::Instant` so hosts and tests can drive it with
//! a paused tokio clock. The scheduler does not spawn anything itself: the
//! owner polls [`RenderDebouncer::take_due`] or awaits [`RenderDebouncer::wait`].

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RenderDebouncer {
    delay: Duration,
    deadline: Option<Instant>,
    generation: u64,
    cancelled: u64,
}

impl RenderDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            generation: 0,
            cancelled: 0,
        }
    }

    /// Schedule a render `delay` after `now`, cancelling any pending one.
    ///
    /// Returns the generation of the new task.
    pub fn schedule(&mut self, now: Instant) -> u64 {
        if self.deadline.is_some() {
            self.cancelled += 1;
        }
        self.generation += 1;
        self.deadline = Some(now + self.delay);
        self.generation
    }

    /// Drop the pending render, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.deadline.take().is_some();
        if was_pending {
            self.cancelled += 1;
        }
        was_pending
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Number of scheduled renders superseded or cancelled before running.
    pub fn cancelled_count(&self) -> u64 {
        self.cancelled
    }

    /// If the pending render is due at `now`, clear it and return its generation.
    pub fn take_due(&mut self, now: Instant) -> Option<u64> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(self.generation)
            }
            _ => None,
        }
    }

    /// Claim the pending render regardless of its deadline.
    pub fn take_now(&mut self) -> Option<u64> {
        self.deadline.take().map(|_| self.generation)
    }

    /// Sleep until the pending deadline. Returns immediately when idle.
    pub async fn wait(&self) {
        if let Some(deadline) = self.deadline {
            tokio::time::sleep_until(deadline).await;
        }
    }
}
