//! Debounce and throttle as explicit state machines.
//!
//! ## Learning: Time as an Argument
//!
//! Neither type spawns a timer. Callers pass the current `Instant` into
//! every call and `poll` them from their own loop, which keeps the editor
//! single-threaded and lets tests step through time deterministically.
//!
//! Both keep the last value of a burst (trailing edge), so the end of a
//! gesture is always applied eventually.

use std::time::{Duration, Instant};

/// Delays a value until no new one arrived for `delay`.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(Instant, T)>,
}

impl<T> Debouncer<T> {
    /// Creates an idle debouncer.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replaces the pending value and restarts the quiet period.
    pub fn call(&mut self, now: Instant, value: T) {
        self.pending = Some((now + self.delay, value));
    }

    /// Returns the pending value once its quiet period has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if *deadline <= now => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    /// Returns the pending value immediately.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(_, value)| value)
    }

    /// Drops the pending value.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// When the pending value becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Lets at most one value through per `interval`.
///
/// The first value of a burst passes straight away; later ones are held and
/// the newest is released by [`Throttle::poll`] or [`Throttle::flush`].
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    /// Creates an idle throttle.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
        }
    }

    fn is_open(&self, now: Instant) -> bool {
        self.last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Offers a value. Returns it when it may be applied now.
    pub fn call(&mut self, now: Instant, value: T) -> Option<T> {
        if self.is_open(now) {
            self.last_emit = Some(now);
            self.pending = None;
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Releases the held value once the interval has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.is_some() && self.is_open(now) {
            self.last_emit = Some(now);
            return self.pending.take();
        }
        None
    }

    /// Releases the held value immediately and starts a new burst.
    pub fn flush(&mut self) -> Option<T> {
        self.last_emit = None;
        self.pending.take()
    }

    /// Forgets the held value and the burst.
    pub fn reset(&mut self) {
        self.last_emit = None;
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
