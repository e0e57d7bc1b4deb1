//! Clock and timestamp encoding seams.
//!
//! The router expects transaction timestamps as microseconds since the Unix
//! epoch rendered in its own textual integer encoding. Both the clock and the
//! encoding are injectable so tests can pin exact wire bytes.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Renders a microsecond timestamp in the router's textual form.
pub trait TimestampEncoder: Send + Sync {
    /// Encode `micros` for transmission.
    fn encode(&self, micros: u64) -> String;
}

impl<F> TimestampEncoder for F
where
    F: Fn(u64) -> String + Send + Sync,
{
    fn encode(&self, micros: u64) -> String { self(micros) }
}

/// Default router encoding: lowercase base-36 digits.
///
/// ```
/// use ustrouter_connector::timestamp::hexatri;
///
/// assert_eq!(hexatri(0), "0");
/// assert_eq!(hexatri(35), "z");
/// assert_eq!(hexatri(36), "10");
/// ```
#[must_use]
#[expect(
    clippy::integer_division,
    clippy::integer_division_remainder_used,
    reason = "radix conversion"
)]
pub fn hexatri(micros: u64) -> String {
    let mut digits = Vec::with_capacity(13);
    let mut rest = micros;
    loop {
        let digit = u32::try_from(rest % 36).unwrap_or_default();
        digits.push(char::from_digit(digit, 36).unwrap_or('0'));
        rest /= 36;
        if rest == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}

/// Source of the current time in microseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current time in microseconds.
    fn now_micros(&self) -> u64;
}

/// Wall clock backed by [`chrono::Utc`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 { u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default() }
}

/// Clock that returns a caller-controlled value and advances by a fixed step
/// on every reading.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    step: u64,
}

impl ManualClock {
    /// Create a clock starting at `start` that advances by `step` per read.
    #[must_use]
    pub const fn new(start: u64, step: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
            step,
        }
    }

    /// Move the clock to `micros`.
    pub fn set(&self, micros: u64) { self.now.store(micros, Ordering::SeqCst); }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 { self.now.fetch_add(self.step, Ordering::SeqCst) }
}
