//! Order Codes
//!
//! Numeric correlation ids shared between a local payment and the provider's
//! payment link. Codes must fit a signed 32-bit integer.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Largest order code the provider accepts
pub const MAX_ORDER_CODE: i64 = i32::MAX as i64;

/// Decimal digits of the millisecond clock kept in a code
const TIME_DIGITS_MODULUS: i64 = 100_000;

/// Suffix width (three digits)
const SUFFIX_MODULUS: i64 = 1_000;

/// Gap below the last issued code that means the time window wrapped around
const WRAP_THRESHOLD: i64 = 1_000_000;

/// Provider order code
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderCode(i64);

impl OrderCode {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OrderCode {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Build a code from a millisecond timestamp and a random suffix.
///
/// The last five digits of `millis` are followed by `suffix` zero-padded to
/// three digits, and the result is clamped to [`MAX_ORDER_CODE`].
pub fn compose(millis: i64, suffix: u16) -> OrderCode {
    let time_part = millis.rem_euclid(TIME_DIGITS_MODULUS);
    let suffix = i64::from(suffix) % SUFFIX_MODULUS;
    let digits = format!("{time_part:05}{suffix:03}");
    let code = digits.parse::<i64>().unwrap_or(0).min(MAX_ORDER_CODE);
    OrderCode(code)
}

/// Order code generator
///
/// Codes come from the clock plus a random suffix. Within one process the
/// generator never hands out a code at or below the previous one unless the
/// clock window has wrapped, so bursts of calls in the same millisecond do
/// not collide. Uniqueness across processes is left to the payment store.
#[derive(Debug)]
pub struct OrderCodeGenerator {
    last: AtomicI64,
}

impl Default for OrderCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderCodeGenerator {
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(-1),
        }
    }

    /// Produce the next order code
    pub fn generate(&self) -> OrderCode {
        let suffix = rand::thread_rng().gen_range(0..1000u16);
        let candidate = compose(Utc::now().timestamp_millis(), suffix).value();

        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(next_code(last, candidate))
            })
            .unwrap_or_else(|last| last);

        OrderCode(next_code(previous, candidate))
    }
}

fn next_code(last: i64, candidate: i64) -> i64 {
    if candidate > last || last - candidate > WRAP_THRESHOLD || last >= MAX_ORDER_CODE {
        candidate
    } else {
        last + 1
    }
}
