//! Logical time and per-actor time keeping.
//!
//! This module provides most notably:
//!
//! * [`Time`]: a logical time stamp, unrelated to wall-clock time,
//! * [`TimeKeeper`]: the per-actor bookkeeping that orders the actor's
//!   receivers by urgency and owns the actor's current time.
//!
//! Valid time stamps are finite and non-negative. A single negative value,
//! [`Time::INACTIVE`], is reserved as the terminate sentinel: an event carrying
//! it marks the end of a lane, and a receiver whose oldest event carries it is
//! considered infinitely late by its [`TimeKeeper`].
//!
//! # Examples
//!
//! ```
//! use odflow::time::Time;
//!
//! let t = Time::new(2.5).unwrap();
//! assert!(t > Time::ZERO);
//! assert!(Time::new(-3.0).is_none());
//! assert!(Time::INACTIVE.is_inactive());
//! ```

mod keeper;

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;

pub(crate) use keeper::Head;
pub use keeper::{RcvrTimeTriple, TimeKeeper};

use crate::actor::ActorError;

/// A logical time stamp.
///
/// Time stamps are totally ordered by their numerical value, which means that
/// [`Time::INACTIVE`] compares lower than any valid time stamp. Code that must
/// treat terminated lanes as "infinitely late" does so explicitly.
#[derive(Copy, Clone, Debug, Default)]
pub struct Time(f64);

impl Time {
    /// The origin of logical time.
    pub const ZERO: Time = Time(0.0);

    /// The terminate sentinel.
    pub const INACTIVE: Time = Time(-1.0);

    /// Creates a time stamp.
    ///
    /// Returns `None` if the value is negative, infinite or NaN.
    pub fn new(time: f64) -> Option<Self> {
        if time.is_finite() && time >= 0.0 {
            // Adding a positive zero normalizes a negative zero.
            Some(Self(time + 0.0))
        } else {
            None
        }
    }

    /// Returns true if this is the terminate sentinel.
    pub fn is_inactive(self) -> bool {
        self.0 == Self::INACTIVE.0
    }

    /// Returns the numerical value of the time stamp.
    pub const fn as_f64(self) -> f64 {
        self.0
    }

    /// Adds a non-negative delay to a valid time stamp.
    ///
    /// An error is returned if the delay is negative or if the result is not
    /// a valid time stamp. Negative delays are never clamped.
    pub fn checked_add_delay(self, delay: f64) -> Result<Time, ActorError> {
        if delay < 0.0 {
            return Err(ActorError::NegativeDelay(delay));
        }
        let time = self.0 + delay;

        Time::new(time).ok_or(ActorError::InvalidTime(time))
    }

    /// Compares two time stamps by urgency: numerically, except that the
    /// terminate sentinel comes after every other time stamp.
    pub(crate) fn urgency_cmp(&self, other: &Self) -> Ordering {
        match (self.is_inactive(), other.is_inactive()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.cmp(other),
        }
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        // NaN cannot be constructed, so `total_cmp` is the numerical order.
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_inactive() {
            f.write_str("INACTIVE")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// An error returned when a clock would move backward.
///
/// This always denotes a broken causality assumption in a feeding actor and is
/// therefore treated as fatal for the worker that triggered it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeRegression {
    /// The time that would have been overwritten.
    pub current: Time,
    /// The rejected earlier time.
    pub requested: Time,
}

impl fmt::Display for TimeRegression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt to move time backward from {} to {}",
            self.current, self.requested
        )
    }
}

impl Error for TimeRegression {}
