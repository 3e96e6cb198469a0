//! Schedule values — when a job fires next.

use std::fmt;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::spec::SpecSchedule;
use crate::{Error, Result};

/// A user-supplied schedule implementation, the escape hatch for duty cycles
/// the built-in variants cannot express.
pub trait CustomSchedule: Send + Sync {
    /// Next activation strictly after `after`, or `None` for "never again".
    fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// A job's duty cycle.
///
/// `next` is invoked once when the scheduler starts and then after each run.
/// Returning `None` parks the entry: it stays registered but never fires.
#[derive(Clone)]
pub enum Schedule {
    /// A crontab expression, evaluated in its own time zone.
    Spec(SpecSchedule),
    /// A fixed delay between activations, e.g. "every 5 minutes".
    ConstantDelay(ConstantDelay),
    /// Never fires. Useful as a placeholder and in tests; the scheduler
    /// tolerates such entries without busy-looping.
    Zero,
    /// User-provided implementation.
    Custom(Arc<dyn CustomSchedule>),
}

impl Schedule {
    /// The next activation time later than `after`, or `None` if the
    /// schedule can never be satisfied again.
    pub fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Spec(spec) => spec.next(after),
            Schedule::ConstantDelay(delay) => delay.next(after),
            Schedule::Zero => None,
            Schedule::Custom(custom) => custom.next(after),
        }
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            Schedule::ConstantDelay(delay) => {
                f.debug_tuple("ConstantDelay").field(delay).finish()
            }
            Schedule::Zero => f.write_str("Zero"),
            Schedule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<SpecSchedule> for Schedule {
    fn from(spec: SpecSchedule) -> Self {
        Schedule::Spec(spec)
    }
}

impl From<ConstantDelay> for Schedule {
    fn from(delay: ConstantDelay) -> Self {
        Schedule::ConstantDelay(delay)
    }
}

/// A simple recurring duty cycle. Does not support activations more frequent
/// than once a second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantDelay {
    delay: Duration,
}

impl ConstantDelay {
    /// A schedule that activates once every `delay`.
    ///
    /// Delays shorter than one second or not a whole multiple of a second
    /// are rejected.
    pub fn every(delay: StdDuration) -> Result<Self> {
        if delay < StdDuration::from_secs(1) {
            return Err(Error::DelayTooShort(delay));
        }
        if delay.subsec_nanos() != 0 {
            return Err(Error::DelayNotWholeSeconds(delay));
        }
        let delay = Duration::from_std(delay).map_err(|_| Error::DelayTooShort(StdDuration::MAX))?;
        Ok(Self { delay })
    }

    /// Next activation: `after + delay`, rounded down to the whole second so
    /// activations stay second-aligned.
    pub fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Some(after.with_nanosecond(0).unwrap_or(after) + self.delay)
    }
}
