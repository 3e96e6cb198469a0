//! Crontab schedules: five field matchers plus a time zone, and the
//! calendar walk that finds the next satisfying instant.

use std::fmt;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

use crate::matcher::Matcher;

/// How many years ahead `next` searches before declaring a spec
/// unsatisfiable (e.g. `0 0 0 30 Feb *`).
const YEAR_LIMIT: i32 = 5;

/// A crontab expression compiled to per-field matchers.
///
/// The day matcher already folds together day-of-month and day-of-week
/// under the Quartz composition rule, so five predicates cover all six
/// textual fields.
#[derive(Clone)]
pub struct SpecSchedule {
    pub(crate) second: Matcher,
    pub(crate) minute: Matcher,
    pub(crate) hour: Matcher,
    pub(crate) day: Matcher,
    pub(crate) month: Matcher,
    pub(crate) location: Tz,
}

impl SpecSchedule {
    /// The zone this schedule's wall-clock fields are interpreted in.
    pub fn location(&self) -> Tz {
        self.location
    }

    /// The next instant after `after` at which every field matcher is
    /// satisfied, or `None` when no such instant exists within the search
    /// horizon.
    ///
    /// The walk advances one calendar level at a time, outermost first,
    /// resetting inner levels to their minimum on the first advancement.
    /// Hour, minute and second steps are absolute-duration arithmetic
    /// viewed through the schedule's zone, so a wall clock repeated by a
    /// fall-back transition is visited twice and a spring-forward gap is
    /// jumped. Month and day steps assemble wall-clock fields and resolve
    /// them back through the zone's calendar: an ambiguous wall clock
    /// resolves to its first occurrence, a nonexistent one is pushed past
    /// the gap.
    pub fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_timezone(&self.location);
        // Round up to the next whole second.
        let mut t = start.with_nanosecond(0).unwrap_or(start) + Duration::seconds(1);

        // Set once the candidate has been advanced at any level; inner
        // levels are reset to their minimum exactly then.
        let mut added = false;
        let year_limit = t.year() + YEAR_LIMIT;

        'wrap: loop {
            if t.year() > year_limit {
                return None;
            }

            while !self.month.matches(t.naive_local()) {
                if !added {
                    added = true;
                    t = self.resolve(start_of_month(t.naive_local()));
                }
                t = self.resolve(add_month(t.naive_local())?);
                if t.month() == 1 {
                    continue 'wrap;
                }
            }

            while !self.day.matches(t.naive_local()) {
                if !added {
                    added = true;
                    t = self.resolve(t.naive_local().date().and_time(NaiveTime::MIN));
                }
                t = self.resolve(next_day(t.naive_local())?);
                if t.day() == 1 {
                    continue 'wrap;
                }
            }

            while !self.hour.matches(t.naive_local()) {
                if !added {
                    added = true;
                    t = self.resolve(start_of_hour(t.naive_local()));
                }
                t += Duration::hours(1);
                if t.hour() == 0 {
                    continue 'wrap;
                }
            }

            while !self.minute.matches(t.naive_local()) {
                if !added {
                    added = true;
                    t = self.resolve(start_of_minute(t.naive_local()));
                }
                t += Duration::minutes(1);
                if t.minute() == 0 {
                    continue 'wrap;
                }
            }

            while !self.second.matches(t.naive_local()) {
                added = true;
                t += Duration::seconds(1);
                if t.second() == 0 {
                    continue 'wrap;
                }
            }

            return Some(t.with_timezone(&Utc));
        }
    }

    /// Map assembled wall-clock fields back to an instant in the schedule's
    /// zone. Ambiguous wall clocks take the first (pre-fold) occurrence;
    /// wall clocks erased by a forward jump are pushed past the gap.
    fn resolve(&self, mut wall: NaiveDateTime) -> DateTime<Tz> {
        loop {
            match self.location.from_local_datetime(&wall) {
                LocalResult::Single(t) => return t,
                LocalResult::Ambiguous(first, _) => return first,
                LocalResult::None => wall += Duration::minutes(1),
            }
        }
    }
}

impl fmt::Debug for SpecSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecSchedule")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

fn start_of_month(t: NaiveDateTime) -> NaiveDateTime {
    t.date()
        .with_day(1)
        .unwrap_or(t.date())
        .and_time(NaiveTime::MIN)
}

fn add_month(t: NaiveDateTime) -> Option<NaiveDateTime> {
    t.checked_add_months(chrono::Months::new(1))
}

fn next_day(t: NaiveDateTime) -> Option<NaiveDateTime> {
    Some(t.date().succ_opt()?.and_time(NaiveTime::MIN))
}

fn start_of_hour(t: NaiveDateTime) -> NaiveDateTime {
    let reset = t.with_minute(0).and_then(|t| t.with_second(0));
    reset.unwrap_or(t)
}

fn start_of_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0).unwrap_or(t)
}
