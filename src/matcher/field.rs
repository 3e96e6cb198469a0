//! Parsers for the plain numeric fields: second, minute, hour, and month.
//!
//! Day-of-month and day-of-week carry special forms and live in their own
//! modules; everything else is the same grammar over different ranges, so a
//! single table-driven parser covers the four of them.

use chrono::{Datelike, NaiveDateTime, Timelike};

use super::{span, split_options, Matcher};
use crate::Result;

pub(crate) const MONTH_NAMES: &[(&str, u32)] = &[
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

pub(crate) const DOW_NAMES: &[(&str, u32)] = &[
    ("sun", 0),
    ("mon", 1),
    ("tue", 2),
    ("wed", 3),
    ("thu", 4),
    ("fri", 5),
    ("sat", 6),
];

/// `*` is the only wildcard in the time and month fields; `?` belongs to the
/// day fields.
const STAR_ONLY: &[&str] = &["*"];

pub(crate) fn parse_second(expression: &str) -> Result<Matcher> {
    parse_numeric(expression, 0, 59, &[], STAR_ONLY, |t| t.second())
}

pub(crate) fn parse_minute(expression: &str) -> Result<Matcher> {
    parse_numeric(expression, 0, 59, &[], STAR_ONLY, |t| t.minute())
}

pub(crate) fn parse_hour(expression: &str) -> Result<Matcher> {
    parse_numeric(expression, 0, 23, &[], STAR_ONLY, |t| t.hour())
}

pub(crate) fn parse_month(expression: &str) -> Result<Matcher> {
    parse_numeric(expression, 1, 12, MONTH_NAMES, STAR_ONLY, |t| t.month())
}

/// Parse a numeric field: comma-separated alternatives, each expanded to its
/// activation set, OR-composed into one matcher over `component`.
pub(crate) fn parse_numeric(
    expression: &str,
    min: u32,
    max: u32,
    names: &[(&str, u32)],
    wildcards: &[&str],
    component: fn(&NaiveDateTime) -> u32,
) -> Result<Matcher> {
    let options = split_options(expression)?;
    let mut matchers = Vec::with_capacity(options.len());
    for option in options {
        let activations = span::expand(option, min, max, names, wildcards)?;
        matchers.push(Matcher::new(move |t| activations.contains(&component(&t))));
    }
    Ok(Matcher::any_of(matchers))
}
