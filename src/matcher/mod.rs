//! Field matchers — per-field predicates over a wall-clock instant.
//!
//! A cron field expression parses into a [`Matcher`]: a predicate that
//! consults only the calendar components of a [`NaiveDateTime`] in the
//! schedule's zone. Comma-separated alternatives compose with OR; the five
//! fields of a schedule compose with AND. Matchers are built once at parse
//! time and never fail at evaluation.

pub(crate) mod day;
pub(crate) mod dom;
pub(crate) mod dow;
pub(crate) mod field;
pub(crate) mod span;

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

/// A predicate over a wall-clock instant for a single schedule field.
#[derive(Clone)]
pub(crate) struct Matcher(Arc<dyn Fn(NaiveDateTime) -> bool + Send + Sync>);

impl Matcher {
    pub fn new(f: impl Fn(NaiveDateTime) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn matches(&self, t: NaiveDateTime) -> bool {
        (self.0)(t)
    }

    /// OR of the given matchers. Matches nothing when the list is empty.
    pub fn any_of(matchers: Vec<Matcher>) -> Matcher {
        if matchers.len() == 1 {
            return matchers.into_iter().next().unwrap_or_else(always);
        }
        Matcher::new(move |t| matchers.iter().any(|m| m.matches(t)))
    }

    /// AND of the given matchers. Matches everything when the list is empty.
    pub fn all_of(matchers: Vec<Matcher>) -> Matcher {
        Matcher::new(move |t| matchers.iter().all(|m| m.matches(t)))
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Matcher(..)")
    }
}

fn always() -> Matcher {
    Matcher::new(|_| true)
}

/// Split a field expression on commas, dropping empty pieces. A field that
/// yields no alternatives at all is an error.
pub(crate) fn split_options(expression: &str) -> crate::Result<Vec<&str>> {
    let options: Vec<&str> = expression.split(',').filter(|s| !s.is_empty()).collect();
    if options.is_empty() {
        return Err(crate::error::field_err("invalid expression: empty list"));
    }
    Ok(options)
}
