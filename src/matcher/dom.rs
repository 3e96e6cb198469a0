//! Day-of-month parser, including the Quartz special forms.
//!
//! On top of the numeric grammar (`1-31`, wildcards `*` and `?`) this field
//! accepts:
//! - `L`      — the last day of the month
//! - `L-k`    — `k` days before the last day, `k` in `0..=30`
//! - `dW`     — the weekday (Mon-Fri) nearest day `d`, staying in the month
//! - `LW`     — the last weekday of the month
//!
//! None of the special forms combine with ranges or steps.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};

use super::{span, split_options, Matcher};
use crate::error::field_err;
use crate::Result;

pub(crate) fn parse_dom(expression: &str) -> Result<Matcher> {
    let options = split_options(expression)?;
    let mut matchers = Vec::with_capacity(options.len());
    for option in options {
        matchers.push(parse_option(option)?);
    }
    Ok(Matcher::any_of(matchers))
}

fn parse_option(expression: &str) -> Result<Matcher> {
    let range_and_step: Vec<&str> = expression.split('/').collect();
    let low_and_high: Vec<&str> = range_and_step[0].split('-').collect();
    if range_and_step.len() > 2 || low_and_high.len() > 2 {
        return Err(field_err(format!("{expression}: invalid expression")));
    }
    let head = low_and_high[0];

    if head == "L" {
        if range_and_step.len() > 1 {
            return Err(field_err(format!("{expression}: invalid expression")));
        }
        return match low_and_high.get(1) {
            // L — last day of the month
            None => Ok(Matcher::new(|t| t.day() == days_in_month(&t))),
            // L-k — k days before the last day
            Some(k) => {
                let k = span::parse_int(k)?;
                if k > 30 {
                    return Err(field_err(format!(
                        "{expression}: invalid amount of days subtracted"
                    )));
                }
                Ok(Matcher::new(move |t| t.day() + k == days_in_month(&t)))
            }
        };
    }

    if head == "LW" {
        if low_and_high.len() > 1 || range_and_step.len() > 1 {
            return Err(field_err(format!("{expression}: invalid expression")));
        }
        return Ok(Matcher::new(|t| {
            t.day() == last_weekday(t.year(), t.month())
        }));
    }

    if let Some(day) = head.strip_suffix('W') {
        if low_and_high.len() > 1 || range_and_step.len() > 1 {
            return Err(field_err(format!("{expression}: invalid expression")));
        }
        let day = span::parse_int(day)?;
        if !(1..=31).contains(&day) {
            return Err(span::out_of_range(expression, day, 1, 31));
        }
        return Ok(Matcher::new(move |t| {
            nearest_weekday(t.year(), t.month(), day) == Some(t.day())
        }));
    }

    let activations = span::expand(expression, 1, 31, &[], &["*", "?"])?;
    Ok(Matcher::new(move |t| activations.contains(&t.day())))
}

/// Number of days in the instant's month.
pub(crate) fn days_in_month(t: &NaiveDateTime) -> u32 {
    month_len(t.year(), t.month())
}

pub(crate) fn month_len(year: i32, month: u32) -> u32 {
    let (next_y, next_m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_y, next_m, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

/// The weekday nearest day `d` of the given month, or `None` when the month
/// has no day `d`. A Saturday steps back to Friday unless `d` is the 1st (then
/// forward to Monday the 3rd); a Sunday steps forward to Monday unless `d` is
/// the month's last day (then back to Friday).
fn nearest_weekday(year: i32, month: u32, d: u32) -> Option<u32> {
    let last = month_len(year, month);
    if d > last {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year, month, d)?;
    Some(match date.weekday() {
        Weekday::Sat => {
            if d == 1 {
                3
            } else {
                d - 1
            }
        }
        Weekday::Sun => {
            if d == last {
                d - 2
            } else {
                d + 1
            }
        }
        _ => d,
    })
}

/// The last weekday (Mon-Fri) of the given month.
fn last_weekday(year: i32, month: u32) -> u32 {
    let last = month_len(year, month);
    match NaiveDate::from_ymd_opt(year, month, last).map(|d| d.weekday()) {
        Some(Weekday::Sat) => last - 1,
        Some(Weekday::Sun) => last - 2,
        _ => last,
    }
}
