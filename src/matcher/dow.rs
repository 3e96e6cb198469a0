//! Day-of-week parser, including the Quartz special forms.
//!
//! On top of the numeric grammar (`0-6`, `sun`-`sat`, wildcards `*` and `?`)
//! this field accepts:
//! - `L`    — Saturday (Quartz shorthand for the last day of the week)
//! - `nL`   — the last occurrence of weekday `n` in the month
//! - `n#k`  — the `k`-th occurrence of weekday `n`, `k` in `1..=5`
//!
//! None of the special forms combine with ranges or steps.

use chrono::{Datelike, NaiveDateTime, Weekday};

use super::dom::days_in_month;
use super::field::DOW_NAMES;
use super::{span, split_options, Matcher};
use crate::error::field_err;
use crate::Result;

pub(crate) fn parse_dow(expression: &str) -> Result<Matcher> {
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

    if head.contains('#') {
        if low_and_high.len() > 1 || range_and_step.len() > 1 {
            return Err(field_err(format!("{expression}: invalid expression")));
        }
        let parts: Vec<&str> = head.split('#').collect();
        if parts.len() != 2 {
            return Err(field_err(format!("{expression}: invalid expression")));
        }
        let weekday = span::parse_int_or_name(parts[0], DOW_NAMES)?;
        if weekday > 6 {
            return Err(span::out_of_range(expression, weekday, 0, 6));
        }
        let nth = span::parse_int(parts[1])?;
        if !(1..=5).contains(&nth) {
            return Err(span::out_of_range(expression, nth, 1, 5));
        }
        return Ok(Matcher::new(move |t| {
            weekday_of(&t) == weekday && (t.day() - 1) / 7 + 1 == nth
        }));
    }

    if head == "L" {
        if low_and_high.len() > 1 || range_and_step.len() > 1 {
            return Err(field_err(format!("{expression}: invalid expression")));
        }
        return Ok(Matcher::new(|t| t.weekday() == Weekday::Sat));
    }

    if let Some(day) = head.strip_suffix('L') {
        if low_and_high.len() > 1 || range_and_step.len() > 1 {
            return Err(field_err(format!("{expression}: invalid expression")));
        }
        let weekday = span::parse_int_or_name(day, DOW_NAMES)?;
        if weekday > 6 {
            return Err(span::out_of_range(expression, weekday, 0, 6));
        }
        // Last occurrence: no same weekday seven days later within the month.
        return Ok(Matcher::new(move |t| {
            weekday_of(&t) == weekday && t.day() + 7 > days_in_month(&t)
        }));
    }

    let activations = span::expand(expression, 0, 6, DOW_NAMES, &["*", "?"])?;
    Ok(Matcher::new(move |t| activations.contains(&weekday_of(&t))))
}

/// Weekday as cron counts it: 0 = Sunday .. 6 = Saturday.
fn weekday_of(t: &NaiveDateTime) -> u32 {
    t.weekday().num_days_from_sunday()
}
