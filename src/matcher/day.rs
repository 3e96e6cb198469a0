//! Composition of the day-of-month and day-of-week fields.
//!
//! Quartz rule: when either field lists `*` or `?` as one of its
//! alternatives, the day predicate is DOM AND DOW; when both are
//! restricted, a day satisfying either fires (DOM OR DOW). This keeps
//! legacy crontabs like `"30 08 15 Jul ?"` meaning what their authors
//! expected.

use super::{dom, dow, Matcher};
use crate::Result;

pub(crate) fn parse_day(dom_expr: &str, dow_expr: &str) -> Result<Matcher> {
    let dom_matcher = dom::parse_dom(dom_expr)?;
    let dow_matcher = dow::parse_dow(dow_expr)?;

    if has_star(dom_expr) || has_star(dow_expr) {
        Ok(Matcher::all_of(vec![dom_matcher, dow_matcher]))
    } else {
        Ok(Matcher::any_of(vec![dom_matcher, dow_matcher]))
    }
}

/// True when one of the comma-separated alternatives is exactly `*` or `?`.
/// A stepped wildcard like `*/10` restricts the field and does not count.
fn has_star(expression: &str) -> bool {
    expression.split(',').any(|v| v == "*" || v == "?")
}
