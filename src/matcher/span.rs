//! Shared range expansion for numeric field expressions.
//!
//! Grammar handled here, after the caller has dealt with any field-specific
//! special forms: `N`, `N-M`, `N/step`, `N-M/step`, with `*` (and `?` where
//! the field allows it) standing for the full range. Symbolic names are
//! resolved case-insensitively through the field's name table.

use crate::error::field_err;
use crate::Result;

/// Expand a single alternative into the set of matching integers.
///
/// A bare `N/step` runs through `N-max/step`; a bare wildcard with a step is
/// `min-max/step`. Structural misuse (extra hyphens or slashes, a wildcard
/// used as a range bound) is reported against the whole expression.
pub(crate) fn expand(
    expression: &str,
    min: u32,
    max: u32,
    names: &[(&str, u32)],
    wildcards: &[&str],
) -> Result<Vec<u32>> {
    let range_and_step: Vec<&str> = expression.split('/').collect();
    let low_and_high: Vec<&str> = range_and_step[0].split('-').collect();
    if range_and_step.len() > 2 || low_and_high.len() > 2 {
        return Err(field_err(format!("{expression}: invalid expression")));
    }

    let stepped = range_and_step.len() == 2;
    let (low, high) = if wildcards.contains(&low_and_high[0]) {
        if low_and_high.len() > 1 {
            return Err(field_err(format!("{expression}: invalid expression")));
        }
        (min, max)
    } else {
        let low = parse_int_or_name(low_and_high[0], names)?;
        if low < min || low > max {
            return Err(out_of_range(expression, low, min, max));
        }
        let high = match low_and_high.get(1) {
            Some(h) => {
                let high = parse_int_or_name(h, names)?;
                if high < min || high > max {
                    return Err(out_of_range(expression, high, min, max));
                }
                if high < low {
                    return Err(field_err(format!(
                        "{expression}: beginning of range ({low}) beyond end of range ({high})"
                    )));
                }
                high
            }
            // "N/step" means "N-max/step"
            None if stepped => max,
            None => low,
        };
        (low, high)
    };

    let step = match range_and_step.get(1) {
        Some(s) => {
            let step = parse_int(s)?;
            if step == 0 {
                return Err(field_err(format!("step should be > 0, got {step}")));
            }
            step
        }
        None => 1,
    };

    Ok((low..=high).step_by(step as usize).collect())
}

/// Error for a value outside a field's valid range, in the shared wording.
pub(crate) fn out_of_range(expression: &str, value: u32, min: u32, max: u32) -> crate::Error {
    field_err(format!(
        "{expression}: value {value} out of valid range [{min}, {max}]"
    ))
}

/// Resolve a symbolic name (case-insensitive) or parse a non-negative integer.
pub(crate) fn parse_int_or_name(expr: &str, names: &[(&str, u32)]) -> Result<u32> {
    let lower = expr.to_ascii_lowercase();
    if let Some((_, v)) = names.iter().find(|(n, _)| *n == lower) {
        return Ok(*v);
    }
    parse_int(expr)
}

pub(crate) fn parse_int(expr: &str) -> Result<u32> {
    expr.parse::<u32>()
        .map_err(|e| field_err(format!("failed to parse int from {expr}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_NAMES: &[(&str, u32)] = &[];
    const STAR: &[&str] = &["*"];

    #[test]
    fn single_value() {
        assert_eq!(expand("5", 0, 59, NO_NAMES, STAR).unwrap(), vec![5]);
    }

    #[test]
    fn inclusive_range() {
        assert_eq!(expand("3-6", 0, 59, NO_NAMES, STAR).unwrap(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn wildcard_full_range() {
        let all = expand("*", 0, 23, NO_NAMES, STAR).unwrap();
        assert_eq!(all.len(), 24);
        assert_eq!(all[0], 0);
        assert_eq!(all[23], 23);
    }

    #[test]
    fn bare_step_runs_to_max() {
        assert_eq!(
            expand("50/5", 0, 59, NO_NAMES, STAR).unwrap(),
            vec![50, 55]
        );
    }

    #[test]
    fn wildcard_step() {
        assert_eq!(
            expand("*/20", 0, 59, NO_NAMES, STAR).unwrap(),
            vec![0, 20, 40]
        );
    }

    #[test]
    fn range_with_step() {
        assert_eq!(
            expand("10-30/10", 0, 59, NO_NAMES, STAR).unwrap(),
            vec![10, 20, 30]
        );
    }

    #[test]
    fn names_resolve_case_insensitively() {
        let names: &[(&str, u32)] = &[("jan", 1), ("feb", 2)];
        assert_eq!(expand("JAN-Feb", 1, 12, names, STAR).unwrap(), vec![1, 2]);
    }

    #[test]
    fn rejects_zero_step() {
        let err = expand("15/0", 0, 59, NO_NAMES, STAR).unwrap_err();
        assert!(err.to_string().contains("step should be > 0"));
    }

    #[test]
    fn rejects_out_of_range() {
        let err = expand("60", 0, 59, NO_NAMES, STAR).unwrap_err();
        assert_eq!(
            err.to_string(),
            "60: value 60 out of valid range [0, 59]"
        );
    }

    #[test]
    fn rejects_inverted_range() {
        let err = expand("1-0", 1, 12, NO_NAMES, STAR).unwrap_err();
        assert!(err
            .to_string()
            .contains("beginning of range (1) beyond end of range (0)"));
    }

    #[test]
    fn rejects_structural_misuse() {
        for bad in ["*//2", "*/2/", "*-2-", "1-2-", "*-5", "*-5/2"] {
            let err = expand(bad, 0, 59, NO_NAMES, STAR).unwrap_err();
            assert!(
                err.to_string().contains("invalid expression"),
                "{bad}: {err}"
            );
        }
        for bad in ["2-", "-1", "5-*", "5-*/22", "22-23/ABC"] {
            let err = expand(bad, 0, 59, NO_NAMES, STAR).unwrap_err();
            assert!(err.to_string().contains("failed to parse"), "{bad}: {err}");
        }
    }
}
