//! Cron spec parser: time-zone prefixes, `@` descriptors, field-count
//! normalization, and delegation to the per-field matcher parsers.

use chrono_tz::Tz;

use crate::matcher::{day, field};
use crate::schedule::{ConstantDelay, Schedule};
use crate::spec::SpecSchedule;
use crate::{Error, Result};

/// Whether a field is expected by a parser, and whether the caller may omit
/// it. At most one field can be optional, and only seconds or day-of-week.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Presence {
    Absent,
    Required,
    Optional,
}

/// Defaults used for fields the configuration leaves out: times default to
/// zero, dates to "every".
const DEFAULTS: [&str; 6] = ["0", "0", "0", "*", "*", "*"];

/// Converts cron spec strings into [`Schedule`]s.
///
/// The configuration enumerates which of the six fields (second, minute,
/// hour, day-of-month, month, day-of-week) appear in the input, whether one
/// of seconds/day-of-week is optional, and whether `@` descriptors are
/// accepted. Omitted fields take their defaults, so a three-field parser
/// still produces a full schedule.
#[derive(Clone, Copy, Debug)]
pub struct Parser {
    fields: [Presence; 6],
    descriptors: bool,
}

impl Parser {
    /// The classic five-field crontab parser
    /// (minute, hour, day-of-month, month, day-of-week) with descriptors.
    pub fn standard() -> Self {
        Self::builder()
            .minutes()
            .hours()
            .day_of_month()
            .months()
            .day_of_week()
            .descriptors()
            .build()
    }

    /// The Quartz-style six-field parser: seconds first, then the standard
    /// five, with descriptors.
    pub fn with_seconds() -> Self {
        Self::builder()
            .seconds()
            .minutes()
            .hours()
            .day_of_month()
            .months()
            .day_of_week()
            .descriptors()
            .build()
    }

    pub fn builder() -> ParserBuilder {
        ParserBuilder::default()
    }

    /// Parse `spec` into a schedule, interpreting wall-clock fields in
    /// `default_location` unless the spec carries a `TZ=`/`CRON_TZ=` prefix.
    pub fn parse(&self, spec: &str, default_location: Tz) -> Result<Schedule> {
        if spec.is_empty() {
            return Err(Error::EmptySpec);
        }

        let (location, spec) = strip_location(spec, default_location)?;

        if spec.starts_with('@') {
            if !self.descriptors {
                return Err(Error::DescriptorsDisabled(spec.to_string()));
            }
            return parse_descriptor(spec, location);
        }

        let fields: Vec<&str> = spec.split_whitespace().collect();
        let fields = self.normalize_fields(fields)?;
        build_spec(&fields, location).map(Schedule::Spec)
    }

    /// Validate the field count against the configuration and return the
    /// full six-field set with defaults filled in for omitted fields.
    fn normalize_fields<'a>(&self, fields: Vec<&'a str>) -> Result<[&'a str; 6]> {
        let expected = self.fields.iter().filter(|p| **p != Presence::Absent).count();
        let optionals = self.fields.iter().filter(|p| **p == Presence::Optional).count();
        let min = expected - optionals;

        let count = fields.len();
        if count < min || count > expected {
            let found = fields.join(" ");
            return Err(Error::FieldCount(if min == expected {
                format!("expected exactly {min} fields, found {count}: [{found}]")
            } else {
                format!("expected {min} to {expected} fields, found {count}: [{found}]")
            }));
        }

        // Fill in the omitted optional: seconds prepend, day-of-week append.
        let mut fields = fields;
        if count == min && min < expected {
            if self.fields[5] == Presence::Optional {
                fields.push(DEFAULTS[5]);
            } else {
                fields.insert(0, DEFAULTS[0]);
            }
        }

        let mut full = DEFAULTS;
        let mut provided = fields.into_iter();
        for (slot, presence) in full.iter_mut().zip(self.fields.iter()) {
            if *presence != Presence::Absent {
                if let Some(value) = provided.next() {
                    *slot = value;
                }
            }
        }
        Ok(full)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::standard()
    }
}

/// Builder enumerating the fields a [`Parser`] accepts.
///
/// # Panics
///
/// `build` panics if both seconds and day-of-week are marked optional,
/// since the parser could not tell which one a short input omitted.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParserBuilder {
    second: Option<Presence>,
    minute: bool,
    hour: bool,
    dom: bool,
    month: bool,
    dow: Option<Presence>,
    descriptors: bool,
}

impl ParserBuilder {
    pub fn seconds(mut self) -> Self {
        self.second = Some(Presence::Required);
        self
    }

    /// Accept specs with or without a leading seconds field; omitted seconds
    /// default to `0`.
    pub fn seconds_optional(mut self) -> Self {
        self.second = Some(Presence::Optional);
        self
    }

    pub fn minutes(mut self) -> Self {
        self.minute = true;
        self
    }

    pub fn hours(mut self) -> Self {
        self.hour = true;
        self
    }

    pub fn day_of_month(mut self) -> Self {
        self.dom = true;
        self
    }

    pub fn months(mut self) -> Self {
        self.month = true;
        self
    }

    pub fn day_of_week(mut self) -> Self {
        self.dow = Some(Presence::Required);
        self
    }

    /// Accept specs with or without a trailing day-of-week field; omitted
    /// day-of-week defaults to `*`.
    pub fn day_of_week_optional(mut self) -> Self {
        self.dow = Some(Presence::Optional);
        self
    }

    /// Accept `@` descriptors such as `@hourly` and `@every 90s`.
    pub fn descriptors(mut self) -> Self {
        self.descriptors = true;
        self
    }

    pub fn build(self) -> Parser {
        let second = self.second.unwrap_or(Presence::Absent);
        let dow = self.dow.unwrap_or(Presence::Absent);
        if second == Presence::Optional && dow == Presence::Optional {
            panic!("multiple optional fields may not be configured");
        }
        let presence = |on: bool| if on { Presence::Required } else { Presence::Absent };
        Parser {
            fields: [
                second,
                presence(self.minute),
                presence(self.hour),
                presence(self.dom),
                presence(self.month),
                dow,
            ],
            descriptors: self.descriptors,
        }
    }
}

/// Consume a `TZ=`/`CRON_TZ=` prefix if present, returning the location to
/// use and the remaining spec.
fn strip_location(spec: &str, default_location: Tz) -> Result<(Tz, &str)> {
    if !spec.starts_with("TZ=") && !spec.starts_with("CRON_TZ=") {
        return Ok((default_location, spec));
    }
    let space = spec
        .find(' ')
        .ok_or_else(|| Error::BadLocationDescriptor(spec.to_string()))?;
    let eq = spec.find('=').unwrap_or(0);
    let name = &spec[eq + 1..space];
    let location = name
        .parse::<Tz>()
        .map_err(|_| Error::UnknownLocation(name.to_string()))?;
    Ok((location, spec[space..].trim_start()))
}

/// Expand an `@` descriptor into a schedule.
fn parse_descriptor(descriptor: &str, location: Tz) -> Result<Schedule> {
    let fields = match descriptor {
        "@yearly" | "@annually" => ["0", "0", "0", "1", "1", "*"],
        "@monthly" => ["0", "0", "0", "1", "*", "*"],
        "@weekly" => ["0", "0", "0", "*", "*", "0"],
        "@daily" | "@midnight" => ["0", "0", "0", "*", "*", "*"],
        "@hourly" => ["0", "0", "*", "*", "*", "*"],
        _ => {
            if let Some(duration) = descriptor.strip_prefix("@every ") {
                let duration =
                    humantime::parse_duration(duration).map_err(|e| Error::BadDuration {
                        descriptor: descriptor.to_string(),
                        reason: e.to_string(),
                    })?;
                return ConstantDelay::every(duration).map(Schedule::ConstantDelay);
            }
            return Err(Error::UnrecognizedDescriptor(descriptor.to_string()));
        }
    };
    build_spec(&fields, location).map(Schedule::Spec)
}

/// Compile six textual fields into a [`SpecSchedule`].
fn build_spec(fields: &[&str; 6], location: Tz) -> Result<SpecSchedule> {
    Ok(SpecSchedule {
        second: field::parse_second(fields[0])?,
        minute: field::parse_minute(fields[1])?,
        hour: field::parse_hour(fields[2])?,
        day: day::parse_day(fields[3], fields[5])?,
        month: field::parse_month(fields[4])?,
        location,
    })
}
