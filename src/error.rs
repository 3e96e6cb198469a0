//! Error taxonomy for spec parsing and scheduler capacity.

/// Errors returned by the parser and the scheduler.
///
/// Every parse error message names the offending fragment so callers can
/// surface it directly. Unsatisfiable schedules are deliberately *not*
/// errors — they parse fine and simply never produce a next activation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("empty spec string")]
    EmptySpec,

    /// A `TZ=`/`CRON_TZ=` prefix with no spec after it.
    #[error("invalid location descriptor: {0}")]
    BadLocationDescriptor(String),

    /// The named zone is not in the IANA database.
    #[error("provided bad location {0}")]
    UnknownLocation(String),

    /// The parser was not configured to accept `@` descriptors.
    #[error("parser does not accept descriptors: {0}")]
    DescriptorsDisabled(String),

    #[error("unrecognized descriptor: {0}")]
    UnrecognizedDescriptor(String),

    /// The `@every` duration string did not parse.
    #[error("failed to parse duration {descriptor}: {reason}")]
    BadDuration { descriptor: String, reason: String },

    #[error("delay must be at least one second but was {0:?}")]
    DelayTooShort(std::time::Duration),

    #[error("delay must be a multiple of one second but was {0:?}")]
    DelayNotWholeSeconds(std::time::Duration),

    /// Wrong number of whitespace-separated fields for this parser.
    #[error("{0}")]
    FieldCount(String),

    /// A malformed field expression. The message embeds the fragment, e.g.
    /// `"22-60: value 60 out of valid range [0, 59]"`.
    #[error("{0}")]
    Field(String),

    /// The monotonically increasing entry id counter would wrap.
    #[error("run out of available ids")]
    OutOfIds,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand used by the field parsers.
pub(crate) fn field_err(message: impl Into<String>) -> Error {
    Error::Field(message.into())
}
