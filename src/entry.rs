//! Scheduled entries and their identifiers.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::chain::Job;
use crate::schedule::Schedule;

/// Identifier the scheduler assigns to an entry. Monotonically increasing
/// from 1 and never reused, even after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A schedule paired with the decorated job to run on it.
///
/// The scheduler exclusively owns all entries after registration;
/// [`Cron::entries`](crate::Cron::entries) hands out clones.
#[derive(Clone)]
pub struct Entry {
    /// Scheduler-assigned id, usable for lookup and removal.
    pub id: EntryId,

    /// When this job should run.
    pub schedule: Schedule,

    /// Next activation, or `None` while the scheduler is stopped or when
    /// the schedule can never be satisfied.
    pub next: Option<DateTime<Utc>>,

    /// Most recent activation, or `None` if the entry has never fired.
    pub prev: Option<DateTime<Utc>>,

    /// The callback, already wrapped by the configured chain.
    pub(crate) job: Job,

    /// Per-entry tracing context carrying the id.
    pub(crate) span: tracing::Span,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("schedule", &self.schedule)
            .field("next", &self.next)
            .field("prev", &self.prev)
            .finish_non_exhaustive()
    }
}
