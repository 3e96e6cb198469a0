//! In-process cron scheduling.
//!
//! `sa_cron` parses crontab-style schedule expressions, computes
//! timezone-aware next activations, and runs registered jobs on time in
//! their own tokio tasks.
//!
//! ```no_run
//! use sa_cron::Cron;
//!
//! # async fn example() -> sa_cron::Result<()> {
//! let cron = Cron::new();
//! cron.add("30 9 * * MON-FRI", || async {
//!     tracing::info!("standup reminder");
//! })
//! .await?;
//! cron.start().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Spec syntax
//!
//! Any crontab-compatible five-field expression, the Quartz six-field form
//! (seconds first, via [`Parser::with_seconds`]), the `@` descriptor
//! shortcuts (`@hourly`, `@daily`, `@every 90m`, ...), and an optional
//! `TZ=`/`CRON_TZ=` prefix naming the IANA zone the wall-clock fields are
//! evaluated in. Day fields support the Quartz special forms (`L`, `LW`,
//! `15W`, `MON#2`, `5L`).
//!
//! ## Overlap policies
//!
//! Jobs run concurrently by default, including with themselves. Wrap them
//! through [`Chain`] with [`skip_if_still_running`] or
//! [`delay_if_still_running`] to drop or serialize overlapping runs;
//! [`recover`] (installed by default) keeps a panicking job from taking
//! anything else down.

mod chain;
mod clock;
mod cron;
mod entry;
mod error;
mod heap;
mod matcher;
mod parser;
mod schedule;
mod spec;

pub use chain::{delay_if_still_running, job, recover, skip_if_still_running, Chain, Job, JobWrapper};
pub use clock::{Clock, SystemClock, TestClock, Timer};
pub use cron::{Cron, CronBuilder, StopHandle};
pub use entry::{Entry, EntryId};
pub use error::{Error, Result};
pub use parser::{Parser, ParserBuilder};
pub use schedule::{ConstantDelay, CustomSchedule, Schedule};
pub use spec::SpecSchedule;
