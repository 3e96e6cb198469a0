//! The scheduler: entry registration, the timer-driven dispatch loop, and
//! lifecycle control.
//!
//! One tokio task owns the entry heap; every mutation while running is a
//! channel rendezvous with that task, so the heap never needs a lock. Jobs
//! are dispatched each into their own task and tracked by an in-flight
//! counter that [`StopHandle::wait`] drains.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::Instrument;

use crate::chain::{job, recover, Chain, Job};
use crate::clock::{Clock, SystemClock};
use crate::entry::{Entry, EntryId};
use crate::heap::EntryHeap;
use crate::parser::Parser;
use crate::schedule::Schedule;
use crate::{Error, Result};

/// Sleep target used when no entry has a next activation; mutations and
/// stop requests still interrupt it.
fn park(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(100_000)
}

/// An in-process cron scheduler.
///
/// Jobs are registered with crontab specs (or prebuilt [`Schedule`]s) and
/// run in their own tokio tasks when due. The scheduler may be started,
/// stopped, restarted, and inspected while running. Cloning is cheap and
/// clones drive the same scheduler.
#[derive(Clone)]
pub struct Cron {
    core: Arc<Core>,
    state: Arc<Mutex<State>>,
}

struct Core {
    location: Tz,
    parser: Parser,
    clock: Arc<dyn Clock>,
    chain: Chain,
    in_flight: Arc<watch::Sender<usize>>,
    in_flight_rx: watch::Receiver<usize>,
}

struct State {
    running: bool,
    next_id: u64,
    /// Entry set while idle. Moved into the loop task on start and handed
    /// back on stop.
    entries: Vec<Entry>,
    /// Present while running.
    senders: Option<Senders>,
}

struct Senders {
    add: mpsc::Sender<Entry>,
    remove: mpsc::Sender<EntryId>,
    snapshot: mpsc::Sender<oneshot::Sender<Vec<Entry>>>,
    stop: mpsc::Sender<oneshot::Sender<Vec<Entry>>>,
}

struct Receivers {
    add: mpsc::Receiver<Entry>,
    remove: mpsc::Receiver<EntryId>,
    snapshot: mpsc::Receiver<oneshot::Sender<Vec<Entry>>>,
    stop: mpsc::Receiver<oneshot::Sender<Vec<Entry>>>,
}

/// Completion handle returned by [`Cron::stop`].
pub struct StopHandle {
    in_flight: watch::Receiver<usize>,
}

impl StopHandle {
    /// Resolves once every job that was in flight has finished. Jobs are
    /// never interrupted; this simply waits them out.
    pub async fn wait(mut self) {
        let _ = self.in_flight.wait_for(|count| *count == 0).await;
    }
}

/// Configuration for a [`Cron`] instance.
pub struct CronBuilder {
    location: Tz,
    parser: Parser,
    clock: Arc<dyn Clock>,
    chain: Chain,
}

impl Default for CronBuilder {
    fn default() -> Self {
        Self {
            location: chrono_tz::UTC,
            parser: Parser::standard(),
            clock: Arc::new(SystemClock),
            chain: Chain::new(vec![recover()]),
        }
    }
}

impl CronBuilder {
    /// Zone in which specs without a `TZ=` prefix are interpreted.
    /// Defaults to UTC.
    pub fn location(mut self, location: Tz) -> Self {
        self.location = location;
        self
    }

    /// Spec parser. Defaults to the standard five-field crontab parser
    /// with descriptors.
    pub fn parser(mut self, parser: Parser) -> Self {
        self.parser = parser;
        self
    }

    /// Shorthand for the Quartz-style six-field parser (seconds first).
    pub fn with_seconds(self) -> Self {
        self.parser(Parser::with_seconds())
    }

    /// Time source. Defaults to [`SystemClock`]; tests supply a
    /// [`TestClock`](crate::TestClock).
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Wrapper chain applied to every submitted job. Defaults to a single
    /// [`recover`].
    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = chain;
        self
    }

    pub fn build(self) -> Cron {
        let (in_flight, in_flight_rx) = watch::channel(0usize);
        Cron {
            core: Arc::new(Core {
                location: self.location,
                parser: self.parser,
                clock: self.clock,
                chain: self.chain,
                in_flight: Arc::new(in_flight),
                in_flight_rx,
            }),
            state: Arc::new(Mutex::new(State {
                running: false,
                next_id: 1,
                entries: Vec::new(),
                senders: None,
            })),
        }
    }
}

impl Default for Cron {
    fn default() -> Self {
        Self::new()
    }
}

impl Cron {
    /// A scheduler with default settings: UTC, standard parser, system
    /// clock, and a panic-recovering wrapper chain.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> CronBuilder {
        CronBuilder::default()
    }

    /// The zone in which this instance interprets specs and reports times.
    pub fn location(&self) -> Tz {
        self.core.location
    }

    /// Parse `spec` and schedule `f` on it. The returned id can later be
    /// passed to [`remove`](Cron::remove).
    pub async fn add<F, Fut>(&self, spec: &str, f: F) -> Result<EntryId>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let schedule = self.core.parser.parse(spec, self.core.location)?;
        self.schedule(schedule, f).await
    }

    /// Schedule `f` on a prebuilt schedule.
    pub async fn schedule<F, Fut>(&self, schedule: Schedule, f: F) -> Result<EntryId>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.schedule_job(schedule, job(f)).await
    }

    async fn schedule_job(&self, schedule: Schedule, callback: Job) -> Result<EntryId> {
        let mut state = self.state.lock().await;
        if state.next_id == 0 {
            return Err(Error::OutOfIds);
        }
        let id = EntryId(state.next_id);
        state.next_id = state.next_id.wrapping_add(1);

        let entry = Entry {
            id,
            schedule,
            next: None,
            prev: None,
            job: self.core.chain.apply(callback),
            span: tracing::info_span!("entry", id = id.0),
        };

        if state.running {
            if let Some(senders) = &state.senders {
                let _ = senders.add.send(entry).await;
            }
        } else {
            state.entries.push(entry);
        }
        Ok(id)
    }

    /// Snapshot of all entries.
    pub async fn entries(&self) -> Vec<Entry> {
        let state = self.state.lock().await;
        if state.running {
            if let Some(senders) = &state.senders {
                let (reply_tx, reply_rx) = oneshot::channel();
                if senders.snapshot.send(reply_tx).await.is_ok() {
                    if let Ok(entries) = reply_rx.await {
                        return entries;
                    }
                }
            }
            Vec::new()
        } else {
            state.entries.clone()
        }
    }

    /// Snapshot of a single entry, or `None` if the id is unknown.
    pub async fn entry(&self, id: EntryId) -> Option<Entry> {
        self.entries().await.into_iter().find(|e| e.id == id)
    }

    /// Remove an entry from future scheduling. Unknown ids are silently
    /// ignored; an in-flight run of the job is unaffected.
    pub async fn remove(&self, id: EntryId) {
        let mut state = self.state.lock().await;
        if state.running {
            if let Some(senders) = &state.senders {
                let _ = senders.remove.send(id).await;
            }
        } else if let Some(index) = state.entries.iter().position(|e| e.id == id) {
            let entry = state.entries.remove(index);
            entry
                .span
                .in_scope(|| tracing::info!(event = "remove", "removed entry"));
        }
    }

    /// Start the scheduler loop in its own task; no-op if already running.
    pub async fn start(&self) {
        if let Some((entries, receivers)) = self.prepare().await {
            let core = Arc::clone(&self.core);
            tokio::spawn(run_loop(core, entries, receivers));
        }
    }

    /// Run the scheduler loop inline; returns once the scheduler is
    /// stopped. No-op if already running.
    pub async fn run(&self) {
        if let Some((entries, receivers)) = self.prepare().await {
            run_loop(Arc::clone(&self.core), entries, receivers).await;
        }
    }

    /// Flip to running and wire up the mutation channels, or `None` when
    /// the scheduler is already running.
    async fn prepare(&self) -> Option<(Vec<Entry>, Receivers)> {
        let mut state = self.state.lock().await;
        if state.running {
            return None;
        }
        state.running = true;

        let (add_tx, add_rx) = mpsc::channel(1);
        let (remove_tx, remove_rx) = mpsc::channel(1);
        let (snapshot_tx, snapshot_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        state.senders = Some(Senders {
            add: add_tx,
            remove: remove_tx,
            snapshot: snapshot_tx,
            stop: stop_tx,
        });

        let entries = std::mem::take(&mut state.entries);
        Some((
            entries,
            Receivers {
                add: add_rx,
                remove: remove_rx,
                snapshot: snapshot_rx,
                stop: stop_rx,
            },
        ))
    }

    /// Stop the scheduler if it is running. In-flight jobs keep running;
    /// await the returned handle to observe their completion.
    pub async fn stop(&self) -> StopHandle {
        let mut state = self.state.lock().await;
        if state.running {
            if let Some(senders) = &state.senders {
                let (reply_tx, reply_rx) = oneshot::channel();
                if senders.stop.send(reply_tx).await.is_ok() {
                    if let Ok(entries) = reply_rx.await {
                        state.entries = entries;
                    }
                }
            }
            state.running = false;
            state.senders = None;
        }
        StopHandle {
            in_flight: self.core.in_flight_rx.clone(),
        }
    }
}

impl Core {
    /// Dispatch one job into its own task, tracked by the in-flight
    /// counter. The guard decrements even if the job panics.
    fn start_job(&self, callback: Job, span: tracing::Span) {
        self.in_flight.send_modify(|count| *count += 1);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        tokio::spawn(
            async move {
                let _guard = guard;
                callback().await;
            }
            .instrument(span),
        );
    }
}

struct InFlightGuard(Arc<watch::Sender<usize>>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// The scheduler loop. Owns the heap; exits on stop or when every handle
/// to the scheduler is gone.
async fn run_loop(core: Arc<Core>, mut entries: Vec<Entry>, mut rx: Receivers) {
    tracing::info!(event = "start", "starting scheduler");

    let mut now = core.clock.now();
    for entry in &mut entries {
        entry.next = entry.schedule.next(now);
        entry.span.in_scope(|| {
            tracing::debug!(event = "next", %now, next = ?entry.next, "next activation computed");
        });
    }
    let mut heap = EntryHeap::from_entries(entries);

    loop {
        let deadline = match heap.peek().and_then(|entry| entry.next) {
            Some(next) => next,
            // Nothing runnable; park until a mutation or stop arrives.
            None => park(now),
        };
        let mut timer = core.clock.timer(deadline);

        loop {
            tokio::select! {
                () = timer.fired() => {
                    now = core.clock.now();
                    tracing::debug!(event = "wake", %now, "scheduler woke up");

                    // Run every entry whose time has come.
                    while due(heap.peek(), now) {
                        let Some(mut entry) = heap.pop() else { break };
                        core.start_job(entry.job.clone(), entry.span.clone());
                        entry.prev = entry.next;
                        entry.next = entry.schedule.next(now);
                        entry.span.in_scope(|| {
                            tracing::info!(event = "run", %now, next = ?entry.next, "starting job");
                        });
                        heap.push(entry);
                    }
                    break;
                }

                maybe_entry = rx.add.recv() => {
                    let Some(mut entry) = maybe_entry else { return };
                    timer.cancel();
                    now = core.clock.now();
                    entry.next = entry.schedule.next(now);
                    entry.span.in_scope(|| {
                        tracing::info!(event = "add", %now, next = ?entry.next, "added new entry");
                    });
                    heap.push(entry);
                    break;
                }

                maybe_reply = rx.snapshot.recv() => {
                    let Some(reply) = maybe_reply else { return };
                    let _ = reply.send(heap.snapshot());
                    // The timer is still valid; keep waiting on it.
                    continue;
                }

                maybe_id = rx.remove.recv() => {
                    let Some(id) = maybe_id else { return };
                    timer.cancel();
                    now = core.clock.now();
                    if let Some(entry) = heap.remove(id) {
                        entry
                            .span
                            .in_scope(|| tracing::info!(event = "remove", "removed entry"));
                    }
                    break;
                }

                maybe_reply = rx.stop.recv() => {
                    timer.cancel();
                    tracing::info!(event = "stop", "stopping scheduler");
                    if let Some(reply) = maybe_reply {
                        let _ = reply.send(heap.into_entries());
                    }
                    return;
                }
            }
        }
    }
}

/// The root entry is due: it exists, and its next activation is a concrete
/// time at or before `now`.
fn due(entry: Option<&Entry>, now: DateTime<Utc>) -> bool {
    matches!(entry.and_then(|e| e.next), Some(next) if next <= now)
}
