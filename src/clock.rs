//! Time source abstraction: wall-clock reads plus cancellable timers.
//!
//! The scheduler never touches `Utc::now` or tokio timers directly; it goes
//! through a [`Clock`]. [`SystemClock`] is the production implementation;
//! [`TestClock`] is manually driven and makes scheduler tests fully
//! deterministic without real sleeps.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

/// Where the scheduler gets its time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// A timer that fires once at `deadline`. Deadlines in the past fire
    /// immediately.
    fn timer(&self, deadline: DateTime<Utc>) -> Timer;
}

/// A pending timer: a fire channel paired with a cancel hook.
///
/// After [`cancel`](Timer::cancel) the fire channel stays silent; a
/// cancelled timer never resolves.
pub struct Timer {
    fire: mpsc::Receiver<()>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Timer {
    pub fn new(fire: mpsc::Receiver<()>, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            fire,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Resolves when the timer fires. Stays pending forever once the timer
    /// is cancelled or its clock is gone.
    pub async fn fired(&mut self) {
        if self.fire.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    /// Stop the timer. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Production clock: `Utc::now` and tokio sleep tasks.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

/// Sleeps are re-armed by the scheduler after every mutation, so a single
/// sleep never needs to span more than this. Keeps the requested duration
/// comfortably inside what the tokio timer wheel accepts.
const MAX_SLEEP: std::time::Duration = std::time::Duration::from_secs(365 * 24 * 60 * 60);

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timer(&self, deadline: DateTime<Utc>) -> Timer {
        let (fire_tx, fire_rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let wait = (deadline - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
            .min(MAX_SLEEP);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    let _ = fire_tx.send(()).await;
                }
                _ = cancel_rx => {}
            }
        });
        Timer::new(fire_rx, move || {
            let _ = cancel_tx.send(());
        })
    }
}

/// Manually driven clock for deterministic tests.
///
/// Time only moves through [`advance`](TestClock::advance) /
/// [`set`](TestClock::set); pending timers whose deadline is reached fire
/// synchronously from those calls.
#[derive(Clone)]
pub struct TestClock {
    inner: Arc<Mutex<TestClockInner>>,
}

struct TestClockInner {
    now: DateTime<Utc>,
    timers: Vec<PendingTimer>,
    next_token: u64,
}

struct PendingTimer {
    token: u64,
    deadline: DateTime<Utc>,
    fire: mpsc::Sender<()>,
}

impl TestClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TestClockInner {
                now: start,
                timers: Vec::new(),
                next_token: 0,
            })),
        }
    }

    /// Move the clock forward by `step`, firing every timer that comes due.
    pub fn advance(&self, step: Duration) {
        let target = self.now() + step;
        self.set(target);
    }

    /// Jump the clock to `target` (never backwards), firing every timer
    /// with a deadline at or before it.
    pub fn set(&self, target: DateTime<Utc>) {
        let due: Vec<mpsc::Sender<()>> = {
            let mut inner = self.inner.lock();
            if target < inner.now {
                return;
            }
            inner.now = target;
            let (due, pending) = inner
                .timers
                .drain(..)
                .partition(|t| t.deadline <= target);
            inner.timers = pending;
            due.into_iter().map(|t| t.fire).collect()
        };
        for fire in due {
            let _ = fire.try_send(());
        }
    }

    /// Step through every pending deadline up to `end`, pausing briefly
    /// between steps so the scheduler task can process each firing and
    /// re-arm. Lets a test push a scheduler through hours of virtual time
    /// in milliseconds of real time.
    pub async fn run_to(&self, end: DateTime<Utc>) {
        loop {
            let next = {
                let inner = self.inner.lock();
                inner
                    .timers
                    .iter()
                    .map(|t| t.deadline)
                    .filter(|d| *d > inner.now && *d <= end)
                    .min()
            };
            match next {
                Some(deadline) => {
                    self.set(deadline);
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                }
                None => {
                    self.set(end);
                    return;
                }
            }
        }
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().now
    }

    fn timer(&self, deadline: DateTime<Utc>) -> Timer {
        let (fire_tx, fire_rx) = mpsc::channel(1);
        let token = {
            let mut inner = self.inner.lock();
            let token = inner.next_token;
            inner.next_token += 1;
            if deadline <= inner.now {
                let _ = fire_tx.try_send(());
            } else {
                inner.timers.push(PendingTimer {
                    token,
                    deadline,
                    fire: fire_tx,
                });
            }
            token
        };
        let registry = Arc::clone(&self.inner);
        Timer::new(fire_rx, move || {
            registry.lock().timers.retain(|t| t.token != token);
        })
    }
}
