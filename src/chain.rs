//! Job values and the wrapper chain that decorates them.
//!
//! A wrapper maps a job to a job; a [`Chain`] applies wrappers
//! right-to-left so the first wrapper in the list is outermost. The
//! standard wrappers cover panic isolation and the two overlap policies
//! (serialize vs. skip).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{Mutex, Semaphore};

/// A schedulable unit of work. Invoked once per activation, each time in
/// its own tokio task.
pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Build a [`Job`] from an async closure.
pub fn job<F, Fut>(f: F) -> Job
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Decorates a [`Job`] with cross-cutting behavior.
pub type JobWrapper = Arc<dyn Fn(Job) -> Job + Send + Sync>;

/// A sequence of wrappers applied to every submitted job.
///
/// `Chain::new(vec![w1, w2, w3]).apply(job)` is equivalent to
/// `w1(w2(w3(job)))`: the job runs inside `w3`, inside `w2`, inside `w1`.
#[derive(Clone, Default)]
pub struct Chain {
    wrappers: Vec<JobWrapper>,
}

impl Chain {
    pub fn new(wrappers: Vec<JobWrapper>) -> Self {
        Self { wrappers }
    }

    /// Decorate `job` with all wrappers in the chain.
    pub fn apply(&self, mut job: Job) -> Job {
        for wrapper in self.wrappers.iter().rev() {
            job = wrapper(job);
        }
        job
    }
}

/// Catches panics in the wrapped job and logs them, with a captured
/// backtrace, instead of letting them tear down the job task.
pub fn recover() -> JobWrapper {
    Arc::new(|job: Job| {
        Arc::new(move || {
            let job = Arc::clone(&job);
            async move {
                if let Err(panic) = AssertUnwindSafe(job()).catch_unwind().await {
                    let backtrace = std::backtrace::Backtrace::force_capture();
                    tracing::error!(
                        event = "panic",
                        panic = %panic_message(panic.as_ref()),
                        stack = %backtrace,
                        "job panicked"
                    );
                }
            }
            .boxed()
        })
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Serializes invocations: a run that would overlap the previous one waits
/// for it instead. Waits longer than a minute are logged at info.
pub fn delay_if_still_running() -> JobWrapper {
    Arc::new(|job: Job| {
        let gate = Arc::new(Mutex::new(()));
        Arc::new(move || {
            let job = Arc::clone(&job);
            let gate = Arc::clone(&gate);
            async move {
                let requested = Instant::now();
                let _held = gate.lock().await;
                let waited = requested.elapsed();
                if waited > Duration::from_secs(60) {
                    tracing::info!(
                        event = "delay",
                        delay_ms = waited.as_millis() as u64,
                        "job execution delayed"
                    );
                }
                job().await;
            }
            .boxed()
        })
    })
}

/// Drops an invocation entirely if the previous one is still running,
/// logging the skip at info.
pub fn skip_if_still_running() -> JobWrapper {
    Arc::new(|job: Job| {
        let slot = Arc::new(Semaphore::new(1));
        Arc::new(move || {
            let job = Arc::clone(&job);
            let slot = Arc::clone(&slot);
            async move {
                match slot.try_acquire() {
                    Ok(_permit) => job().await,
                    Err(_) => tracing::info!(event = "skip", "job execution skipped"),
                }
            }
            .boxed()
        })
    })
}
