//! End-to-end scheduler tests, driven deterministically through a
//! [`TestClock`]: virtual time only moves when a test advances it, and job
//! side effects are observed through atomics and channels.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sa_cron::{Chain, Cron, Schedule, TestClock};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn test_cron() -> (Cron, TestClock) {
    let clock = TestClock::new(epoch());
    let cron = Cron::builder().with_seconds().clock(clock.clone()).build();
    (cron, clock)
}

/// Give the scheduler task a moment to process pending work.
async fn settle() {
    tokio::time::sleep(StdDuration::from_millis(30)).await;
}

/// A job that counts its invocations.
fn counting_job(counter: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> + Send + Sync {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(())
    }
}

#[tokio::test]
async fn per_second_job_fires_exactly_once_then_removal_silences_it() {
    let (cron, clock) = test_cron();
    cron.start().await;
    settle().await;

    let calls = Arc::new(AtomicUsize::new(0));
    let id = cron.add("* * * * * *", counting_job(&calls)).await.unwrap();
    settle().await;

    clock.advance(Duration::seconds(1));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "expected exactly one invocation");

    cron.remove(id).await;
    settle().await;
    clock.advance(Duration::seconds(2));
    settle().await;
    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "a removed entry must not fire again"
    );

    cron.stop().await.wait().await;
}

#[tokio::test]
async fn zero_schedule_entry_coexists_without_firing() {
    let (cron, clock) = test_cron();
    let never = Arc::new(AtomicUsize::new(0));
    let every_second = Arc::new(AtomicUsize::new(0));

    cron.schedule(Schedule::Zero, counting_job(&never)).await.unwrap();
    cron.add("* * * * * *", counting_job(&every_second))
        .await
        .unwrap();

    cron.start().await;
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;

    assert_eq!(never.load(Ordering::SeqCst), 0, "zero-schedule entry must not run");
    assert_eq!(every_second.load(Ordering::SeqCst), 1);

    // The parked entry is still registered and visible in snapshots.
    let entries = cron.entries().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|e| e.next.is_none()));

    cron.stop().await.wait().await;
}

#[tokio::test]
async fn add_before_start_runs_after_start() {
    let (cron, clock) = test_cron();
    let calls = Arc::new(AtomicUsize::new(0));
    cron.add("* * * * * *", counting_job(&calls)).await.unwrap();

    cron.start().await;
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    cron.stop().await.wait().await;
}

#[tokio::test]
async fn stopped_scheduler_does_not_run_jobs() {
    let (cron, clock) = test_cron();
    cron.start().await;
    cron.stop().await.wait().await;

    let calls = Arc::new(AtomicUsize::new(0));
    cron.add("* * * * * *", counting_job(&calls)).await.unwrap();
    clock.advance(Duration::seconds(3));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn remove_before_start_prevents_run() {
    let (cron, clock) = test_cron();
    let calls = Arc::new(AtomicUsize::new(0));
    let id = cron.add("* * * * * *", counting_job(&calls)).await.unwrap();
    cron.remove(id).await;

    cron.start().await;
    settle().await;
    clock.advance(Duration::seconds(2));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    cron.stop().await.wait().await;
}

#[tokio::test]
async fn far_future_entries_do_not_block_immediate_ones() {
    let (cron, clock) = test_cron();
    let immediate = Arc::new(AtomicUsize::new(0));
    let yearly = Arc::new(AtomicUsize::new(0));

    cron.add("0 0 0 1 1 ?", counting_job(&yearly)).await.unwrap();
    cron.add("* * * * * *", counting_job(&immediate)).await.unwrap();
    cron.add("0 0 0 31 12 ?", counting_job(&yearly)).await.unwrap();

    cron.start().await;
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;

    assert_eq!(immediate.load(Ordering::SeqCst), 1);
    assert_eq!(yearly.load(Ordering::SeqCst), 0);
    cron.stop().await.wait().await;
}

#[tokio::test]
async fn every_descriptor_fires_on_interval() {
    let (cron, clock) = test_cron();
    let calls = Arc::new(AtomicUsize::new(0));
    cron.add("@every 2s", counting_job(&calls)).await.unwrap();

    cron.start().await;
    settle().await;

    // Taking a snapshot halfway through must not reset the timer.
    clock.advance(Duration::seconds(1));
    settle().await;
    assert_eq!(cron.entries().await.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    clock.advance(Duration::seconds(1));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "expected fire at the 2s mark");

    cron.stop().await.wait().await;
}

#[tokio::test]
async fn snapshot_reflects_prev_and_next_after_a_fire() {
    let (cron, clock) = test_cron();
    let calls = Arc::new(AtomicUsize::new(0));
    let id = cron.add("* * * * * *", counting_job(&calls)).await.unwrap();

    cron.start().await;
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;

    let entry = cron.entry(id).await.expect("entry should be present");
    assert_eq!(entry.prev, Some(epoch() + Duration::seconds(1)));
    assert_eq!(entry.next, Some(epoch() + Duration::seconds(2)));

    cron.stop().await.wait().await;
}

#[tokio::test]
async fn stop_handle_waits_for_in_flight_job() {
    let (cron, clock) = test_cron();
    let (started_tx, mut started_rx) = tokio::sync::mpsc::channel::<()>(1);
    let finished = Arc::new(AtomicUsize::new(0));

    let done = Arc::clone(&finished);
    cron.add("* * * * * *", move || {
        let started = started_tx.clone();
        let done = Arc::clone(&done);
        async move {
            let _ = started.send(()).await;
            tokio::time::sleep(StdDuration::from_millis(300)).await;
            done.fetch_add(1, Ordering::SeqCst);
        }
    })
    .await
    .unwrap();

    cron.start().await;
    settle().await;
    clock.advance(Duration::seconds(1));
    started_rx.recv().await.expect("job should have started");

    let handle = cron.stop().await;
    let wait = handle.wait();
    tokio::pin!(wait);

    // The handle must stay pending while the job is sleeping...
    assert!(
        tokio::time::timeout(StdDuration::from_millis(100), wait.as_mut())
            .await
            .is_err(),
        "stop handle completed before the in-flight job finished"
    );

    // ...and resolve once it returns.
    tokio::time::timeout(StdDuration::from_secs(2), wait)
        .await
        .expect("stop handle should complete after the job finishes");
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_stop_handles_all_complete() {
    let (cron, _clock) = test_cron();
    cron.start().await;
    let first = cron.stop().await;
    let second = cron.stop().await;
    tokio::time::timeout(StdDuration::from_secs(1), first.wait())
        .await
        .expect("first stop handle");
    tokio::time::timeout(StdDuration::from_secs(1), second.wait())
        .await
        .expect("second stop handle");
}

#[tokio::test]
async fn blocking_run_dispatches_until_stopped() {
    let (cron, clock) = test_cron();
    let calls = Arc::new(AtomicUsize::new(0));
    cron.add("* * * * * *", counting_job(&calls)).await.unwrap();

    let runner = cron.clone();
    let running = tokio::spawn(async move { runner.run().await });
    settle().await;

    clock.advance(Duration::seconds(1));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!running.is_finished(), "run() must block until stopped");

    cron.stop().await.wait().await;
    tokio::time::timeout(StdDuration::from_secs(1), running)
        .await
        .expect("run() should return after stop")
        .unwrap();
}

#[tokio::test]
async fn run_to_drives_an_hourly_job_through_a_day() {
    let (cron, clock) = test_cron();
    let calls = Arc::new(AtomicUsize::new(0));
    cron.add("0 0 * * * *", counting_job(&calls)).await.unwrap();

    cron.start().await;
    settle().await;

    clock.run_to(epoch() + Duration::hours(24)).await;
    settle().await;

    assert_eq!(
        calls.load(Ordering::SeqCst),
        24,
        "hourly job should fire once per virtual hour"
    );
    cron.stop().await.wait().await;
}

#[tokio::test]
async fn default_chain_recovers_panicking_jobs() {
    let (cron, clock) = test_cron();
    let calls = Arc::new(AtomicUsize::new(0));

    let counted = Arc::clone(&calls);
    cron.add("* * * * * *", move || {
        let calls = Arc::clone(&counted);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            panic!("YOLO");
        }
    })
    .await
    .unwrap();

    cron.start().await;
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;

    assert_eq!(
        calls.load(Ordering::SeqCst),
        2,
        "scheduler must keep dispatching after a panicking run"
    );
    cron.stop().await.wait().await;
}

#[tokio::test]
async fn panic_is_logged_with_its_message() {
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Sink(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Sink {
        type Writer = Sink;
        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    let sink = Sink::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (cron, clock) = test_cron();
    cron.add("* * * * * *", || async {
        panic!("YOLO");
    })
    .await
    .unwrap();

    cron.start().await;
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;
    cron.stop().await.wait().await;

    let logged = String::from_utf8_lossy(&sink.0.lock().unwrap()).to_string();
    assert!(
        logged.contains("YOLO"),
        "expected the panic payload in the log, got: {logged}"
    );
}

#[tokio::test]
async fn skip_wrapper_drops_overlapping_runs_end_to_end() {
    let clock = TestClock::new(epoch());
    let cron = Cron::builder()
        .with_seconds()
        .clock(clock.clone())
        .chain(Chain::new(vec![sa_cron::skip_if_still_running()]))
        .build();

    let started = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(tokio::sync::Mutex::new(()));

    let counted = Arc::clone(&started);
    let held = Arc::clone(&gate);
    cron.add("* * * * * *", move || {
        let started = Arc::clone(&counted);
        let held = Arc::clone(&held);
        async move {
            started.fetch_add(1, Ordering::SeqCst);
            let _released = held.lock().await;
        }
    })
    .await
    .unwrap();

    // Hold the gate so the first run never finishes during the test.
    let blocker = gate.clone().lock_owned().await;

    cron.start().await;
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;
    clock.advance(Duration::seconds(1));
    settle().await;

    assert_eq!(
        started.load(Ordering::SeqCst),
        1,
        "overlapping runs should be skipped while the first is live"
    );

    drop(blocker);
    cron.stop().await.wait().await;
}
