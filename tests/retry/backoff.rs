use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use versioned_store::retry::{with_retry, RetryExecutor, RetryPolicy};

use crate::support::{RecordingLogger, TestError};

#[tokio::test(start_paused = true)]
async fn succeeds_after_one_full_backoff() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let policy = RetryPolicy::<TestError>::default()
        .with_max_retries(3)
        .with_base_delay(Duration::from_millis(1000));

    let task = tokio::spawn(async move {
        with_retry(
            || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(TestError::Transient("first call fails"))
                    } else {
                        Ok("success")
                    }
                }
            },
            &policy,
        )
        .await
    });

    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(999)).await;
    assert!(!task.is_finished());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(task.await.unwrap(), Ok("success"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_returns_the_last_error_unchanged() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::<TestError>::default()
        .with_max_retries(2)
        .with_base_delay(Duration::from_millis(100));

    let started = Instant::now();
    let result: Result<(), _> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Transient("always"))
        },
        &policy,
    )
    .await;

    assert_eq!(result, Err(TestError::Transient("always")));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 100ms + 200ms of backoff, no wait after the final attempt.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(400), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn vetoed_error_fails_without_waiting() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::<TestError>::default().with_should_retry(TestError::is_transient);

    let started = Instant::now();
    let result: Result<(), _> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Fatal("bad input"))
        },
        &policy,
    )
    .await;

    assert_eq!(result, Err(TestError::Fatal("bad input")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn veto_applies_after_earlier_retries() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::<TestError>::default()
        .with_base_delay(Duration::from_millis(10))
        .with_should_retry(TestError::is_transient);

    let result: Result<(), _> = with_retry(
        || async {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(TestError::Transient("blip")),
                _ => Err(TestError::Fatal("gone")),
            }
        },
        &policy,
    )
    .await;

    assert_eq!(result, Err(TestError::Fatal("gone")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_attempts_time_out_and_retry() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::<TestError>::default()
        .with_max_retries(2)
        .with_base_delay(Duration::from_millis(50))
        .with_timeout(Duration::from_millis(200));

    let result: Result<(), _> = with_retry(
        || async {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
            Ok(())
        },
        &policy,
    )
    .await;

    assert_eq!(result, Err(TestError::Timeout(Duration::from_millis(200))));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn jittered_delays_stay_within_bounds() {
    let logger = RecordingLogger::new();
    let policy = RetryPolicy::<TestError>::default()
        .with_max_retries(3)
        .with_base_delay(Duration::from_millis(100))
        .with_jitter(Duration::from_millis(50));
    let executor = RetryExecutor::new(policy).with_logger(logger.clone());

    let result: Result<(), _> = executor
        .run(|| async { Err(TestError::Transient("flaky")) })
        .await;
    assert!(result.is_err());

    let delays: Vec<_> = logger.reports().iter().map(|r| r.retry_in).collect();
    assert_eq!(delays.len(), 4);
    for (retry, delay) in delays[..3].iter().enumerate() {
        let floor = Duration::from_millis(100 << retry);
        let delay = delay.unwrap();
        assert!(delay >= floor && delay <= floor + Duration::from_millis(50), "{:?}", delay);
    }
    assert_eq!(delays[3], None);
}
