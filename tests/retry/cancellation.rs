use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use versioned_store::retry::{cancel_pair, RetryExecutor, RetryPolicy};

use crate::support::TestError;

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_returns_promptly() {
    let (trigger, signal) = cancel_pair();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let executor = RetryExecutor::new(
        RetryPolicy::<TestError>::default()
            .with_max_retries(5)
            .with_base_delay(Duration::from_secs(30)),
    )
    .with_cancel(signal);

    let started = Instant::now();
    let task = tokio::spawn(async move {
        executor
            .run(|| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TestError::Transient("busy")) }
            })
            .await
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    trigger.cancel();

    assert_eq!(task.await.unwrap(), Err(TestError::Cancelled));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn cancel_abandons_an_attempt_in_flight() {
    let (trigger, signal) = cancel_pair();
    let executor = RetryExecutor::new(RetryPolicy::<TestError>::default()).with_cancel(signal);

    let task = tokio::spawn(async move {
        executor
            .run(|| async {
                std::future::pending::<()>().await;
                Ok::<_, TestError>(())
            })
            .await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    trigger.cancel();
    assert_eq!(task.await.unwrap(), Err(TestError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn one_trigger_cancels_every_clone() {
    let (trigger, signal) = cancel_pair();
    let executor = RetryExecutor::new(
        RetryPolicy::<TestError>::default().with_base_delay(Duration::from_secs(10)),
    )
    .with_cancel(signal);

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let executor = executor.clone();
            tokio::spawn(async move {
                executor
                    .run(|| async { Err::<(), _>(TestError::Transient("down")) })
                    .await
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    trigger.cancel();
    for task in tasks {
        assert_eq!(task.await.unwrap(), Err(TestError::Cancelled));
    }
}

#[tokio::test(start_paused = true)]
async fn untriggered_signal_lets_the_call_finish() {
    let (_trigger, signal) = cancel_pair();
    let calls = AtomicU32::new(0);
    let executor = RetryExecutor::new(
        RetryPolicy::<TestError>::default().with_base_delay(Duration::from_millis(10)),
    )
    .with_cancel(signal);

    let result = executor
        .run(|| async {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(TestError::Transient("again")),
                _ => Ok("done"),
            }
        })
        .await;
    assert_eq!(result, Ok("done"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
