use std::sync::Arc;

use tokio::sync::Barrier;
use versioned_store::NO_DOCUMENT;

use crate::support::{spawn_store, Grade};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exactly_one_creator_wins() {
    let store = spawn_store("race-create");
    let writers = 16;
    let barrier = Arc::new(Barrier::new(writers));

    let mut tasks = Vec::new();
    for n in 0..writers {
        let store = store.clone();
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            let grade = Grade::new("g", &format!("writer-{}", n), n as u32);
            store
                .cas_put("grades:g", NO_DOCUMENT, &grade)
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        let result = task.await.unwrap();
        if result.ok {
            winners += 1;
            assert_eq!(result.version, 1);
        } else {
            assert_eq!(result.version, 1);
        }
    }
    assert_eq!(winners, 1);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.cas_applied, 1);
    assert_eq!(stats.cas_rejected, writers - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn optimistic_increments_are_never_lost() {
    let store = spawn_store("race-increment");
    store.put("counter", &0u32).await.unwrap();

    let workers = 8;
    let per_worker = 25;
    let mut tasks = Vec::new();
    for _ in 0..workers {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..per_worker {
                store
                    .update("counter", 1000, |n: Option<u32>| Ok(n.unwrap_or(0) + 1))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let doc = store.require_doc::<u32>("counter").await.unwrap();
    assert_eq!(doc.data, workers * per_worker);
    assert_eq!(doc.version, u64::from(workers * per_worker) + 1);
}
