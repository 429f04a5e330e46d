use versioned_store::{CasResult, StoreError, VersionedDoc, NO_DOCUMENT};

use crate::support::{spawn_store, Announcement};

#[tokio::test]
async fn create_read_update_cycle() {
    let store = spawn_store("cas-cycle");
    let draft = Announcement::new("a1", "Exam moved");

    let created = store
        .cas_put("announcements:a1", NO_DOCUMENT, &draft)
        .await
        .unwrap();
    assert_eq!(created, CasResult::applied(1));

    let read = store
        .require_doc::<Announcement>("announcements:a1")
        .await
        .unwrap();
    assert_eq!(read, VersionedDoc::new(1, draft.clone()));

    let mut edited = read.data.clone();
    edited.body = "Now on Friday".into();
    let updated = store
        .cas_put("announcements:a1", read.version, &edited)
        .await
        .unwrap();
    assert_eq!(updated, CasResult::applied(2));

    // A second writer still holding version 1 loses.
    let stale = store
        .cas_put("announcements:a1", read.version, &draft)
        .await
        .unwrap();
    assert_eq!(stale, CasResult::stale(2));

    let current = store
        .require_doc::<Announcement>("announcements:a1")
        .await
        .unwrap();
    assert_eq!(current.data.body, "Now on Friday");
}

#[tokio::test]
async fn versions_advance_by_one_per_write() {
    let store = spawn_store("cas-versions");
    let mut version = NO_DOCUMENT;
    for n in 0..10u32 {
        let result = store.cas_put("counter", version, &n).await.unwrap();
        assert!(result.ok);
        assert_eq!(result.version, version + 1);
        version = result.version;
    }
    assert_eq!(store.put("counter", &99u32).await.unwrap(), 11);
}

#[tokio::test]
async fn recreated_key_restarts_at_first_version() {
    let store = spawn_store("cas-recreate");
    store.put("k", &"one").await.unwrap();
    store.put("k", &"two").await.unwrap();
    store.del("k").await.unwrap();

    assert_eq!(store.put("k", &"three").await.unwrap(), 1);
    let doc = store.require_doc::<String>("k").await.unwrap();
    assert_eq!(doc, VersionedDoc::new(1, "three".to_string()));
}

#[tokio::test]
async fn cas_against_deleted_key_needs_no_document() {
    let store = spawn_store("cas-deleted");
    store.put("k", &1).await.unwrap();
    store.del("k").await.unwrap();

    assert_eq!(store.cas_put("k", 1, &2).await.unwrap(), CasResult::stale(NO_DOCUMENT));
    assert_eq!(
        store.cas_put("k", NO_DOCUMENT, &2).await.unwrap(),
        CasResult::applied(1)
    );
}

#[tokio::test]
async fn wrong_type_reports_serde_error() {
    let store = spawn_store("cas-serde");
    store.put("k", &"not a number").await.unwrap();

    let err = store.get_doc::<u32>("k").await.unwrap_err();
    assert!(matches!(err, StoreError::Serde(_)), "{:?}", err);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn reads_observe_acknowledged_writes() {
    let store = spawn_store("cas-ordering");
    let writer = store.clone();
    for n in 0..50u32 {
        writer.put("seq", &n).await.unwrap();
        let doc = store.require_doc::<u32>("seq").await.unwrap();
        assert_eq!(doc.data, n);
        assert_eq!(doc.version, u64::from(n) + 1);
    }
}
