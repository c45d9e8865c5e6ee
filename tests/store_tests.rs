//! Integration tests for the collection store and its subscriptions.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rstest::rstest;

use common::{Recorder, task};
use taskboard::cache::{CollectionStore, FetchOutcome};
use taskboard::domain::TaskId;
use taskboard::remote::RemoteError;

// =============================================================================
// Notification
// =============================================================================

#[rstest]
fn test_each_write_notifies_once() {
    let store = CollectionStore::new();
    let recorder = Recorder::attach(&store);

    store.replace(vec![task(1, "A")]);
    store.append(task(2, "B"));
    store.patch(|task| task.id == TaskId::new(1), |task| Some(task.clone()));
    let saved = store.snapshot();
    store.remove(TaskId::new(2));
    store.restore(saved);

    assert_eq!(recorder.revisions(), [1, 2, 3, 4, 5]);
}

#[rstest]
fn test_subscriber_sees_settled_state() {
    let store = Arc::new(CollectionStore::new());
    let observed = Arc::new(AtomicUsize::new(0));
    let reader = Arc::clone(&store);
    let sink = Arc::clone(&observed);
    let _subscription = store.subscribe(move |snapshot| {
        // Reading the store from a callback sees the published snapshot.
        assert_eq!(reader.get().revision(), snapshot.revision());
        sink.store(snapshot.len(), Ordering::SeqCst);
    });

    store.replace(vec![task(1, "A"), task(2, "B")]);
    assert_eq!(observed.load(Ordering::SeqCst), 2);
}

#[rstest]
fn test_dropped_subscription_stops_notifications() {
    let store = CollectionStore::new();
    let recorder = Recorder::attach(&store);
    store.append(task(1, "A"));

    let Recorder { seen, subscription } = recorder;
    drop(subscription);
    store.append(task(2, "B"));

    assert_eq!(seen.lock().len(), 1);
    assert_eq!(store.subscriber_count(), 0);
}

#[rstest]
fn test_concurrent_writers_notify_in_revision_order() {
    let store = Arc::new(CollectionStore::new());
    let recorder = Recorder::attach(&store);

    let writers: Vec<_> = (0..4)
        .map(|writer| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for offset in 0..25 {
                    store.append(task(writer * 100 + offset + 1, "T"));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let revisions = recorder.revisions();
    assert_eq!(revisions.len(), 100);
    assert!(revisions.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(store.get().len(), 100);
}

#[rstest]
#[tokio::test]
async fn test_watch_receiver_tracks_latest_snapshot() {
    let store = CollectionStore::new();
    let mut receiver = store.watch();

    store.replace(vec![task(1, "A")]);
    receiver.changed().await.unwrap();
    assert_eq!(receiver.borrow_and_update().len(), 1);

    store.append(task(2, "B"));
    store.append(task(3, "C"));
    receiver.changed().await.unwrap();
    assert_eq!(receiver.borrow().revision(), 3);
}

// =============================================================================
// Fetch Lifecycle
// =============================================================================

#[rstest]
fn test_cancelled_fetch_result_is_discarded_silently() {
    let store = CollectionStore::new();
    store.replace(vec![task(-1, "optimistic")]);
    let ticket = store.begin_fetch();
    assert!(store.cancel_fetch());
    let recorder = Recorder::attach(&store);

    let outcome = store.finish_fetch(&ticket, Ok(vec![task(1, "stale")]));

    assert_eq!(outcome, FetchOutcome::Cancelled);
    assert_eq!(recorder.count(), 0);
    assert_eq!(store.get().entries()[0].title, "optimistic");
}

#[rstest]
fn test_successful_fetch_clears_previous_error() {
    let store = CollectionStore::new();
    let failing = store.begin_fetch();
    store.finish_fetch(&failing, Err(RemoteError::with_message(503, "Maintenance")));
    assert_eq!(store.get().error_message(), Some("Maintenance"));

    let ticket = store.begin_fetch();
    store.finish_fetch(&ticket, Ok(vec![task(1, "A")]));

    let snapshot = store.get();
    assert!(snapshot.error().is_none());
    assert!(snapshot.has_loaded());
    assert_eq!(snapshot.len(), 1);
}

#[rstest]
fn test_snapshot_is_unaffected_by_later_writes() {
    let store = CollectionStore::new();
    store.replace(vec![task(1, "A")]);
    let saved = store.snapshot();

    store.append(task(2, "B"));
    store.remove(TaskId::new(1));

    assert_eq!(saved.len(), 1);
    assert_eq!(saved.as_slice()[0].title, "A");
}
