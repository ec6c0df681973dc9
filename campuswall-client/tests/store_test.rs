//! Cross-instance propagation through the shared session file.

use std::time::Duration;

use campuswall_client::{ChangeOrigin, FileStore, SessionStore};

const FAST_POLL: Duration = Duration::from_millis(50);

#[tokio::test]
async fn file_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    {
        let store = FileStore::open(&path, FAST_POLL).unwrap();
        store.set("token", "tok-1").unwrap();
    }

    let reopened = FileStore::open(&path, FAST_POLL).unwrap();
    assert_eq!(reopened.get("token").unwrap().as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn external_writes_surface_as_change_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let writer = FileStore::open(&path, FAST_POLL).unwrap();
    let observer = FileStore::open(&path, FAST_POLL).unwrap();
    let mut changes = observer.subscribe();

    writer.set("token", "tok-2").unwrap();

    let change = tokio::time::timeout(Duration::from_secs(2), changes.recv())
        .await
        .expect("no change observed within the poll window")
        .unwrap();
    assert_eq!(change.origin, ChangeOrigin::External);
    assert!(change.keys.contains(&"token".to_string()));
    assert_eq!(observer.get("token").unwrap().as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn external_removal_is_observed_too() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let writer = FileStore::open(&path, FAST_POLL).unwrap();
    writer.set("token", "tok-3").unwrap();

    let observer = FileStore::open(&path, FAST_POLL).unwrap();
    assert_eq!(observer.get("token").unwrap().as_deref(), Some("tok-3"));
    let mut changes = observer.subscribe();

    // The logout happens in the other instance.
    writer.remove("token").unwrap();

    let change = tokio::time::timeout(Duration::from_secs(2), changes.recv())
        .await
        .expect("no change observed within the poll window")
        .unwrap();
    assert_eq!(change.origin, ChangeOrigin::External);
    assert!(change.keys.contains(&"token".to_string()));
    assert!(observer.get("token").unwrap().is_none());
}

#[tokio::test]
async fn last_observed_write_wins_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let a = FileStore::open(&path, FAST_POLL).unwrap();
    let b = FileStore::open(&path, FAST_POLL).unwrap();

    a.set("token", "from-a").unwrap();
    b.set("token", "from-b").unwrap();

    // Give both watchers a couple of poll windows to converge.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(a.get("token").unwrap().as_deref(), Some("from-b"));
    assert_eq!(b.get("token").unwrap().as_deref(), Some("from-b"));
}

#[tokio::test(flavor = "multi_thread")]
async fn local_writes_survive_the_watcher() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    // An aggressive poll interval interleaves the watcher with every
    // write; a snapshot diffed outside the entries lock would revert
    // fresh writes here.
    let store = FileStore::open(&path, Duration::from_micros(50)).unwrap();

    for i in 0..500 {
        let value = format!("tok-{i}");
        store.set("token", &value).unwrap();
        assert_eq!(
            store.get("token").unwrap().as_deref(),
            Some(value.as_str()),
            "local write must read back immediately (iteration {i})"
        );
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn local_mutations_report_local_origin() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let store = FileStore::open(&path, FAST_POLL).unwrap();
    let mut changes = store.subscribe();

    store.set("user", "{\"uid\":\"u-1\"}").unwrap();
    let change = changes.recv().await.unwrap();
    assert_eq!(change.origin, ChangeOrigin::Local);
    assert_eq!(change.keys, vec!["user".to_string()]);
}
