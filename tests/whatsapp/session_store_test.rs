//! Tests for `src/whatsapp/session_store.rs`.

use whatsapp_gateway::whatsapp::session_store::SessionStore;

use crate::common::temp_store;

fn seed(store: &SessionStore) {
    let session = store.auth_dir().join("session-default");
    std::fs::create_dir_all(&session).expect("create auth dir");
    std::fs::write(session.join("Local State"), "{}").expect("write auth file");
    std::fs::create_dir_all(store.cache_dir()).expect("create cache dir");
    std::fs::write(store.cache_dir().join("index.html"), "<html/>").expect("write cache file");
}

#[tokio::test]
async fn saved_session_is_detected() {
    let (_tmp, store) = temp_store();
    assert!(!store.has_saved_session().await);

    seed(&store);
    assert!(store.has_saved_session().await);
}

#[tokio::test]
async fn empty_auth_dir_is_not_a_saved_session() {
    let (_tmp, store) = temp_store();
    std::fs::create_dir_all(store.auth_dir()).expect("create auth dir");

    assert!(!store.has_saved_session().await);
}

#[tokio::test]
async fn wipe_removes_both_directories() {
    let (_tmp, store) = temp_store();
    seed(&store);

    let result = store.wipe().await;

    assert!(result.is_ok(), "wipe failed: {result:?}");
    assert!(!store.auth_dir().exists());
    assert!(!store.cache_dir().exists());
    assert!(!store.has_saved_session().await);
}

#[tokio::test]
async fn failed_auth_removal_still_clears_the_cache() {
    let (_tmp, store) = temp_store();
    seed(&store);
    std::fs::remove_dir_all(store.auth_dir()).expect("remove seeded auth dir");
    // A regular file where the auth directory should be cannot be removed as a directory.
    std::fs::write(store.auth_dir(), "not a directory").expect("write auth file");

    let result = store.wipe().await;

    assert!(result.is_err(), "wipe should report the auth failure");
    assert!(!store.cache_dir().exists());
}

#[tokio::test]
async fn wipe_of_absent_directories_succeeds() {
    let (_tmp, store) = temp_store();

    assert!(store.wipe().await.is_ok());
    assert!(store.wipe().await.is_ok());
}

#[tokio::test]
async fn preserved_roots_are_emptied_not_removed() {
    let (_tmp, store) = temp_store();
    let store = store.with_preserved_roots(true);
    seed(&store);

    store.wipe().await.expect("wipe should succeed");

    assert!(store.auth_dir().is_dir());
    assert!(store.cache_dir().is_dir());
    let leftover = std::fs::read_dir(store.auth_dir())
        .expect("read auth dir")
        .count();
    assert_eq!(leftover, 0);
    assert!(!store.has_saved_session().await);
}
