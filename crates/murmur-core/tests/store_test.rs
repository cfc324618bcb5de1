mod common;

use std::sync::Arc;

use common::{mint_refresh, mint_token, FakeAuthBackend, EMAIL, PASSWORD, USER_ID};
use murmur_core::auth::{CredentialPair, FileTokenStore, SessionManager, SessionSettings, TokenStore};
use tempfile::TempDir;

fn settings() -> SessionSettings {
    SessionSettings {
        proactive_refresh: false,
        ..SessionSettings::default()
    }
}

#[test]
fn test_file_store_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path());
    assert!(store.load().unwrap().is_none());

    let pair = CredentialPair {
        access: mint_token(USER_ID, 3600),
        refresh: mint_refresh(),
    };
    store.save(&pair).unwrap();
    assert!(store.path().exists());
    assert_eq!(store.load().unwrap(), Some(pair));

    store.clear().unwrap();
    assert!(!store.path().exists());
    assert!(store.load().unwrap().is_none());
    store.clear().unwrap();
}

#[test]
fn test_file_store_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path().join("nested").join("murmur"));
    store
        .save(&CredentialPair {
            access: "a".into(),
            refresh: "b".into(),
        })
        .unwrap();
    assert!(store.path().exists());
}

#[test]
fn test_file_store_rejects_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path());
    std::fs::write(store.path(), "{\"access\": 1").unwrap();
    assert!(store.load().is_err());
}

#[tokio::test]
async fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    let backend = FakeAuthBackend::new();

    let first = SessionManager::with_settings(
        backend.clone(),
        Arc::new(FileTokenStore::new(dir.path())),
        settings(),
    );
    let identity = first.login(EMAIL, PASSWORD).await.unwrap();
    drop(first);

    let second = SessionManager::with_settings(
        backend.clone(),
        Arc::new(FileTokenStore::new(dir.path())),
        settings(),
    );
    assert_eq!(second.restore().await, Some(identity));

    second.logout();
    let third = SessionManager::with_settings(
        backend,
        Arc::new(FileTokenStore::new(dir.path())),
        settings(),
    );
    assert!(third.restore().await.is_none());
}
