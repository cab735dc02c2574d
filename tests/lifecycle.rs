//! Integration tests for the session lifecycle across backends.

use http::header::{COOKIE, SET_COOKIE};
use http::{Request, Response};
use sessionstore::config::{BackendKind, Config, KeyConfig};
#[cfg(feature = "redb-backend")]
use sessionstore::storage::RedbBackend;
use sessionstore::storage::{MemoryBackend, SessionBackend};
use sessionstore::{CryptoError, Error, KeyPair, Registry, SessionStore, StorageError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const THIRTY_DAYS: i64 = 86400 * 30;

fn auth_pair(seed: u8) -> KeyPair {
    KeyPair::authenticated(vec![seed; 32]).unwrap()
}

fn encrypted_pair(seed: u8, enc: u8) -> KeyPair {
    KeyPair::new(vec![seed; 32], Some(vec![enc; 32])).unwrap()
}

fn empty_request() -> Request<()> {
    Request::builder().uri("/").body(()).unwrap()
}

fn empty_response() -> Response<()> {
    Response::new(())
}

/// First `Set-Cookie` of a response.
fn set_cookie(response: &Response<()>) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .expect("response has a Set-Cookie")
        .to_str()
        .unwrap()
        .to_string()
}

/// Build the next request the browser would send after `response`.
fn follow_up(response: &Response<()>) -> Request<()> {
    let header = set_cookie(response);
    let pair = header.split(';').next().unwrap().to_string();
    Request::builder()
        .uri("/")
        .header(COOKIE, pair)
        .body(())
        .unwrap()
}

/// Backend wrapper counting reads.
#[derive(Default)]
struct CountingBackend {
    inner: MemoryBackend,
    gets: AtomicUsize,
}

impl SessionBackend for CountingBackend {
    fn put(&self, id: &str, payload: &str) -> sessionstore::Result<()> {
        self.inner.put(id, payload)
    }

    fn get(&self, id: &str) -> sessionstore::Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id)
    }

    fn delete(&self, id: &str) -> sessionstore::Result<()> {
        self.inner.delete(id)
    }
}

/// Backend that times out on every call.
struct TimeoutBackend;

impl SessionBackend for TimeoutBackend {
    fn put(&self, _: &str, _: &str) -> sessionstore::Result<()> {
        Err(StorageError::Timeout.into())
    }

    fn get(&self, _: &str) -> sessionstore::Result<Option<String>> {
        Err(StorageError::Timeout.into())
    }

    fn delete(&self, _: &str) -> sessionstore::Result<()> {
        Err(StorageError::Timeout.into())
    }
}

#[test]
fn first_visit_then_returning_visit() {
    let store = SessionStore::new(MemoryBackend::new(), &[auth_pair(1)]).unwrap();
    assert_eq!(store.options().max_age, THIRTY_DAYS);

    // First request: no cookie
    let request = empty_request();
    let (mut session, err) = store.new_session(&request, "app");
    assert!(err.is_none());
    assert!(session.is_new());
    assert!(session.values().is_empty());

    session.insert("user", "u1").unwrap();
    let mut response = empty_response();
    store.save(&mut response, &mut session).unwrap();

    assert_eq!(session.id().len(), 43);
    assert!(store.backend().get(session.id()).unwrap().is_some());
    let header = set_cookie(&response);
    assert!(header.starts_with("app="));
    assert!(header.contains("Path=/"));
    assert!(header.contains(&format!("Max-Age={THIRTY_DAYS}")));

    // Second request replays the cookie
    let request = follow_up(&response);
    let mut registry = Registry::new(&request);
    let (loaded, err) = store.get(&mut registry, "app");
    assert!(err.is_none());
    assert!(!loaded.is_new());
    assert_eq!(loaded.get::<String>("user").as_deref(), Some("u1"));
}

#[cfg(feature = "redb-backend")]
#[test]
fn redb_sessions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let pair = encrypted_pair(2, 3);

    let response = {
        let store = SessionStore::new(RedbBackend::open(dir.path()).unwrap(), &[pair.clone()]).unwrap();
        let (mut session, _) = store.new_session(&empty_request(), "app");
        session.insert("cart", vec![1, 2, 3]).unwrap();

        let mut response = empty_response();
        store.save(&mut response, &mut session).unwrap();
        response
    };

    let store = SessionStore::new(RedbBackend::open(dir.path()).unwrap(), &[pair]).unwrap();
    let session = store.load(&follow_up(&response), "app").unwrap();
    assert!(!session.is_new());
    assert_eq!(session.get::<Vec<u32>>("cart"), Some(vec![1, 2, 3]));
}

#[test]
fn negative_max_age_deletes_record_and_clears_cookie() {
    let store = SessionStore::new(MemoryBackend::new(), &[auth_pair(1)]).unwrap();
    let (mut session, _) = store.new_session(&empty_request(), "app");
    session.insert("user", "u1").unwrap();
    store.save(&mut empty_response(), &mut session).unwrap();
    let id = session.id().to_string();
    assert!(store.backend().get(&id).unwrap().is_some());

    session.options_mut().max_age = -1;
    let mut response = empty_response();
    store.save(&mut response, &mut session).unwrap();

    assert!(store.backend().get(&id).unwrap().is_none());
    let header = set_cookie(&response);
    assert!(header.starts_with("app=;"));
    assert!(header.contains("Max-Age=0"));
}

#[test]
fn zero_max_age_deletes_record() {
    let store = SessionStore::new(MemoryBackend::new(), &[auth_pair(1)]).unwrap();
    let (mut session, _) = store.new_session(&empty_request(), "app");
    store.save(&mut empty_response(), &mut session).unwrap();
    let id = session.id().to_string();

    session.options_mut().max_age = 0;
    let mut response = empty_response();
    store.save(&mut response, &mut session).unwrap();

    assert!(store.backend().get(&id).unwrap().is_none());
    assert!(set_cookie(&response).starts_with("app=;"));

    // The expired cookie no longer resolves to anything.
    let (fresh, err) = store.new_session(&follow_up(&response), "app");
    assert!(fresh.is_new());
    assert!(err.is_some());
}

#[test]
fn delete_is_idempotent() {
    let store = SessionStore::new(MemoryBackend::new(), &[auth_pair(1)]).unwrap();
    let (mut session, _) = store.new_session(&empty_request(), "app");
    store.save(&mut empty_response(), &mut session).unwrap();

    store.delete(&session).unwrap();
    store.delete(&session).unwrap();
    store.backend().delete("never-stored").unwrap();
    assert!(store.backend().is_empty());
}

#[test]
fn rotated_keys_still_read_old_cookies() {
    let backend = Arc::new(MemoryBackend::new());
    let old = SessionStore::new(Arc::clone(&backend), &[auth_pair(1)]).unwrap();

    let (mut session, _) = old.new_session(&empty_request(), "app");
    session.insert("user", "u1").unwrap();
    let mut response = empty_response();
    old.save(&mut response, &mut session).unwrap();

    // New pair prepended, old pair demoted to second place
    let rotated = SessionStore::new(Arc::clone(&backend), &[auth_pair(9), auth_pair(1)]).unwrap();
    let (mut loaded, err) = rotated.new_session(&follow_up(&response), "app");
    assert!(err.is_none());
    assert_eq!(loaded.get::<String>("user").as_deref(), Some("u1"));

    // Re-saving re-signs with the new pair, which the old store cannot read
    let mut response = empty_response();
    rotated.save(&mut response, &mut loaded).unwrap();
    let (_, err) = old.new_session(&follow_up(&response), "app");
    assert!(matches!(err, Some(Error::Crypto(CryptoError::InvalidMac))));
}

#[test]
fn wrong_encryption_key_fails_to_decrypt() {
    let writer = SessionStore::new(MemoryBackend::new(), &[encrypted_pair(1, 2)]).unwrap();
    let (mut session, _) = writer.new_session(&empty_request(), "app");
    let mut response = empty_response();
    writer.save(&mut response, &mut session).unwrap();

    let reader = SessionStore::new(MemoryBackend::new(), &[encrypted_pair(1, 7)]).unwrap();
    let (fresh, err) = reader.new_session(&follow_up(&response), "app");
    assert!(fresh.is_new());
    assert!(matches!(err, Some(Error::Crypto(CryptoError::Decrypt))));
}

#[test]
fn tampered_cookie_degrades_to_fresh_session() {
    let store = SessionStore::new(MemoryBackend::new(), &[auth_pair(1)]).unwrap();
    let (mut session, _) = store.new_session(&empty_request(), "app");
    session.insert("user", "u1").unwrap();
    let mut response = empty_response();
    store.save(&mut response, &mut session).unwrap();

    let header = set_cookie(&response);
    let value = header.split(';').next().unwrap().trim_start_matches("app=");
    let mut bytes = value.as_bytes().to_vec();
    let mid = bytes.len() / 2;
    bytes[mid] = if bytes[mid] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(bytes).unwrap();

    let request = Request::builder()
        .header(COOKIE, format!("app={tampered}"))
        .body(())
        .unwrap();
    let (fresh, err) = store.new_session(&request, "app");
    assert!(fresh.is_new());
    assert!(fresh.values().is_empty());
    assert!(fresh.id().is_empty());
    assert!(matches!(err, Some(Error::Crypto(_))));
}

#[test]
fn registry_loads_each_name_once() {
    let store = SessionStore::new(CountingBackend::default(), &[auth_pair(1)]).unwrap();
    let (mut session, _) = store.new_session(&empty_request(), "app");
    let mut response = empty_response();
    store.save(&mut response, &mut session).unwrap();

    let request = follow_up(&response);
    let mut registry = Registry::new(&request);
    for _ in 0..3 {
        let (session, err) = store.get(&mut registry, "app");
        assert!(err.is_none());
        assert!(!session.is_new());
    }
    assert_eq!(store.backend().gets.load(Ordering::SeqCst), 1);

    // A separate request gets its own registry
    let mut registry = Registry::new(&request);
    store.get(&mut registry, "app");
    assert_eq!(store.backend().gets.load(Ordering::SeqCst), 2);
}

#[test]
fn storage_failure_writes_no_cookie() {
    let store = SessionStore::new(TimeoutBackend, &[auth_pair(1)]).unwrap();
    let (mut session, _) = store.new_session(&empty_request(), "app");

    let mut response = empty_response();
    let err = store.save(&mut response, &mut session).unwrap_err();
    assert!(err.is_timeout());
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[test]
fn store_from_config() {
    let mut config = Config {
        keys: vec![KeyConfig {
            auth: "00112233445566778899aabbccddeeff".to_string(),
            encryption: Some("00112233445566778899aabbccddeeff".to_string()),
        }],
        ..Config::default()
    };
    config.storage.backend = BackendKind::Memory;
    config.cookie.path = "/app".to_string();
    config.cookie.http_only = true;
    config.cookie.max_age = 3600;

    let store = SessionStore::from_config(&config).unwrap();
    assert_eq!(store.options().max_age, 3600);

    let (mut session, _) = store.new_session(&empty_request(), "app");
    assert_eq!(session.options().path, "/app");
    let mut response = empty_response();
    store.save(&mut response, &mut session).unwrap();

    let header = set_cookie(&response);
    assert!(header.contains("Path=/app"));
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("Max-Age=3600"));
    assert!(!store.load(&follow_up(&response), "app").unwrap().is_new());
}
