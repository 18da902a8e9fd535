//! Integration tests for `AuthService`: account lifecycle, character
//! rules, ticket expiry, concurrency, and the account-deletion unit of work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gatehouse::prelude::*;
use gatehouse::{BAD_CREDENTIALS, INVALID_TICKET, PasswordError};

// =========================================================================
// Test doubles
// =========================================================================

/// Reversible stand-in so tests don't pay for Argon2.
struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        digest == format!("plain:{password}")
    }
}

/// [`PlainHasher`] that counts how often it is asked to verify.
#[derive(Default)]
struct CountingHasher {
    verifies: Arc<AtomicUsize>,
}

impl PasswordHasher for CountingHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        PlainHasher.hash(password)
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        PlainHasher.verify(password, digest)
    }
}

type Entry = (LogLevel, String, Vec<(&'static str, String)>);

/// Keeps every entry so tests can assert on operator-facing reports.
#[derive(Default)]
struct RecordingLog {
    entries: Mutex<Vec<Entry>>,
}

impl RecordingLog {
    fn errors(&self) -> Vec<Entry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, _, _)| *level == LogLevel::Error)
            .cloned()
            .collect()
    }
}

impl EventLog for RecordingLog {
    fn log(&self, level: LogLevel, message: &str, context: &[(&'static str, String)]) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string(), context.to_vec()));
    }
}

// =========================================================================
// Helpers
// =========================================================================

type TestService =
    AuthService<MemoryStore, MemorySessionStore, PlainHasher, Arc<RecordingLog>>;

fn service_with(sessions: MemorySessionStore) -> (TestService, Arc<RecordingLog>) {
    let log = Arc::new(RecordingLog::default());
    let service = AuthService::new(MemoryStore::new(), sessions)
        .with_hasher(PlainHasher)
        .with_log(Arc::clone(&log));
    (service, log)
}

fn service() -> TestService {
    service_with(MemorySessionStore::default()).0
}

fn user(name: &str) -> Username {
    Username::new(name)
}

fn pw(raw: &str) -> Password {
    Password::new(raw)
}

fn name(raw: &str) -> CharacterName {
    CharacterName::new(raw)
}

async fn register(svc: &TestService, username: &str, password: &str) -> Ticket {
    svc.register(&user(username), &pw(password))
        .await
        .expect("registration should succeed")
}

// =========================================================================
// Walkthrough: the canonical six-step session
// =========================================================================

#[tokio::test]
async fn test_walkthrough_register_login_create_verify_delete() {
    let svc = service();

    // 1. Register.
    let t1 = register(&svc, "alice", "pw1").await;

    // 2. Login gives a second, distinct ticket; both stay valid.
    let t2 = svc.login(&user("alice"), &pw("pw1")).await.unwrap();
    assert_ne!(t1, t2);
    assert!(svc.list_characters(&t1).await.is_ok());
    assert!(svc.list_characters(&t2).await.is_ok());

    // 3. First character gets id 1, origin, full health.
    let al = svc.create_character(&t2, &name("Al")).await.unwrap();
    assert_eq!(al.player_id, PlayerId(1));
    assert_eq!(al.name.as_str(), "Al");
    assert_eq!((al.pos_x, al.pos_y), (0.0, 0.0));
    assert_eq!((al.hp, al.max_hp), (100, 100));

    // 4. Same name from another account conflicts.
    let bob = register(&svc, "bob", "pw2").await;
    let err = svc.create_character(&bob, &name("Al")).await.unwrap_err();
    assert!(matches!(err, AuthError::Conflict(_)));

    // 5. Owner verifies; the other account is not authorized.
    assert_eq!(svc.verify_session(&t2, PlayerId(1)).await.unwrap(), al);
    let err = svc.verify_session(&bob, PlayerId(1)).await.unwrap_err();
    assert!(matches!(err, AuthError::Authorization(_)));

    // 6. Delete removes one character; the ticket is dead afterwards.
    let deletion = svc.delete_account(&t2, &pw("pw1")).await.unwrap();
    assert_eq!(deletion.deleted_character_count, 1);
    let err = svc.verify_session(&t2, PlayerId(1)).await.unwrap_err();
    assert_eq!(err, AuthError::Authentication(INVALID_TICKET));
}

// =========================================================================
// Register / Login
// =========================================================================

#[tokio::test]
async fn test_register_duplicate_username_conflicts() {
    let svc = service();
    register(&svc, "alice", "pw1").await;

    let err = svc.register(&user("alice"), &pw("other")).await.unwrap_err();
    assert_eq!(err, AuthError::Conflict("username already exists".into()));
}

#[tokio::test]
async fn test_register_invalid_input_rejected() {
    let svc = service();

    let err = svc.register(&user(""), &pw("pw")).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    let err = svc.register(&user("alice"), &pw("")).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    assert_eq!(svc.store().account_count().await, 0);
}

#[tokio::test]
async fn test_register_does_not_create_character() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;

    assert!(svc.list_characters(&ticket).await.unwrap().is_empty());
    let err = svc.verify_primary(&ticket).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_user_look_identical() {
    let svc = service();
    register(&svc, "alice", "pw1").await;

    let wrong = svc.login(&user("alice"), &pw("nope")).await.unwrap_err();
    let unknown = svc.login(&user("mallory"), &pw("pw1")).await.unwrap_err();

    assert_eq!(wrong, unknown);
    assert_eq!(wrong.to_string(), BAD_CREDENTIALS);
    assert_eq!(wrong.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn test_login_unknown_user_still_verifies_a_password() {
    let hasher = CountingHasher::default();
    let counter = Arc::clone(&hasher.verifies);
    let svc = AuthService::new(MemoryStore::new(), MemorySessionStore::default())
        .with_hasher(hasher);
    let verifies = || counter.load(Ordering::SeqCst);
    svc.register(&user("alice"), &pw("pw1")).await.unwrap();

    svc.login(&user("alice"), &pw("nope")).await.unwrap_err();
    assert_eq!(verifies(), 1);

    let err = svc.login(&user("mallory"), &pw("pw1")).await.unwrap_err();
    assert_eq!(err, AuthError::Authentication(BAD_CREDENTIALS));
    assert_eq!(verifies(), 2, "unknown username costs one verification");

    // A password equal to the decoy input still can't log anyone in.
    let err = svc
        .login(&user("mallory"), &pw("gatehouse-decoy-password"))
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::Authentication(BAD_CREDENTIALS));
}

#[tokio::test]
async fn test_login_oversized_password_is_bad_credentials() {
    let svc = service();
    register(&svc, "alice", "pw1").await;

    let huge = "x".repeat(10_000);
    let err = svc.login(&user("alice"), &pw(&huge)).await.unwrap_err();
    assert_eq!(err, AuthError::Authentication(BAD_CREDENTIALS));
}

#[tokio::test]
async fn test_password_digest_is_not_plaintext() {
    let svc = service();
    register(&svc, "alice", "pw1").await;

    let account = svc.store().find_by_username(&user("alice")).await.unwrap().unwrap();
    assert_ne!(account.password_digest, "pw1");
}

// =========================================================================
// Verify
// =========================================================================

#[tokio::test]
async fn test_verify_session_unknown_ticket_fails_authentication() {
    let svc = service();
    let err = svc
        .verify_session(&Ticket::new("deadbeef"), PlayerId(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn test_verify_session_bad_player_id_is_validation() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;

    let err = svc.verify_session(&ticket, PlayerId(0)).await.unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn test_verify_session_missing_character_is_not_found() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;

    let err = svc.verify_session(&ticket, PlayerId(42)).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
}

#[tokio::test]
async fn test_verify_session_bad_ticket_checked_before_player_id() {
    let svc = service();
    let err = svc
        .verify_session(&Ticket::new("nope"), PlayerId(-1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[tokio::test]
async fn test_verify_primary_returns_oldest_character() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;
    let first = svc.create_character(&ticket, &name("First")).await.unwrap();
    svc.create_character(&ticket, &name("Second")).await.unwrap();

    assert_eq!(svc.verify_primary(&ticket).await.unwrap(), first);
}

// =========================================================================
// Characters
// =========================================================================

#[tokio::test]
async fn test_list_characters_in_creation_order() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;
    for n in ["Zed", "Amy", "Kit"] {
        svc.create_character(&ticket, &name(n)).await.unwrap();
    }

    let names: Vec<String> = svc
        .list_characters(&ticket)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name.as_str().to_string())
        .collect();
    assert_eq!(names, ["Zed", "Amy", "Kit"]);
}

#[tokio::test]
async fn test_list_characters_only_own() {
    let svc = service();
    let alice = register(&svc, "alice", "pw1").await;
    let bob = register(&svc, "bob", "pw2").await;
    svc.create_character(&alice, &name("Al")).await.unwrap();

    assert!(svc.list_characters(&bob).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_character_fourth_hits_limit() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;
    for n in ["One", "Two", "Three"] {
        svc.create_character(&ticket, &name(n)).await.unwrap();
    }

    let err = svc.create_character(&ticket, &name("Four")).await.unwrap_err();
    assert_eq!(err, AuthError::LimitExceeded(3));
    assert_eq!(err.kind().status_code(), 422);
}

#[tokio::test]
async fn test_create_character_limit_follows_config() {
    let svc = service().with_config(AuthConfig {
        max_characters: 1,
        ..AuthConfig::default()
    });
    let ticket = register(&svc, "alice", "pw1").await;
    svc.create_character(&ticket, &name("Solo")).await.unwrap();

    let err = svc.create_character(&ticket, &name("Duo")).await.unwrap_err();
    assert_eq!(err, AuthError::LimitExceeded(1));
}

#[tokio::test]
async fn test_create_character_taken_name_reported_before_limit() {
    let svc = service();
    let alice = register(&svc, "alice", "pw1").await;
    let bob = register(&svc, "bob", "pw2").await;
    svc.create_character(&bob, &name("Taken")).await.unwrap();
    for n in ["One", "Two", "Three"] {
        svc.create_character(&alice, &name(n)).await.unwrap();
    }

    let err = svc.create_character(&alice, &name("Taken")).await.unwrap_err();
    assert!(matches!(err, AuthError::Conflict(_)));
}

#[tokio::test]
async fn test_create_character_invalid_name_rejected() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;

    for bad in ["A", "", "has space", "ThisNameIsWayTooLong1"] {
        let err = svc.create_character(&ticket, &name(bad)).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)), "{bad:?} should be rejected");
    }
}

#[tokio::test]
async fn test_create_character_bad_ticket_fails_authentication() {
    let svc = service();
    let err = svc
        .create_character(&Ticket::new("nope"), &name("Al"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

// =========================================================================
// Logout
// =========================================================================

#[tokio::test]
async fn test_logout_revokes_only_that_ticket() {
    let svc = service();
    let t1 = register(&svc, "alice", "pw1").await;
    let t2 = svc.login(&user("alice"), &pw("pw1")).await.unwrap();

    svc.logout(&t1).await.unwrap();

    assert_eq!(
        svc.list_characters(&t1).await.unwrap_err(),
        AuthError::Authentication(INVALID_TICKET)
    );
    assert!(svc.list_characters(&t2).await.is_ok());
}

#[tokio::test]
async fn test_logout_twice_is_not_found() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;
    svc.logout(&ticket).await.unwrap();

    let err = svc.logout(&ticket).await.unwrap_err();
    assert_eq!(
        err,
        AuthError::NotFound("session not found or already logged out".into())
    );
}

#[tokio::test]
async fn test_logout_unknown_ticket_is_not_found() {
    let svc = service();
    let err = svc.logout(&Ticket::new("never-issued")).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
}

// =========================================================================
// Ticket expiry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticket_expires_after_default_ttl() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;

    tokio::time::advance(Duration::from_secs(3599)).await;
    assert!(svc.list_characters(&ticket).await.is_ok());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(
        svc.list_characters(&ticket).await.unwrap_err(),
        AuthError::Authentication(INVALID_TICKET)
    );
}

#[tokio::test(start_paused = true)]
async fn test_ticket_expiry_is_not_extended_by_use() {
    let sessions = MemorySessionStore::new(SessionConfig {
        ttl: Duration::from_secs(10),
        ..SessionConfig::default()
    });
    let (svc, _) = service_with(sessions);
    let ticket = register(&svc, "alice", "pw1").await;

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(svc.list_characters(&ticket).await.is_ok());
    }

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(svc.list_characters(&ticket).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_expired_ticket_logout_is_not_found() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;

    tokio::time::advance(Duration::from_secs(3600)).await;

    let err = svc.logout(&ticket).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
}

// =========================================================================
// DeleteAccount
// =========================================================================

#[tokio::test]
async fn test_delete_account_removes_everything() {
    let svc = service();
    let t1 = register(&svc, "alice", "pw1").await;
    let t2 = svc.login(&user("alice"), &pw("pw1")).await.unwrap();
    svc.create_character(&t1, &name("One")).await.unwrap();
    svc.create_character(&t1, &name("Two")).await.unwrap();

    let deletion = svc.delete_account(&t1, &pw("pw1")).await.unwrap();
    assert_eq!(deletion.deleted_character_count, 2);

    assert_eq!(svc.store().account_count().await, 0);
    assert_eq!(svc.store().character_count().await, 0);

    // Every ticket of the account is dead, not just the presented one.
    for ticket in [&t1, &t2] {
        assert_eq!(
            svc.list_characters(ticket).await.unwrap_err(),
            AuthError::Authentication(INVALID_TICKET)
        );
    }

    let err = svc.login(&user("alice"), &pw("pw1")).await.unwrap_err();
    assert_eq!(err, AuthError::Authentication(BAD_CREDENTIALS));
}

#[tokio::test]
async fn test_delete_account_frees_username_and_names() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;
    svc.create_character(&ticket, &name("Al")).await.unwrap();
    svc.delete_account(&ticket, &pw("pw1")).await.unwrap();

    let again = register(&svc, "alice", "new").await;
    assert!(svc.create_character(&again, &name("Al")).await.is_ok());
}

#[tokio::test]
async fn test_delete_account_wrong_password_keeps_account() {
    let svc = service();
    let ticket = register(&svc, "alice", "pw1").await;
    svc.create_character(&ticket, &name("Al")).await.unwrap();

    let err = svc.delete_account(&ticket, &pw("wrong")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);

    assert_eq!(svc.list_characters(&ticket).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_account_leaves_other_accounts_alone() {
    let svc = service();
    let alice = register(&svc, "alice", "pw1").await;
    let bob = register(&svc, "bob", "pw2").await;
    svc.create_character(&alice, &name("Al")).await.unwrap();
    svc.create_character(&bob, &name("Bo")).await.unwrap();

    svc.delete_account(&alice, &pw("pw1")).await.unwrap();

    assert_eq!(svc.list_characters(&bob).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_account_failure_rolls_back_and_logs() {
    let (svc, log) = service_with(MemorySessionStore::default());
    let ticket = register(&svc, "alice", "pw1").await;
    svc.create_character(&ticket, &name("One")).await.unwrap();
    svc.create_character(&ticket, &name("Two")).await.unwrap();

    svc.store().fail_next_account_removal().await;
    let err = svc.delete_account(&ticket, &pw("pw1")).await.unwrap_err();

    assert_eq!(err, AuthError::Internal);
    assert_eq!(err.to_string(), "internal error");

    // Nothing was removed and the session survived.
    assert_eq!(svc.list_characters(&ticket).await.unwrap().len(), 2);
    assert!(svc.login(&user("alice"), &pw("pw1")).await.is_ok());

    let errors = log.errors();
    assert_eq!(errors.len(), 1);
    let (_, _, context) = &errors[0];
    assert!(context.contains(&("op", "delete_account".to_string())));
    assert!(context.iter().any(|(k, _)| *k == "account_id"));
    assert!(context.iter().any(|(k, v)| *k == "error" && v.contains("injected")));

    // The failure was one-shot: a retry succeeds.
    let deletion = svc.delete_account(&ticket, &pw("pw1")).await.unwrap();
    assert_eq!(deletion.deleted_character_count, 2);
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_same_username_one_wins() {
    let svc = Arc::new(service());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.register(&user("alice"), &pw("pw")).await })
        })
        .collect();

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AuthError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!((ok, conflicts), (1, 7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_character_never_exceeds_cap() {
    let svc = Arc::new(service());
    let ticket = register(&svc, "alice", "pw1").await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let svc = Arc::clone(&svc);
            let ticket = ticket.clone();
            tokio::spawn(async move {
                svc.create_character(&ticket, &name(&format!("Hero{i}"))).await
            })
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AuthError::LimitExceeded(3)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(svc.list_characters(&ticket).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_name_across_accounts_one_wins() {
    let svc = Arc::new(service());
    let mut tickets = Vec::new();
    for i in 0..6 {
        tickets.push(register(&svc, &format!("user{i}"), "pw").await);
    }

    let handles: Vec<_> = tickets
        .into_iter()
        .map(|ticket| {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.create_character(&ticket, &name("Highlander")).await })
        })
        .collect();

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(AuthError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!((ok, conflicts), (1, 5));
}

// =========================================================================
// SQLite-backed service
// =========================================================================

#[tokio::test]
async fn test_sqlite_backed_walkthrough() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("gatehouse.db")).await.unwrap();
    let svc = AuthService::new(store, MemorySessionStore::default()).with_hasher(PlainHasher);

    let ticket = svc.register(&user("alice"), &pw("pw1")).await.unwrap();
    let al = svc.create_character(&ticket, &name("Al")).await.unwrap();
    assert_eq!(svc.verify_session(&ticket, al.player_id).await.unwrap(), al);

    let dup = svc.register(&user("alice"), &pw("pw1")).await.unwrap_err();
    assert!(matches!(dup, AuthError::Conflict(_)));

    let deletion = svc.delete_account(&ticket, &pw("pw1")).await.unwrap();
    assert_eq!(deletion.deleted_character_count, 1);
    assert!(svc.login(&user("alice"), &pw("pw1")).await.is_err());
}

#[tokio::test]
async fn test_argon2_hasher_round_trip_through_service() {
    let svc = AuthService::new(MemoryStore::new(), MemorySessionStore::default());

    svc.register(&user("alice"), &pw("correct horse")).await.unwrap();
    assert!(svc.login(&user("alice"), &pw("correct horse")).await.is_ok());
    assert!(svc.login(&user("alice"), &pw("battery staple")).await.is_err());
}
