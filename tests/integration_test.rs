use account_core::{
    AccessGate, AccountSession, BeginFailure, Completion, CredentialDeriver, Error, MemoryStore,
    Operation, Outcome, Passphrase, Principal, RequestMeta, Role, RollbackCause, Schema, Secret,
    SessionFactory, StoredUser, Tainted, TransactionManager,
};
use http::StatusCode;

fn admin_ctx(method: &str, path: &str, operation: Operation) -> account_core::Ctx {
    AccessGate::default()
        .admit(
            RequestMeta {
                request_id: "req-int".to_string(),
                method: method.to_string(),
                path: path.to_string(),
                principal: Some(Principal::new("admin", [Role::SERVICE_ADMIN])),
            },
            operation,
        )
        .expect("service admin is admitted")
}

fn stored(account_id: u64, name: &str) -> StoredUser {
    StoredUser {
        account_id,
        username: name.to_string(),
        email: None,
        credential: CredentialDeriver
            .derive(&Passphrase::from_string("Smb9324$#@#@$".to_string()), name)
            .unwrap(),
        schema: Schema::AccountManager20,
    }
}

#[test]
fn secret_is_fully_redacted() {
    let passphrase = Secret::new("Smb9324$#@#@$".to_string());

    let debug_out = format!("{:?}", passphrase);
    assert_eq!(debug_out, "[REDACTED]");
    assert!(!debug_out.contains("Smb9324"));
    assert!(!debug_out.contains("String"));

    assert_eq!(format!("{}", passphrase), "[REDACTED]");
}

#[test]
fn tainted_prevents_misuse() {
    let user_input = Tainted::new("'; DROP TABLE users;".to_string());

    let debug_out = format!("{:?}", user_input);
    assert!(debug_out.contains("Tainted"));

    // Uncommenting this would fail to compile:
    // let _s: String = user_input;
}

#[test]
fn derivation_is_deterministic_per_account() {
    let pass = Passphrase::from_string("Smb9324$#@#@$".to_string());

    let first = CredentialDeriver.derive(&pass, "johndoe").unwrap();
    let second = CredentialDeriver.derive(&pass, "johndoe").unwrap();
    let other = CredentialDeriver.derive(&pass, "janedoe").unwrap();

    assert_eq!(first, second);
    assert_ne!(first.bytes(), other.bytes());
    assert!(first.matches(&pass, "johndoe").unwrap());
    assert!(!first
        .matches(&Passphrase::from_string("wrong".to_string()), "johndoe")
        .unwrap());
}

#[test]
fn empty_passphrase_is_invalid_argument() {
    let err = CredentialDeriver
        .derive(&Passphrase::new(Vec::new()), "johndoe")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn successful_unit_of_work_commits() {
    let store = MemoryStore::new();
    let manager = TransactionManager::new(store.clone(), BeginFailure::Proceed);
    let ctx = admin_ctx("POST", "/users", Operation::CreateAccount);

    let mut uow = manager.begin(&ctx).unwrap();
    let session = uow.session().unwrap();
    let id = session.create_account().unwrap();
    session.insert_user(stored(id, "johndoe")).unwrap();

    let completion = manager
        .complete(&mut uow, &Outcome::status(StatusCode::NO_CONTENT), &ctx)
        .unwrap();

    assert_eq!(completion, Completion::Committed);
    assert!(!uow.is_active());
    assert!(store.user(Schema::AccountManager20, "johndoe").is_some());
}

#[test]
fn error_status_rolls_back() {
    let store = MemoryStore::new();
    let manager = TransactionManager::new(store.clone(), BeginFailure::Proceed);
    let ctx = admin_ctx("POST", "/users", Operation::CreateAccount);

    let mut uow = manager.begin(&ctx).unwrap();
    let id = uow.session().unwrap().create_account().unwrap();
    uow.session().unwrap().insert_user(stored(id, "johndoe")).unwrap();

    let completion = manager
        .complete(&mut uow, &Outcome::status(StatusCode::CONFLICT), &ctx)
        .unwrap();

    assert_eq!(
        completion,
        Completion::RolledBack(RollbackCause::ErrorResponse(StatusCode::CONFLICT))
    );
    assert_eq!(store.user_count(Schema::AccountManager20), 0);
}

#[test]
fn rollback_only_beats_success_status() {
    let store = MemoryStore::new();
    let manager = TransactionManager::new(store.clone(), BeginFailure::Proceed);
    let ctx = admin_ctx("POST", "/users", Operation::CreateAccount);

    let mut uow = manager.begin(&ctx).unwrap();
    uow.session().unwrap().create_account().unwrap();
    uow.set_rollback_only();

    let completion = manager
        .complete(&mut uow, &Outcome::status(StatusCode::OK), &ctx)
        .unwrap();

    assert_eq!(completion, Completion::RolledBack(RollbackCause::Marked));
    assert_eq!(store.account_count(), 0);
}

#[test]
fn dropped_unit_of_work_is_rolled_back() {
    let store = MemoryStore::new();
    let manager = TransactionManager::new(store.clone(), BeginFailure::Proceed);
    let ctx = admin_ctx("POST", "/users", Operation::CreateAccount);

    {
        let mut uow = manager.begin(&ctx).unwrap();
        let id = uow.session().unwrap().create_account().unwrap();
        uow.session().unwrap().insert_user(stored(id, "johndoe")).unwrap();
    }

    assert_eq!(store.user_count(Schema::AccountManager20), 0);

    // A later request can still write.
    let mut session = store.create_session().unwrap();
    account_core::Session::begin(&mut session).unwrap();
    assert!(!session.user_exists(Schema::AccountManager20, "johndoe").unwrap());
}

#[test]
fn abort_on_begin_failure_surfaces_server_error() {
    let store = MemoryStore::new();
    store.set_online(false);
    let manager = TransactionManager::new(store, BeginFailure::Abort);
    let ctx = admin_ctx("DELETE", "/users/johndoe", Operation::DeleteAccount);

    let err = manager.begin(&ctx).unwrap_err();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn proceed_on_begin_failure_skips_completion() {
    let store = MemoryStore::new();
    store.set_online(false);
    let manager = TransactionManager::new(store, BeginFailure::Proceed);
    let ctx = admin_ctx("DELETE", "/users/johndoe", Operation::DeleteAccount);

    let mut uow = manager.begin(&ctx).unwrap();
    assert!(!uow.is_active());

    let completion = manager
        .complete(&mut uow, &Outcome::status(StatusCode::OK), &ctx)
        .unwrap();
    assert_eq!(completion, Completion::Skipped);
}
