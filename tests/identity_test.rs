mod common;

use common::{harness, tokens};
use pvz_service::application::transaction::TxContext;
use pvz_service::domain::Role;
use pvz_service::error::ErrorKind;

#[tokio::test]
async fn test_register_and_login_issue_a_verifiable_token() {
    let h = harness();
    let mut ctx = TxContext::new();

    let user_id = h
        .identity
        .register(&mut ctx, "clerk@pvz.example", "hunter2", "employee")
        .await
        .unwrap();
    let token = h
        .identity
        .login(&mut ctx, "clerk@pvz.example", "hunter2")
        .await
        .unwrap();

    let principal = tokens().verify(&token).unwrap();
    assert_eq!(principal.user_id, user_id);
    assert_eq!(principal.role, Role::Employee);
}

#[tokio::test]
async fn test_duplicate_email_is_rejected() {
    let h = harness();
    let mut ctx = TxContext::new();

    h.identity
        .register(&mut ctx, "boss@pvz.example", "pw", "moderator")
        .await
        .unwrap();
    let err = h
        .identity
        .register(&mut ctx, "boss@pvz.example", "other", "employee")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    // The original credentials still work.
    h.identity
        .login(&mut ctx, "boss@pvz.example", "pw")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_login_failures() {
    let h = harness();
    let mut ctx = TxContext::new();
    h.identity
        .register(&mut ctx, "clerk@pvz.example", "right", "employee")
        .await
        .unwrap();

    let err = h
        .identity
        .login(&mut ctx, "nobody@pvz.example", "right")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UserNotFound);

    let err = h
        .identity
        .login(&mut ctx, "clerk@pvz.example", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
}

#[tokio::test]
async fn test_dummy_login_issues_fresh_identities() {
    let h = harness();
    let mut ctx = TxContext::new();

    let first = h.identity.dummy_login(&mut ctx, "moderator").await.unwrap();
    let second = h.identity.dummy_login(&mut ctx, "moderator").await.unwrap();

    let first = tokens().verify(&first).unwrap();
    let second = tokens().verify(&second).unwrap();
    assert_eq!(first.role, Role::Moderator);
    assert_ne!(first.user_id, second.user_id);

    let err = h
        .identity
        .dummy_login(&mut ctx, "Moderator")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRole);
}
