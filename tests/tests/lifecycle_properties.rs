//! Lifecycle guarantees exercised through the real manager.

use std::time::Duration;

use integration_tests::fixtures::{
    desktop_env, phone_env, tablet_env, REGISTRAR_IDENTITY, REGISTRAR_PASSWORD, STAFF_ACCOUNT,
    STAFF_PASSWORD,
};
use integration_tests::setup::TestContext;
use lifecycle::ClientState;
use session_core::{AccountId, RecordId, SessionFilter};

const PROPAGATION: Duration = Duration::from_secs(2);

fn staff() -> AccountId {
    AccountId::from(STAFF_ACCOUNT)
}

#[tokio::test]
async fn test_newest_login_is_the_only_current_session() {
    let ctx = TestContext::new();
    let envs = [desktop_env(), phone_env(), tablet_env(), desktop_env()];

    let mut clients = Vec::new();
    for env in envs {
        clients.push(ctx.sign_in_staff(env).await.unwrap());

        let current = ctx
            .manager
            .registry()
            .query(&SessionFilter::account(staff()).current(true))
            .await
            .unwrap();
        assert_eq!(current.len(), 1, "exactly one current session after each login");
        assert_eq!(&current[0].id, clients.last().unwrap().record_id());
    }

    let list = ctx.manager.list_sessions(&staff()).await.unwrap();
    assert_eq!(list.len(), 4);
    assert_eq!(
        list.current.as_ref().map(|s| &s.id),
        Some(clients[3].record_id())
    );
    assert!(list.others.iter().all(|s| !s.is_current && s.is_active));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_never_moves_last_active_backwards() {
    let ctx = TestContext::new();
    let client = ctx.sign_in_staff(desktop_env()).await.unwrap();

    let mut previous = ctx.record_of(&client).await.unwrap().last_active;
    let updates_before = ctx.registry.update_count();

    for round in 1..=3 {
        tokio::time::sleep(Duration::from_secs(301)).await;

        assert!(
            ctx.registry.update_count() >= updates_before + round,
            "heartbeat {round} did not write"
        );
        let last_active = ctx.record_of(&client).await.unwrap().last_active;
        assert!(last_active >= previous);
        previous = last_active;
    }

    assert!(client.is_signed_in());
}

#[tokio::test]
async fn test_remote_termination_signs_the_target_out() {
    let ctx = TestContext::new();
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let phone = ctx.sign_in_staff(phone_env()).await.unwrap();

    let outcome = ctx
        .manager
        .terminate(&phone, laptop.record_id(), STAFF_PASSWORD)
        .await
        .unwrap();
    assert!(outcome.removed);
    assert!(!outcome.signed_out);

    tokio::time::timeout(PROPAGATION, laptop.signed_out())
        .await
        .expect("laptop was not signed out");
    assert_eq!(laptop.state(), ClientState::SignedOut);
    assert!(!ctx.auth.is_signed_in(laptop.token()));

    assert!(phone.is_signed_in());
    assert!(ctx.auth.is_signed_in(phone.token()));
}

#[tokio::test]
async fn test_failed_reauthentication_never_mutates() {
    let ctx = TestContext::new();
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let phone = ctx.sign_in_staff(phone_env()).await.unwrap();
    let mutations = ctx.registry.mutation_count();

    for attempt in 0..5 {
        let err = ctx
            .manager
            .terminate(&phone, laptop.record_id(), &format!("wrong-{attempt}"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), Some("AUTH_002"));

        let err = ctx
            .manager
            .terminate_all_others(&phone, "also-wrong")
            .await
            .unwrap_err();
        assert!(err.is_reauthentication_failure());
    }

    assert_eq!(ctx.auth.reauth_attempts(), 10);
    assert_eq!(ctx.registry.mutation_count(), mutations);
    assert!(ctx.record_of(&laptop).await.is_some());
    assert!(laptop.is_signed_in());
}

#[tokio::test]
async fn test_terminate_all_others_keeps_the_caller() {
    let ctx = TestContext::new();
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let tablet = ctx.sign_in_staff(tablet_env()).await.unwrap();
    let phone = ctx.sign_in_staff(phone_env()).await.unwrap();

    let report = ctx
        .manager
        .terminate_all_others(&laptop, STAFF_PASSWORD)
        .await
        .unwrap();

    assert_eq!(report.terminated.len(), 2);
    assert!(!report.terminated.contains(laptop.record_id()));
    assert!(report.terminated.contains(tablet.record_id()));
    assert!(report.terminated.contains(phone.record_id()));
    assert_eq!(report.already_gone, 0);

    for other in [&tablet, &phone] {
        tokio::time::timeout(PROPAGATION, other.signed_out())
            .await
            .expect("other device was not signed out");
    }

    // The caller survives even though its record is no longer current.
    let own = ctx.record_of(&laptop).await.unwrap();
    assert!(!own.is_current);
    assert!(laptop.is_signed_in());

    // Termination never promotes: the survivor is listed, but not as current.
    let list = ctx.manager.list_sessions(&staff()).await.unwrap();
    assert_eq!(list.len(), 1);
    assert!(list.current.is_none());
    assert_eq!(&list.others[0].id, laptop.record_id());
}

#[tokio::test]
async fn test_racing_terminations_of_one_record_both_succeed() {
    let ctx = TestContext::new();
    let target = ctx.sign_in_staff(tablet_env()).await.unwrap();
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let phone = ctx.sign_in_staff(phone_env()).await.unwrap();

    let (a, b) = tokio::join!(
        ctx.manager
            .terminate(&laptop, target.record_id(), STAFF_PASSWORD),
        ctx.manager
            .terminate(&phone, target.record_id(), STAFF_PASSWORD),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.removed ^ b.removed, "exactly one delete removes the record");

    let again = ctx
        .manager
        .terminate(&laptop, target.record_id(), STAFF_PASSWORD)
        .await
        .unwrap();
    assert!(!again.removed);

    tokio::time::timeout(PROPAGATION, target.signed_out())
        .await
        .expect("target was not signed out");
}

#[tokio::test]
async fn test_cannot_terminate_another_accounts_session() {
    let ctx = TestContext::new();
    let staff_laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let registrar = ctx
        .manager
        .sign_in(REGISTRAR_IDENTITY, REGISTRAR_PASSWORD, phone_env())
        .await
        .unwrap();

    let err = ctx
        .manager
        .terminate(&registrar, staff_laptop.record_id(), REGISTRAR_PASSWORD)
        .await
        .unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(err.http_status(), 403);

    assert!(ctx.record_of(&staff_laptop).await.is_some());
    assert!(staff_laptop.is_signed_in());
}

#[tokio::test]
async fn test_unknown_record_terminates_as_already_gone() {
    let ctx = TestContext::new();
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();

    let outcome = ctx
        .manager
        .terminate(&laptop, &RecordId::generate(), STAFF_PASSWORD)
        .await
        .unwrap();
    assert!(!outcome.removed);
    assert!(!outcome.signed_out);
    assert!(laptop.is_signed_in());
}
