//! End-to-end device scenarios against the lifecycle manager.

use std::time::Duration;

use integration_tests::fixtures::{
    desktop_env, phone_env, tablet_env, STAFF_ACCOUNT, STAFF_PASSWORD,
};
use integration_tests::setup::TestContext;
use lifecycle::ClientState;
use registry::{ChangeKind, QueryChange};
use session_core::{AccountId, DeviceType, UNKNOWN};

const PROPAGATION: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_second_device_login_demotes_the_first() {
    let ctx = TestContext::new();

    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let first = ctx.record_of(&laptop).await.unwrap();
    assert!(first.is_current);
    assert_eq!(first.device_type, DeviceType::Desktop);
    assert_eq!(first.location.city, "Accra");
    assert_eq!(first.network_address, "203.0.113.10");
    assert_eq!(first.session_id, laptop.current_session_id());

    let phone = ctx.sign_in_staff(phone_env()).await.unwrap();

    let list = ctx
        .manager
        .list_sessions(&AccountId::from(STAFF_ACCOUNT))
        .await
        .unwrap();
    assert_eq!(list.len(), 2);

    let current = list.current.unwrap();
    assert_eq!(&current.id, phone.record_id());
    assert_eq!(current.device_type, DeviceType::Mobile);
    assert_eq!(current.browser.name, "Safari");

    assert_eq!(list.others.len(), 1);
    assert_eq!(&list.others[0].id, laptop.record_id());
    assert!(!list.others[0].is_current);

    // Demotion is not a termination.
    assert!(laptop.is_signed_in());
}

#[tokio::test]
async fn test_terminate_others_signs_open_devices_out() {
    let ctx = TestContext::new();
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let tablet = ctx.sign_in_staff(tablet_env()).await.unwrap();
    let phone = ctx.sign_in_staff(phone_env()).await.unwrap();

    let mut laptop_state = laptop.watch_state();

    let report = ctx
        .manager
        .terminate_all_others(&phone, STAFF_PASSWORD)
        .await
        .unwrap();
    assert_eq!(report.terminated.len(), 2);

    tokio::time::timeout(PROPAGATION, laptop_state.wait_for(|s| *s == ClientState::SignedOut))
        .await
        .expect("laptop still signed in")
        .unwrap();
    tokio::time::timeout(PROPAGATION, tablet.signed_out())
        .await
        .expect("tablet still signed in");

    assert_eq!(ctx.auth.sign_out_count(), 2);
    assert!(ctx.record_of(&phone).await.unwrap().is_current);
    assert!(phone.is_signed_in());
}

#[tokio::test]
async fn test_stale_self_terminate_is_idempotent() {
    let ctx = TestContext::new();
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let phone = ctx.sign_in_staff(phone_env()).await.unwrap();

    // The phone's bulk termination is queued first, so the laptop's own
    // delete finds its record already gone.
    let (report, stale) = tokio::join!(
        ctx.manager.terminate_all_others(&phone, STAFF_PASSWORD),
        ctx.manager
            .terminate(&laptop, laptop.record_id(), STAFF_PASSWORD),
    );

    assert_eq!(report.unwrap().terminated, vec![laptop.record_id().clone()]);
    let stale = stale.expect("stale self-terminate must not error");
    assert!(!stale.removed);
    assert!(stale.signed_out);

    assert_eq!(laptop.state(), ClientState::SignedOut);
    assert_eq!(ctx.auth.sign_out_count(), 1, "sign-out runs once per client");
}

#[tokio::test]
async fn test_geolocation_failure_falls_back_to_unknown() {
    let ctx = TestContext::with_failing_geo();

    let tablet = ctx.sign_in_staff(tablet_env()).await.unwrap();
    let record = ctx.record_of(&tablet).await.unwrap();

    assert!(ctx.geo.call_count() >= 1);
    assert!(record.is_current);
    assert!(record.location.is_unknown());
    assert_eq!(record.location.city, UNKNOWN);
    assert_eq!(record.location.country, UNKNOWN);
    assert_eq!(record.location.latitude, 0.0);
    assert_eq!(record.location.longitude, 0.0);
    assert_eq!(record.network_address, UNKNOWN);
    assert_eq!(record.screen_resolution, UNKNOWN);
    assert_eq!(record.device_type, DeviceType::Tablet);

    // The observed client address still lands on the record.
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let record = ctx.record_of(&laptop).await.unwrap();
    assert_eq!(record.network_address, "203.0.113.10");
    assert!(record.location.is_unknown());
}

#[tokio::test]
async fn test_logout_removes_own_record_and_notifies_watchers() {
    let ctx = TestContext::new();
    let account = AccountId::from(STAFF_ACCOUNT);
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let phone = ctx.sign_in_staff(phone_env()).await.unwrap();

    let mut feed = ctx.manager.watch_sessions(&account).await.unwrap();

    ctx.manager.logout(&phone).await.unwrap();
    assert_eq!(phone.state(), ClientState::SignedOut);
    assert!(!ctx.auth.is_signed_in(phone.token()));

    let change = tokio::time::timeout(PROPAGATION, feed.next())
        .await
        .expect("no change event")
        .expect("feed closed");
    match change {
        QueryChange::Event(event) => {
            assert_eq!(event.kind, ChangeKind::Deleted);
            assert_eq!(&event.record_id, phone.record_id());
        }
        QueryChange::Resync => panic!("unexpected resync"),
    }

    let list = ctx.manager.list_sessions(&account).await.unwrap();
    assert_eq!(list.len(), 1);
    assert!(laptop.is_signed_in());
}

#[tokio::test]
async fn test_registry_outage_fails_sign_in_and_closes_auth_session() {
    let ctx = TestContext::new();
    ctx.registry.set_fail_writes(true);

    let err = ctx.sign_in_staff(desktop_env()).await.unwrap_err();
    assert_eq!(err.error_code(), Some("REG_001"));
    assert_eq!(err.http_status(), 503);
    assert_eq!(ctx.auth.sign_out_count(), 1);
    assert!(ctx.registry.is_empty());

    ctx.registry.set_fail_writes(false);
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    assert!(ctx.record_of(&laptop).await.unwrap().is_current);
}

#[tokio::test]
async fn test_logout_returns_registry_failure_after_signing_out() {
    let ctx = TestContext::new();
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();

    ctx.registry.set_fail_writes(true);
    let err = ctx.manager.logout(&laptop).await.unwrap_err();
    assert_eq!(err.error_code(), Some("REG_001"));

    // The auth session is closed even though the record stayed behind.
    assert_eq!(laptop.state(), ClientState::SignedOut);
    assert!(!ctx.auth.is_signed_in(laptop.token()));
    assert!(ctx.record_of(&laptop).await.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_own_sign_out_failure_reaches_the_caller() {
    let ctx = TestContext::new();
    ctx.auth.set_sign_out_delay(Duration::from_millis(20));
    ctx.auth.set_fail_sign_out(true);

    const ROUNDS: usize = 10;
    for _ in 0..ROUNDS {
        let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
        assert!(
            ctx.manager.logout(&laptop).await.is_err(),
            "sign-out failure hidden from logout"
        );
        assert_eq!(laptop.state(), ClientState::SignedOut);
        assert!(ctx.record_of(&laptop).await.is_none());
    }
    for _ in 0..ROUNDS {
        let tablet = ctx.sign_in_staff(tablet_env()).await.unwrap();
        assert!(
            ctx.manager
                .terminate(&tablet, tablet.record_id(), STAFF_PASSWORD)
                .await
                .is_err(),
            "sign-out failure hidden from self-terminate"
        );
        assert_eq!(tablet.state(), ClientState::SignedOut);
    }

    // One sign-out per client, always from the caller's own path.
    assert_eq!(ctx.auth.sign_out_count(), 2 * ROUNDS);
}

#[tokio::test]
async fn test_failed_self_terminate_keeps_remote_termination_working() {
    let ctx = TestContext::new();
    let laptop = ctx.sign_in_staff(desktop_env()).await.unwrap();
    let phone = ctx.sign_in_staff(phone_env()).await.unwrap();

    ctx.registry.set_fail_writes(true);
    let err = ctx
        .manager
        .terminate(&laptop, laptop.record_id(), STAFF_PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("REG_001"));
    assert!(laptop.is_signed_in());
    assert_eq!(ctx.auth.sign_out_count(), 0);

    ctx.registry.set_fail_writes(false);
    ctx.manager
        .terminate(&phone, laptop.record_id(), STAFF_PASSWORD)
        .await
        .unwrap();

    tokio::time::timeout(PROPAGATION, laptop.signed_out())
        .await
        .expect("laptop still signed in");
    assert_eq!(ctx.auth.sign_out_count(), 1);
}
