mod support;

use support::{Call, FakeApi, Op, PASSWORD, network_down};
use taskboard_core::api::ApiError;
use taskboard_core::session::{Session, SessionState};
use taskboard_core::task::Credentials;

fn credentials(password: &str) -> Credentials {
    Credentials::new("ada@example.com", password).expect("valid credentials")
}

#[tokio::test]
async fn starts_loading_and_unauthenticated() {
    let session = Session::new(FakeApi::new());
    assert_eq!(session.state(), SessionState::initial());
    assert!(session.is_loading());
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn probe_with_a_live_cookie_authenticates() {
    let api = FakeApi::new();
    api.set_logged_in(true);
    let session = Session::new(api.clone());

    assert!(session.check_session().await);
    assert_eq!(
        session.state(),
        SessionState {
            authenticated: true,
            loading: false,
        }
    );
    assert_eq!(api.calls(), vec![Call::Whoami]);
}

#[tokio::test]
async fn probe_without_a_session_settles_quietly() {
    let api = FakeApi::new();
    let session = Session::new(api);

    assert!(!session.check_session().await);
    assert!(!session.is_authenticated());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn probe_network_failure_counts_as_logged_out() {
    let api = FakeApi::new();
    api.set_logged_in(true);
    api.fail(Op::Whoami, network_down());
    let session = Session::new(api);

    assert!(!session.check_session().await);
    assert!(!session.is_authenticated());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn login_success_authenticates() {
    let api = FakeApi::new();
    let session = Session::new(api.clone());
    session.check_session().await;

    session
        .login(&credentials(PASSWORD))
        .await
        .expect("login should succeed");

    assert!(session.is_authenticated());
    assert!(!session.is_loading());
    assert_eq!(
        api.calls(),
        vec![Call::Whoami, Call::Login("ada@example.com".to_string())]
    );
}

#[tokio::test]
async fn login_failure_keeps_state_and_surfaces_server_text() {
    let api = FakeApi::new();
    let session = Session::new(api);
    session.check_session().await;

    let err = session
        .login(&credentials("wrong"))
        .await
        .expect_err("login should fail");

    assert_eq!(err.remote_message(), Some("Invalid credentials"));
    assert!(!session.is_authenticated());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn logout_clears_the_session_even_when_the_call_fails() {
    let api = FakeApi::new();
    let session = Session::new(api.clone());
    session
        .login(&credentials(PASSWORD))
        .await
        .expect("login should succeed");

    api.fail(Op::Logout, network_down());
    let result = session.logout().await;

    assert!(matches!(result, Err(ApiError::Network(_))));
    assert!(!session.is_authenticated());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn logout_then_probe_reports_logged_out() {
    let api = FakeApi::new();
    let session = Session::new(api);
    session
        .login(&credentials(PASSWORD))
        .await
        .expect("login should succeed");

    session.logout().await.expect("logout should succeed");
    assert!(!session.check_session().await);
}

#[tokio::test]
async fn register_does_not_log_in() {
    let api = FakeApi::new();
    let session = Session::new(api.clone());
    session.check_session().await;

    session
        .register(&credentials(PASSWORD))
        .await
        .expect("registration should succeed");

    assert!(!session.is_authenticated());
    assert_eq!(
        api.calls().last(),
        Some(&Call::Register("ada@example.com".to_string()))
    );
}

#[tokio::test]
async fn register_failure_carries_the_server_reason() {
    let api = FakeApi::new();
    api.fail(
        Op::Register,
        ApiError::Rejected {
            status: 409,
            message: Some("Email already registered".to_string()),
        },
    );
    let session = Session::new(api);

    let err = session
        .register(&credentials(PASSWORD))
        .await
        .expect_err("registration should fail");
    assert_eq!(err.user_message(), "Email already registered");
}

#[tokio::test]
async fn login_and_logout_hold_loading_while_in_flight() {
    let api = FakeApi::new();
    let session = Session::new(api.clone());
    session.check_session().await;
    assert!(!session.is_loading());

    let gate = api.gate();
    let creds = credentials(PASSWORD);
    let (result, during) = tokio::join!(session.login(&creds), async {
        tokio::task::yield_now().await;
        let during = session.state();
        gate.notify_one();
        during
    });
    result.expect("login should succeed");
    assert_eq!(
        during,
        SessionState {
            authenticated: false,
            loading: true,
        }
    );
    assert!(!session.is_loading());

    let (result, during) = tokio::join!(session.logout(), async {
        tokio::task::yield_now().await;
        let during = session.state();
        gate.notify_one();
        during
    });
    result.expect("logout should succeed");
    assert!(during.loading);
    assert!(during.authenticated);
    assert_eq!(
        session.state(),
        SessionState {
            authenticated: false,
            loading: false,
        }
    );
}
