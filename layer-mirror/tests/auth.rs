mod common;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use common::{FailingFactory, RecordingFactory, assert_quiet, next_sent, start};
use layer_mirror::{
    AuthRequest, AuthorizationState as State, Backoff, Config, NoRetries, Outcome, Parameters, RequestError,
    Session, SessionError, StdinPrompt, Update,
};

fn auth(state: State) -> Update {
    Update::AuthorizationState(state)
}

// ── Requests per state ────────────────────────────────────────────────────────

#[tokio::test]
async fn wait_parameters_sends_configured_parameters() {
    let config = Config {
        parameters: Parameters { api_id: 42, api_hash: "abc".into(), ..Default::default() },
        ..Default::default()
    };
    let (session, _, _, mut rx) = start(config, &[]);

    session.dispatch(auth(State::WaitParameters)).unwrap();
    let sent = next_sent(&mut rx).await;
    match sent.request {
        AuthRequest::SetParameters(p) => {
            assert_eq!(p.api_id, 42);
            assert_eq!(p.api_hash, "abc");
            assert_eq!(p.database_directory, "tdlib");
            assert!(p.use_message_database);
        }
        other => panic!("expected SetParameters, got {other:?}"),
    }
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn wait_encryption_key_sends_configured_key() {
    let config = Config { encryption_key: vec![1, 2, 3], ..Default::default() };
    let (session, _, _, mut rx) = start(config, &[]);

    session.dispatch(auth(State::WaitEncryptionKey { is_encrypted: true })).unwrap();
    assert_eq!(
        next_sent(&mut rx).await.request,
        AuthRequest::CheckEncryptionKey { encryption_key: vec![1, 2, 3] },
    );
}

#[tokio::test]
async fn wait_phone_number_prompts_and_sends_once() {
    let (session, _, prompt, mut rx) = start(Config::default(), &["+15550100"]);

    session.dispatch(auth(State::WaitPhoneNumber)).unwrap();
    assert_eq!(
        next_sent(&mut rx).await.request,
        AuthRequest::SetPhoneNumber {
            phone_number:            "+15550100".into(),
            allow_flash_call:        false,
            is_current_phone_number: false,
        },
    );
    assert_quiet(&mut rx).await;
    assert_eq!(prompt.labels(), vec!["Please enter phone number: ".to_string()]);
}

#[tokio::test]
async fn code_and_password_follow_each_other() {
    let (session, _, prompt, mut rx) = start(Config::default(), &["12345", "hunter2"]);

    session.dispatch(auth(State::WaitCode)).unwrap();
    session.dispatch(auth(State::WaitPassword { password_hint: "pet".into() })).unwrap();

    assert!(matches!(
        next_sent(&mut rx).await.request,
        AuthRequest::CheckCode { ref code, .. } if code == "12345"
    ));
    assert_eq!(
        next_sent(&mut rx).await.request,
        AuthRequest::CheckPassword { password: "hunter2".into() },
    );
    assert_eq!(prompt.labels()[1], "Please enter password (hint: pet): ");
}

#[tokio::test]
async fn closure_prompt_is_accepted() {
    let (factory, mut rx) = RecordingFactory::new();
    let prompt = Arc::new(|_: &str| -> io::Result<String> { Ok("777".into()) });
    let session = Session::start(Config::default(), factory, prompt).unwrap();

    session.dispatch(auth(State::WaitCode)).unwrap();
    assert!(matches!(
        next_sent(&mut rx).await.request,
        AuthRequest::CheckCode { ref code, .. } if code == "777"
    ));
}

#[tokio::test]
async fn failed_prompt_stops_the_session() {
    let (session, _, prompt, mut rx) = start(Config::default(), &[]);
    session.dispatch(auth(State::WaitPhoneNumber)).unwrap();

    let err = session.wait_until_authorized(Some(Duration::from_secs(5))).await.unwrap_err();
    assert!(matches!(err, SessionError::Stopped));
    assert!(session.is_stopped());
    assert_eq!(prompt.labels(), vec!["Please enter phone number: ".to_string()]);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn unsupported_states_send_nothing() {
    let (session, _, _, mut rx) = start(Config::default(), &["x"]);
    session.dispatch(auth(State::WaitRegistration)).unwrap();
    session
        .dispatch(auth(State::WaitOtherDeviceConfirmation { link: "tg://login?token=x".into() }))
        .unwrap();
    assert_quiet(&mut rx).await;
    assert!(!session.is_authorized());
}

// ── Readiness ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ready_wakes_waiters() {
    let (session, _, _, _rx) = start(Config::default(), &[]);

    let waiter = {
        let session = session.clone();
        tokio::spawn(async move { session.wait_until_authorized(None).await })
    };
    tokio::task::yield_now().await;
    assert!(!session.is_authorized());

    session.dispatch(auth(State::Ready)).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("waiter still blocked")
        .unwrap();
    assert!(result.is_ok());
    assert!(session.is_authorized());

    // already authorized: returns at once
    session.wait_until_authorized(Some(Duration::from_millis(10))).await.unwrap();
}

#[tokio::test]
async fn logging_out_clears_authorized() {
    let (session, _, _, _rx) = start(Config::default(), &[]);
    session.dispatch(auth(State::Ready)).unwrap();
    session.wait_until_authorized(Some(Duration::from_secs(5))).await.unwrap();

    session.dispatch(auth(State::LoggingOut)).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.is_authorized() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("flag never cleared");
}

#[tokio::test]
async fn wait_times_out() {
    let (session, _, _, _rx) = start(Config::default(), &[]);
    let err = session.wait_until_authorized(Some(Duration::from_millis(20))).await.unwrap_err();
    assert!(matches!(err, SessionError::Timeout));
}

#[tokio::test]
async fn handshake_continues_after_quit() {
    let (session, _, _, mut rx) = start(Config::default(), &[]);
    session.quit();
    assert!(matches!(
        session.wait_until_authorized(None).await,
        Err(SessionError::Quit)
    ));

    session.dispatch(auth(State::WaitParameters)).unwrap();
    assert!(matches!(next_sent(&mut rx).await.request, AuthRequest::SetParameters(_)));
    session.dispatch(auth(State::Ready)).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !session.is_authorized() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("Ready ignored after quit");
}

#[tokio::test]
async fn quit_releases_waiters() {
    let (session, _, _, _rx) = start(Config::default(), &[]);
    let waiter = {
        let session = session.clone();
        tokio::spawn(async move { session.wait_until_authorized(None).await })
    };
    tokio::task::yield_now().await;
    session.quit();
    let result = tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap();
    assert!(matches!(result, Err(SessionError::Quit)));
}

// ── Errors & retries ──────────────────────────────────────────────────────────

#[tokio::test]
async fn error_reissues_current_state_request_once() {
    let (session, _, _, mut rx) = start(Config::default(), &[]);

    session.dispatch(auth(State::WaitEncryptionKey { is_encrypted: false })).unwrap();
    let first = next_sent(&mut rx).await;
    assert!(matches!(first.request, AuthRequest::CheckEncryptionKey { .. }));

    session.on_result(first.request_id, Outcome::Error(RequestError::new(401, "DATABASE_LOCKED")));
    let second = next_sent(&mut rx).await;
    assert!(matches!(second.request, AuthRequest::CheckEncryptionKey { .. }));
    assert_ne!(second.request_id, first.request_id);
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn ok_and_unexpected_outcomes_do_not_resend() {
    let (session, _, _, mut rx) = start(Config::default(), &[]);

    session.dispatch(auth(State::WaitParameters)).unwrap();
    let first = next_sent(&mut rx).await;
    session.on_result(first.request_id, Outcome::Ok);
    assert_quiet(&mut rx).await;

    session.dispatch(auth(State::WaitParameters)).unwrap();
    let second = next_sent(&mut rx).await;
    session.on_result(second.request_id, Outcome::Unexpected("chats".into()));
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn error_for_unknown_request_is_ignored() {
    let (session, _, _, mut rx) = start(Config::default(), &[]);
    session.dispatch(auth(State::WaitParameters)).unwrap();
    next_sent(&mut rx).await;

    session.on_result(9_999, Outcome::Error(RequestError::new(400, "X")));
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn retry_reprompts_for_credentials() {
    let (session, _, prompt, mut rx) = start(Config::default(), &["111", "222"]);

    session.dispatch(auth(State::WaitCode)).unwrap();
    let first = next_sent(&mut rx).await;
    session.on_result(first.request_id, Outcome::Error(RequestError::new(400, "PHONE_CODE_INVALID")));

    assert!(matches!(
        next_sent(&mut rx).await.request,
        AuthRequest::CheckCode { ref code, .. } if code == "222"
    ));
    assert_eq!(prompt.labels().len(), 2);
}

#[tokio::test]
async fn no_retries_policy_stops_after_error() {
    let config = Config { retry_policy: Arc::new(NoRetries), ..Default::default() };
    let (session, _, _, mut rx) = start(config, &[]);

    session.dispatch(auth(State::WaitParameters)).unwrap();
    let first = next_sent(&mut rx).await;
    session.on_result(first.request_id, Outcome::Error(RequestError::new(400, "API_ID_INVALID")));
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn state_change_cancels_pending_backoff() {
    let config = Config {
        retry_policy: Arc::new(Backoff { initial: Duration::from_millis(300), ..Default::default() }),
        ..Default::default()
    };
    let (session, _, _, mut rx) = start(config, &[]);

    session.dispatch(auth(State::WaitParameters)).unwrap();
    let first = next_sent(&mut rx).await;
    session.on_result(first.request_id, Outcome::Error(RequestError::new(500, "INTERNAL")));
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.dispatch(auth(State::WaitEncryptionKey { is_encrypted: false })).unwrap();

    let next = next_sent(&mut rx).await;
    assert_eq!(next.request.name(), "checkDatabaseEncryptionKey");
    // the old retry must not fire once its delay has passed
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn backoff_retries_after_delay() {
    let config = Config {
        retry_policy: Arc::new(Backoff { initial: Duration::from_millis(50), ..Default::default() }),
        ..Default::default()
    };
    let (session, _, _, mut rx) = start(config, &[]);

    session.dispatch(auth(State::WaitParameters)).unwrap();
    let first = next_sent(&mut rx).await;
    session.on_result(first.request_id, Outcome::Error(RequestError::new(500, "INTERNAL")));

    let second = next_sent(&mut rx).await;
    assert!(matches!(second.request, AuthRequest::SetParameters(_)));
    assert_ne!(second.request_id, first.request_id);
}

// ── Close & restart ───────────────────────────────────────────────────────────

#[tokio::test]
async fn closed_creates_new_client_unless_quitting() {
    let (session, factory, _, mut rx) = start(Config::default(), &[]);
    assert_eq!(factory.created(), 1);

    for state in [State::Ready, State::Closing, State::Closed] {
        session.dispatch(auth(state)).unwrap();
    }
    // the new client is used for the next handshake
    session.dispatch(auth(State::WaitParameters)).unwrap();
    let sent = next_sent(&mut rx).await;
    assert_eq!(factory.created(), 2);
    assert_eq!(sent.transport, 1);
    assert!(!session.is_authorized());

    session.quit();
    session.dispatch(auth(State::Closed)).unwrap();
    session.dispatch(auth(State::WaitParameters)).unwrap();
    assert_quiet(&mut rx).await;
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn handler_given_to_transport_reaches_session() {
    let (session, factory, _, mut rx) = start(Config::default(), &[]);
    let handler = factory.handler();

    handler.on_update(auth(State::WaitEncryptionKey { is_encrypted: false })).unwrap();
    let first = next_sent(&mut rx).await;
    handler.on_result(first.request_id, Outcome::Error(RequestError::new(400, "X")));
    next_sent(&mut rx).await;

    drop(session);
    assert!(matches!(handler.on_update(Update::Raw { constructor_id: 1 }), Err(SessionError::Stopped)));
}

#[tokio::test]
async fn start_fails_when_no_client_can_be_created() {
    let result = Session::start(Config::default(), Arc::new(FailingFactory), Arc::new(StdinPrompt));
    assert!(matches!(result, Err(SessionError::Transport(_))));
}
