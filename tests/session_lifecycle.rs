//! Login, queueing, restore and logout against a scripted XMPP server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ACCOUNT, CONTACT, FakeUpstream, Gateway, PassthroughTls, RecordingPush, SECRET};
use jabgate::error::SessionError;
use jabgate::push::NotificationDispatcher;
use jabgate::store::{MemoryStore, SessionStore};

#[tokio::test]
async fn test_incoming_message_is_queued_and_drained_once() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();
    assert_eq!(token.len(), 16);

    assert!(gw.upstream.deliver(ACCOUNT, &common::chat_from_contact("hi")));
    assert!(common::eventually(|| async { gw.store.queued(ACCOUNT) == 1 }).await);

    let events = gw.registry.drain_queue(&token).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].from, format!("{CONTACT}/res"));
    assert_eq!(events[0].body.as_deref(), Some("hi"));
    assert_eq!(events[0].kind.as_deref(), Some("chat"));
    assert!(events[0].time > 0);

    assert!(gw.registry.drain_queue(&token).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_login_persists_authenticated_descriptor() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();

    let stored = gw.store.load(&token).await.unwrap().unwrap();
    assert_eq!(stored.account, ACCOUNT);
    assert_eq!(stored.secret, SECRET);
    assert!(stored.authenticated);
    assert!(stored.endpoint.is_none());
}

#[tokio::test]
async fn test_repeated_login_recycles_live_session() {
    let gw = Gateway::new();
    let first = gw.registry.login(ACCOUNT, SECRET).await.unwrap();
    let second = gw.registry.login(ACCOUNT, SECRET).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(gw.upstream.connections(), 1);
    assert_eq!(gw.registry.len(), 1);
}

#[tokio::test]
async fn test_rejected_login_leaves_nothing_behind() {
    let gw = Gateway::new();
    let err = gw.registry.login(ACCOUNT, "wrong").await.unwrap_err();

    match err {
        SessionError::AuthRejected(details) => assert!(details.contains("not-authorized")),
        other => panic!("expected auth rejection, got {other:?}"),
    }
    assert!(gw.registry.is_empty());
    assert!(gw.store.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bind_failure_after_auth_leaves_nothing_behind() {
    let gw = Gateway::build(
        FakeUpstream::new().with_account(ACCOUNT, SECRET).refusing_bind(),
        Arc::new(RecordingPush::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(PassthroughTls::verified()),
        Duration::from_secs(5),
    );

    let err = gw.registry.login(ACCOUNT, SECRET).await.unwrap_err();
    assert!(matches!(err, SessionError::Negotiation(_)), "got {err:?}");
    assert!(gw.registry.is_empty());
    assert!(gw.store.load_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_keeps_descriptor_when_bind_fails() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();
    gw.registry.close_all();

    let restarted = Gateway::build(
        FakeUpstream::new().with_account(ACCOUNT, SECRET).refusing_bind(),
        Arc::new(RecordingPush::new()),
        Arc::clone(&gw.store),
        Arc::new(PassthroughTls::verified()),
        Duration::from_secs(5),
    );
    assert_eq!(restarted.registry.restore_all().await.unwrap(), 0);
    assert!(gw.store.load(&token).await.unwrap().is_some());
}

#[tokio::test]
async fn test_unusable_account_is_refused() {
    let gw = Gateway::new();
    let err = gw.registry.login("no-domain", SECRET).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidAccount(_)));
    assert_eq!(gw.upstream.connections(), 0);
}

#[tokio::test]
async fn test_silent_server_times_out_handshake() {
    let gw = Gateway::build(
        FakeUpstream::new().silent(),
        Arc::new(RecordingPush::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(PassthroughTls::verified()),
        Duration::from_millis(200),
    );

    let err = gw.registry.login(ACCOUNT, SECRET).await.unwrap_err();
    assert!(matches!(err, SessionError::HandshakeTimeout(_)));
    assert!(gw.registry.is_empty());
}

#[tokio::test]
async fn test_unverified_peer_fails_login() {
    let gw = Gateway::build(
        FakeUpstream::new().with_account(ACCOUNT, SECRET),
        Arc::new(RecordingPush::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(PassthroughTls::unverified()),
        Duration::from_secs(5),
    );

    let err = gw.registry.login(ACCOUNT, SECRET).await.unwrap_err();
    assert!(matches!(err, SessionError::Verification(_)));
}

#[tokio::test]
async fn test_restore_rebuilds_identical_session() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();
    gw.registry
        .register_endpoint(&token, "http://push.example.com/ch/1")
        .await
        .unwrap();
    let before = gw.store.load(&token).await.unwrap().unwrap();
    gw.registry.close_all();

    let restarted = gw.restarted();
    assert_eq!(restarted.registry.restore_all().await.unwrap(), 1);

    let handle = restarted.registry.get(&token).expect("restored session");
    assert_eq!(handle.snapshot(), before);
    assert_eq!(restarted.store.load(&token).await.unwrap(), Some(before));
}

#[tokio::test]
async fn test_restore_drops_rejected_credentials() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();
    gw.registry.close_all();

    // Credentials revoked while the gateway was down.
    let restarted = Gateway::build(
        FakeUpstream::new(),
        Arc::new(RecordingPush::new()),
        Arc::clone(&gw.store),
        Arc::new(PassthroughTls::verified()),
        Duration::from_secs(5),
    );
    assert_eq!(restarted.registry.restore_all().await.unwrap(), 0);
    assert!(restarted.registry.get(&token).is_none());
    assert!(gw.store.load(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_send_message_reaches_server() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();

    gw.registry
        .send_message(&token, CONTACT, "see you at 5 & not later")
        .await
        .unwrap();

    assert!(common::eventually(|| async { !gw.upstream.received().is_empty() }).await);
    let sent = &gw.upstream.received()[0];
    assert!(sent.contains(&format!("to='{CONTACT}'")));
    assert!(sent.contains("<body>see you at 5 &amp; not later</body>"));
}

#[tokio::test]
async fn test_roster_lists_contacts() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();

    let roster = gw.registry.roster(&token).await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].jid, CONTACT);
    assert_eq!(roster[0].name.as_deref(), Some("Bea"));
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();

    assert!(gw.registry.logout(&token).await.unwrap());
    assert!(gw.store.load(&token).await.unwrap().is_none());
    assert!(!gw.registry.logout(&token).await.unwrap());

    let err = gw.registry.send_message(&token, CONTACT, "hi").await.unwrap_err();
    assert!(matches!(err, SessionError::UnknownToken));
}

#[tokio::test]
async fn test_login_after_logout_gets_fresh_token() {
    let gw = Gateway::new();
    let first = gw.registry.login(ACCOUNT, SECRET).await.unwrap();
    gw.registry.logout(&first).await.unwrap();

    let second = gw.registry.login(ACCOUNT, SECRET).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(gw.upstream.connections(), 2);
}

#[tokio::test]
async fn test_lost_session_keeps_descriptor() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();

    assert!(gw.upstream.disconnect(ACCOUNT));
    assert!(common::eventually(|| async { gw.registry.get(&token).is_none() }).await);
    assert!(gw.store.load(&token).await.unwrap().is_some());
}

#[tokio::test]
async fn test_endpoint_registered_during_logout_is_not_resurrected() {
    let gw = Gateway::new();
    let token = gw.registry.login(ACCOUNT, SECRET).await.unwrap();
    let handle = gw.registry.get(&token).unwrap();

    gw.registry.logout(&token).await.unwrap();

    // A register request that looked the session up before logout finished.
    let dispatcher = NotificationDispatcher::new(gw.push.clone(), gw.store.clone());
    let result = dispatcher
        .register_endpoint(
            handle.descriptor(),
            "http://push.example.com/ch/1",
            handle.cancel_token(),
        )
        .await;
    assert!(result.is_err());
    assert!(gw.store.load_all().await.unwrap().is_empty());
}
