//! End-to-end tests: a real portal server on a loopback port, driven by the
//! client session the way the provisioning page drives it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{Json, Router, routing::{get, post}};
use portal_core::backends::mock::MockBackend;
use portal_core::client::{Banner, GENERIC_ERROR, ListView, PortalClient, ScanState, Session};
use portal_core::frontends::provider_embed::EmbedFrontend;
use portal_core::store::MemoryStore;
use portal_core::structs::{Credentials, Network};
use portal_core::traits::CredentialStore;
use portal_core::web_server::{AppState, start_web_server};
use tokio::net::TcpListener;
use tokio::sync::watch;

struct TestPortal {
    addr: SocketAddr,
    store: Arc<MemoryStore>,
    saved: watch::Receiver<Option<Credentials>>,
    shutdown: watch::Sender<bool>,
    server: tokio::task::JoinHandle<portal_core::Result<()>>,
}

impl TestPortal {
    fn session(&self) -> Session {
        let client = PortalClient::with_timeout(format!("http://{}", self.addr), Duration::from_secs(5))
            .expect("failed to build client");
        Session::new(client)
    }
}

async fn start_portal(backend: MockBackend) -> TestPortal {
    let store = Arc::new(MemoryStore::new());
    let (state, saved) = AppState::new(
        Arc::new(backend),
        store.clone(),
        Arc::new(EmbedFrontend::new()),
        Duration::from_secs(5),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let server = start_web_server(listener, Arc::new(state), shutdown_rx);
    TestPortal {
        addr,
        store,
        saved,
        shutdown,
        server,
    }
}

/// Serves a fixed router, for responses the real portal never produces.
async fn start_stub(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn stub_session(addr: SocketAddr) -> Session {
    Session::new(PortalClient::new(format!("http://{}", addr)).unwrap())
}

#[tokio::test]
async fn scan_select_and_save() {
    let portal = start_portal(MockBackend::with_networks(vec![
        Network::new("HomeNet", -41),
        Network::new("Cafe", -67),
    ]))
    .await;
    let mut session = portal.session();

    session.scan().await.unwrap();
    let ListView::Rows(rows) = session.ui().list() else {
        panic!("expected network rows, got {:?}", session.ui().list());
    };
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].ssid, "Cafe");
    assert_eq!(rows[1].signal_label(), "-67 dBm");

    session.ui_mut().set_password("password123");
    session.ui_mut().select_network(0).unwrap();
    session.submit().await.unwrap();

    assert_eq!(session.ui().banner(), &Banner::Success);
    assert_eq!(
        portal.store.load().await.unwrap(),
        Some(Credentials::new("HomeNet", "password123"))
    );
    assert_eq!(
        portal.saved.borrow().as_ref().map(|c| c.ssid.clone()),
        Some("HomeNet".to_string())
    );

    portal.shutdown.send_replace(true);
    portal.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn empty_scan_shows_placeholder() {
    let portal = start_portal(MockBackend::with_networks(vec![])).await;
    let mut session = portal.session();

    session.scan().await.unwrap();
    assert_eq!(session.ui().list(), &ListView::NotFound);
    assert_eq!(session.ui().list().row_count(), 1);
}

#[tokio::test]
async fn backend_scan_failure_is_surfaced() {
    let backend = MockBackend::with_networks(vec![Network::new("HomeNet", -41)]);
    backend.set_fail_scans(true);
    let portal = start_portal(backend).await;
    let mut session = portal.session();

    session.scan().await.unwrap();
    assert_eq!(session.ui().scan_state(), ScanState::Idle);
    assert_eq!(session.ui().list(), &ListView::Hidden);
    assert!(session.ui().scan_error().is_some());
}

#[tokio::test]
async fn server_side_validation_message_reaches_the_banner() {
    let portal = start_portal(MockBackend::with_networks(vec![])).await;
    let mut session = portal.session();

    session.ui_mut().set_ssid("HomeNet");
    session.ui_mut().set_password("short");
    session.submit().await.unwrap();

    match session.ui().banner() {
        Banner::Error(text) => assert!(text.contains("Password must be")),
        other => panic!("expected error banner, got {:?}", other),
    }
    assert_eq!(portal.store.load().await.unwrap(), None);
}

#[tokio::test]
async fn resubmission_overwrites_stored_credentials() {
    let portal = start_portal(MockBackend::with_networks(vec![])).await;
    let mut session = portal.session();

    session.ui_mut().set_ssid("First");
    session.submit().await.unwrap();
    session.ui_mut().set_ssid("Second");
    session.submit().await.unwrap();

    assert_eq!(session.ui().banner(), &Banner::Success);
    assert_eq!(portal.store.load().await.unwrap().unwrap().ssid, "Second");
    assert_eq!(portal.saved.borrow().as_ref().unwrap().ssid, "Second");
}

#[tokio::test]
async fn cancelled_scan_leaves_ui_idle() {
    let backend = MockBackend::with_networks(vec![Network::new("HomeNet", -41)])
        .with_delays(Duration::from_secs(30), Duration::ZERO);
    let portal = start_portal(backend).await;
    let mut session = portal.session();

    let task = session.start_scan().unwrap();
    assert_eq!(session.ui().scan_state(), ScanState::Scanning);
    assert!(session.start_scan().is_err());

    session.cancel_scan(task);
    assert_eq!(session.ui().scan_state(), ScanState::Idle);
    assert_eq!(session.ui().list(), &ListView::Hidden);
    assert_eq!(session.ui().scan_error(), None);
}

#[tokio::test]
async fn rejection_message_from_portal_is_shown() {
    let addr = start_stub(Router::new().route(
        "/save",
        post(|| async { Json(serde_json::json!({ "success": false, "message": "bad password" })) }),
    ))
    .await;
    let mut session = stub_session(addr);

    session.ui_mut().set_ssid("HomeNet");
    session.submit().await.unwrap();
    assert!(session.ui().view().error_text.unwrap().contains("bad password"));
    assert!(!session.ui().view().success_visible);
}

#[tokio::test]
async fn malformed_scan_response_is_surfaced() {
    let addr = start_stub(Router::new().route("/scan", get(|| async { "definitely not json" }))).await;
    let mut session = stub_session(addr);

    session.scan().await.unwrap();
    assert_eq!(session.ui().scan_state(), ScanState::Idle);
    assert!(session.ui().scan_error().unwrap().contains("malformed"));
}

#[tokio::test]
async fn missing_networks_field_means_none_found() {
    let addr = start_stub(Router::new().route("/scan", get(|| async { Json(serde_json::json!({})) }))).await;
    let mut session = stub_session(addr);

    session.scan().await.unwrap();
    assert_eq!(session.ui().list(), &ListView::NotFound);
}

#[tokio::test]
async fn transport_failure_shows_generic_error() {
    // 绑定后立即释放端口，连接会被拒绝
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut session = stub_session(addr);
    session.ui_mut().set_ssid("HomeNet");
    session.submit().await.unwrap();

    assert_eq!(session.ui().banner(), &Banner::Error(GENERIC_ERROR.to_string()));
}

#[tokio::test]
async fn empty_ssid_sends_nothing() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let addr = start_stub(Router::new().route(
        "/save",
        post(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Json(serde_json::json!({ "success": true }))
        }),
    ))
    .await;
    let mut session = stub_session(addr);

    assert!(session.submit().await.is_err());
    assert_eq!(session.ui().banner(), &Banner::None);
    assert!(!session.ui().is_saving());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
