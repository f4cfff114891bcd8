use crate::frontends::INDEX_PAGE;
use crate::structs::{Credentials, SaveResult, ScanResponse};
use crate::traits::{CredentialStore, UiAssetProvider, WifiBackend};
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Paths that phones and desktops probe to detect a captive portal.
/// Answering them with a redirect makes the OS pop up the portal page.
pub const CAPTIVE_PROBE_PATHS: &[&str] = &[
    "/generate_204",
    "/gen_204",
    "/hotspot-detect.html",
    "/library/test/success.html",
    "/ncsi.txt",
    "/connecttest.txt",
    "/redirect",
    "/fwlink",
];

// The shared state for our web server.
// By using `Arc<dyn Trait>`, we can inject any implementation
// that satisfies the trait bounds.
pub type WebServerState = State<Arc<AppState>>;

pub struct AppState {
    backend: Arc<dyn WifiBackend>,
    store: Arc<dyn CredentialStore>,
    frontend: Arc<dyn UiAssetProvider>,
    // 同一时间只允许一次射频扫描，并发请求排队等待
    scan_lock: Mutex<()>,
    scan_timeout: Duration,
    saved_tx: watch::Sender<Option<Credentials>>,
}

impl AppState {
    /// Builds the shared state and returns the receiving side of the
    /// "credentials saved" channel. The latest save always wins.
    pub fn new(
        backend: Arc<dyn WifiBackend>,
        store: Arc<dyn CredentialStore>,
        frontend: Arc<dyn UiAssetProvider>,
        scan_timeout: Duration,
    ) -> (Self, watch::Receiver<Option<Credentials>>) {
        let (saved_tx, saved_rx) = watch::channel(None);
        let state = Self {
            backend,
            store,
            frontend,
            scan_lock: Mutex::new(()),
            scan_timeout,
            saved_tx,
        };
        (state, saved_rx)
    }
}

/// Builds the portal router: the page, its assets, `/scan`, `/save` and the
/// captive-portal probes.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/scan", get(api_scan))
        .route("/save", post(api_save));
    for path in CAPTIVE_PROBE_PATHS {
        app = app.route(path, get(handle_captive_probe));
    }
    app.fallback(get(serve_static_asset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the Axum web server on an already bound listener.
///
/// The server stops accepting connections once `shutdown` turns `true`
/// and finishes in-flight requests before the task completes.
pub fn start_web_server(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<crate::Result<()>> {
    let app = router(state);
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("🌐 Web server listening on {}", addr);
    }

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                // 发送端被丢弃同样视为关闭信号
                let _ = shutdown.wait_for(|stop| *stop).await;
                tracing::info!("🌐 Web server shutting down");
            })
            .await
            .map_err(|e| crate::Error::WebServer(e.into()))
    })
}

// --- Route Handlers ---

/// API endpoint to scan for Wi-Fi networks.
async fn api_scan(State(state): WebServerState) -> Response {
    let _guard = state.scan_lock.lock().await;
    tracing::debug!("Handling /scan");

    match tokio::time::timeout(state.scan_timeout, state.backend.scan()).await {
        Ok(Ok(networks)) => {
            tracing::info!(count = networks.len(), "Scan finished");
            (StatusCode::OK, Json(ScanResponse { networks })).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Scan failed");
            scan_error(e.to_string())
        }
        Err(_) => {
            tracing::error!(timeout = ?state.scan_timeout, "Scan timed out");
            scan_error(format!("Scan timed out after {:?}", state.scan_timeout))
        }
    }
}

fn scan_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// API endpoint to persist credentials.
///
/// The answer is sent before any network switch happens; the daemon picks
/// the credentials up from the watch channel and applies them after a delay,
/// so the browser still receives this response over the AP.
async fn api_save(
    State(state): WebServerState,
    Json(credentials): Json<Credentials>,
) -> Json<SaveResult> {
    tracing::debug!(ssid = %credentials.ssid, "Handling /save");

    if let Err(message) = credentials.validate() {
        tracing::warn!(ssid = %credentials.ssid, reason = %message, "Rejected credentials");
        return Json(SaveResult::rejected(message));
    }

    if let Err(e) = state.store.save(&credentials).await {
        tracing::error!(error = %e, "Failed to persist credentials");
        return Json(SaveResult::rejected(format!("Failed to store credentials: {}", e)));
    }

    tracing::info!(ssid = %credentials.ssid, "Credentials accepted");
    state.saved_tx.send_replace(Some(credentials));
    Json(SaveResult::ok())
}

/// 处理捕获门户检测请求（Captive Portal Detection）
///
/// 我们的 dnsmasq 会把所有域名解析到网关地址，系统的连通性检测因此落到这里。
/// 以重定向回应，让手机弹出配网页面。
async fn handle_captive_probe(uri: Uri) -> impl IntoResponse {
    tracing::debug!(path = %uri.path(), "Captive portal probe");
    (StatusCode::FOUND, [(header::LOCATION, "/")])
}

/// 处理静态资产的 Fallback 处理器
///
/// 未知的页面路径一律返回 `index.html`；
/// 带有非 HTML 扩展名的未知文件 (例如 favicon.ico) 返回 404。
async fn serve_static_asset(State(state): WebServerState, uri: Uri) -> Response {
    let mut path = uri.path().trim_start_matches('/').to_string();
    if path.is_empty() {
        path = INDEX_PAGE.to_string();
    }

    match state.frontend.get_asset(&path).await {
        Ok((data, mime)) => asset_response(data.into_owned(), mime),
        Err(e) if looks_like_page(&path) => {
            tracing::debug!(path = %path, error = %e, "Unknown page, serving index");
            match state.frontend.get_asset(INDEX_PAGE).await {
                Ok((data, mime)) => asset_response(data.into_owned(), mime),
                Err(e) => {
                    tracing::error!(error = %e, "Index page is missing");
                    (StatusCode::NOT_FOUND, "Not Found").into_response()
                }
            }
        }
        Err(e) => {
            tracing::warn!("Failed to get asset: {} (Error: {})", path, e);
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}

fn looks_like_page(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((_, ext)) => ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"),
        None => true,
    }
}

fn asset_response(data: Vec<u8>, mime: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .body(Body::from(data))
        .unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build response").into_response()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::MockBackend;
    use crate::frontends::provider_embed::EmbedFrontend;
    use crate::store::MemoryStore;
    use crate::structs::Network;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct Harness {
        app: Router,
        backend: Arc<MockBackend>,
        store: Arc<MemoryStore>,
        saved: watch::Receiver<Option<Credentials>>,
        // 路由被 oneshot 消费后仍保持 saved_tx 存活
        _state: Arc<AppState>,
    }

    fn harness(networks: Vec<Network>) -> Harness {
        let backend = Arc::new(MockBackend::with_networks(networks));
        let store = Arc::new(MemoryStore::new());
        let (state, saved) = AppState::new(
            backend.clone(),
            store.clone(),
            Arc::new(EmbedFrontend::new()),
            Duration::from_secs(5),
        );
        let state = Arc::new(state);
        Harness {
            app: router(state.clone()),
            backend,
            store,
            saved,
            _state: state,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn save_request(body: &str) -> Request<Body> {
        Request::post("/save")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn scan_returns_networks_in_contract_shape() {
        let h = harness(vec![Network::new("HomeNet", -42), Network::new("Cafe", -70)]);
        let response = h
            .app
            .oneshot(Request::get("/scan").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({
                "networks": [
                    { "ssid": "HomeNet", "rssi": -42 },
                    { "ssid": "Cafe", "rssi": -70 }
                ]
            })
        );
    }

    #[tokio::test]
    async fn scan_failure_is_a_server_error() {
        let h = harness(vec![]);
        h.backend.set_fail_scans(true);
        let response = h
            .app
            .oneshot(Request::get("/scan").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn save_persists_and_notifies() {
        let mut h = harness(vec![]);
        let response = h
            .app
            .oneshot(save_request(r#"{"ssid":"HomeNet","password":"password1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({ "success": true }));
        assert_eq!(
            h.store.load().await.unwrap(),
            Some(Credentials::new("HomeNet", "password1"))
        );
        assert!(h.saved.has_changed().unwrap());
        assert_eq!(h.saved.borrow_and_update().as_ref().unwrap().ssid, "HomeNet");
    }

    #[tokio::test]
    async fn save_rejects_empty_ssid_without_storing() {
        let h = harness(vec![]);
        let response = h
            .app
            .oneshot(save_request(r#"{"ssid":"","password":""}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "success": false, "message": "SSID is required" })
        );
        assert_eq!(h.store.load().await.unwrap(), None);
        assert!(!h.saved.has_changed().unwrap());
    }

    #[tokio::test]
    async fn malformed_save_body_is_a_client_error() {
        let h = harness(vec![]);
        let response = h.app.oneshot(save_request("{not json")).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn captive_probes_redirect_to_portal() {
        let h = harness(vec![]);
        for path in CAPTIVE_PROBE_PATHS {
            let response = h
                .app
                .clone()
                .oneshot(Request::get(*path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FOUND, "{}", path);
            assert_eq!(response.headers()[header::LOCATION], "/");
        }
    }

    #[tokio::test]
    async fn unknown_pages_fall_back_to_index() {
        let h = harness(vec![]);
        for path in ["/", "/some/landing", "/login.html"] {
            let response = h
                .app
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", path);
            assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        }

        let response = h
            .app
            .oneshot(Request::get("/favicon.ico").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn page_detection() {
        assert!(looks_like_page("index.html"));
        assert!(looks_like_page("a/b"));
        assert!(!looks_like_page("favicon.ico"));
        assert!(!looks_like_page("v1.2/app.js"));
    }
}
