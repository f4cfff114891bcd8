use anyhow::Context;
use portal_core::config::{AppConfig, load_config};
use portal_core::frontends::create_frontend;
use portal_core::traits::{CredentialStore, WifiBackend};
use runner::Portal;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod policy;
mod runner;

const BACKEND_COUNT: usize =
    cfg!(feature = "backend_mock") as usize + cfg!(feature = "backend_wpa_cli") as usize;
const _: () = assert!(
    BACKEND_COUNT == 1,
    "Select exactly ONE backend feature, e.g. --no-default-features --features backend_mock,policy_on_start"
);

// --- 1. 选择后端实现 ---
#[cfg(feature = "backend_wpa_cli")]
fn get_backend(config: &AppConfig) -> (Arc<dyn WifiBackend>, Arc<dyn CredentialStore>) {
    use portal_core::backends::wpa_cli::WpaCliBackend;
    use portal_core::store::FileStore;

    tracing::info!(interface = %config.ap.interface_name, "🚀 Using wpa_cli Backend");
    (
        Arc::new(WpaCliBackend::new(config.ap.clone())),
        Arc::new(FileStore::new(config.portal.credentials_path.clone())),
    )
}

#[cfg(feature = "backend_mock")]
fn get_backend(_config: &AppConfig) -> (Arc<dyn WifiBackend>, Arc<dyn CredentialStore>) {
    use portal_core::backends::mock::MockBackend;
    use portal_core::store::MemoryStore;

    tracing::info!("🚀 Using Mock Backend");
    (Arc::new(MockBackend::new()), Arc::new(MemoryStore::new()))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    tracing::info!(
        bind_addr = %config.portal.bind_addr,
        ap_ssid = %config.ap.ssid,
        "Configuration loaded"
    );

    // 基于特性，在编译时决定实例化哪个后端和前端
    let (backend, store) = get_backend(&config);
    let portal = Portal {
        config: Arc::new(config),
        backend,
        store,
        frontend: create_frontend(),
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C, shutting down");
                stop_tx.send_replace(true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unable to listen for Ctrl-C");
                // 保持发送端存活，否则接收端会当作停止信号
                stop_tx.closed().await;
            }
        }
    });

    policy::dispatch(&portal, stop_rx).await
}
