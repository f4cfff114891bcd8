use anyhow::{Context, anyhow};
use portal_core::config::AppConfig;
use portal_core::structs::Credentials;
use portal_core::traits::{CredentialStore, UiAssetProvider, WifiBackend};
use portal_core::web_server::{AppState, start_web_server};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Everything a provisioning round needs, chosen at start-up.
#[derive(Clone)]
pub struct Portal {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn WifiBackend>,
    pub store: Arc<dyn CredentialStore>,
    pub frontend: Arc<dyn UiAssetProvider>,
}

/// Runs provisioning rounds until the device joins a network or `stop`
/// turns `true`.
///
/// A round: start the AP and the portal, wait for `/save`, give the browser
/// `apply_delay` to receive the answer, tear the portal down and connect.
/// A failed connection starts a new round.
pub async fn run_provisioning_server(portal: &Portal, stop: watch::Receiver<bool>) -> anyhow::Result<()> {
    loop {
        let Some(credentials) = serve_until_saved(portal, stop.clone()).await? else {
            tracing::info!("🛑 Provisioning interrupted.");
            return Ok(());
        };

        tracing::info!(ssid = %credentials.ssid, "📡 Runner: connecting with saved credentials...");
        match portal.backend.connect(&credentials).await {
            Ok(()) => {
                tracing::info!(ssid = %credentials.ssid, "✅ Provisioning complete.");
                return Ok(());
            }
            Err(e) => {
                tracing::error!(ssid = %credentials.ssid, error = %e, "❌ Connection failed, re-entering provisioning mode");
            }
        }
    }
}

/// One round of the portal. `None` when stopped before anything was saved.
async fn serve_until_saved(
    portal: &Portal,
    mut stop: watch::Receiver<bool>,
) -> anyhow::Result<Option<Credentials>> {
    portal
        .backend
        .enter_provisioning_mode()
        .await
        .context("failed to enter provisioning mode")?;

    let bind_addr = portal.config.portal.bind_addr;
    let listener = match TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            let _ = portal.backend.exit_provisioning_mode().await;
            return Err(e).with_context(|| format!("failed to bind {}", bind_addr));
        }
    };

    let (state, mut saved_rx) = AppState::new(
        portal.backend.clone(),
        portal.store.clone(),
        portal.frontend.clone(),
        portal.config.portal.scan_timeout,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server = start_web_server(listener, Arc::new(state), shutdown_rx);

    let got_save = tokio::select! {
        changed = saved_rx.changed() => changed.is_ok(),
        result = &mut server => {
            let _ = portal.backend.exit_provisioning_mode().await;
            return match result {
                Ok(Ok(())) => Err(anyhow!("web server stopped unexpectedly")),
                Ok(Err(e)) => Err(e).context("web server failed"),
                Err(e) => Err(e).context("web server task panicked"),
            };
        }
        // wait_for 返回的 Ref 不是 Send，不能留到后面的 await
        _ = async { let _ = stop.wait_for(|stop| *stop).await; } => false,
    };

    let saved = if got_save {
        // 先让浏览器收到 /save 的回复；期间的再次提交以最后一次为准
        tokio::time::sleep(portal.config.portal.apply_delay).await;
        saved_rx.borrow_and_update().clone()
    } else {
        None
    };

    shutdown_tx.send_replace(true);
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Web server reported an error on shutdown"),
        Err(e) => tracing::warn!(error = %e, "Web server task failed on shutdown"),
    }

    portal
        .backend
        .exit_provisioning_mode()
        .await
        .context("failed to exit provisioning mode")?;
    Ok(saved)
}
