use crate::runner::{Portal, run_provisioning_server};
use portal_core::traits::{CredentialStore, PolicyCheck, WifiBackend};
use tokio::sync::watch;

/// 守护进程策略：仅当未连接时才进入配网模式
///
/// 已保存的凭据会先被尝试一次；失败后才打开门户。
#[allow(dead_code)]
pub async fn run(portal: &Portal, stop: watch::Receiver<bool>) -> anyhow::Result<()> {
    tracing::info!("🚀 Policy: Daemon (If-Disconnected).");

    match portal.backend.is_connected().await {
        Ok(true) => {
            tracing::info!("🛡️ Daemon Policy: WiFi is ALREADY CONNECTED. Provisioner will not start.");
            return Ok(());
        }
        Ok(false) => tracing::info!("🛡️ Daemon Policy: WiFi is NOT connected."),
        // 检查失败时按未连接处理
        Err(e) => tracing::warn!(error = %e, "🛡️ Daemon Policy: status check failed, assuming NOT connected"),
    }

    match portal.store.load().await {
        Ok(Some(credentials)) => {
            tracing::info!(ssid = %credentials.ssid, "🛡️ Daemon Policy: trying stored credentials");
            match portal.backend.connect(&credentials).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::warn!(error = %e, "🛡️ Daemon Policy: stored credentials failed"),
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "🛡️ Daemon Policy: could not read stored credentials"),
    }

    tracing::info!("🛡️ Daemon Policy: Starting provisioner...");
    run_provisioning_server(portal, stop).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::tests::{free_port, submit, test_portal};
    use portal_core::backends::mock::{FAILING_SSID, MockBackend};
    use portal_core::structs::Credentials;
    use std::sync::Arc;

    #[tokio::test]
    async fn connected_device_skips_the_portal() {
        let backend = Arc::new(MockBackend::with_networks(vec![]));
        backend.connect(&Credentials::new("Already", "")).await.unwrap();
        let portal = test_portal(free_port().await, backend.clone());
        let (_stop_tx, stop_rx) = watch::channel(false);

        run(&portal, stop_rx).await.unwrap();
        assert_eq!(backend.last_connect().await.unwrap().ssid, "Already");
    }

    #[tokio::test]
    async fn stored_credentials_are_tried_first() {
        let backend = Arc::new(MockBackend::with_networks(vec![]));
        let portal = test_portal(free_port().await, backend.clone());
        portal.store.save(&Credentials::new("Stored", "password123")).await.unwrap();
        let (_stop_tx, stop_rx) = watch::channel(false);

        run(&portal, stop_rx).await.unwrap();
        assert_eq!(backend.last_connect().await.unwrap().ssid, "Stored");
    }

    #[tokio::test]
    async fn failing_stored_credentials_open_the_portal() {
        let addr = free_port().await;
        let backend = Arc::new(MockBackend::with_networks(vec![]));
        let portal = test_portal(addr, backend.clone());
        portal.store.save(&Credentials::new(FAILING_SSID, "")).await.unwrap();
        let (_stop_tx, stop_rx) = watch::channel(false);

        let policy = tokio::spawn(async move { run(&portal, stop_rx).await });
        submit(addr, "HomeNet").await;

        policy.await.unwrap().unwrap();
        assert_eq!(backend.last_connect().await.unwrap().ssid, "HomeNet");
    }
}
