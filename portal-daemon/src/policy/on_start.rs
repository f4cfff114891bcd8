use crate::runner::{Portal, run_provisioning_server};
use tokio::sync::watch;

/// On-Start 策略：程序启动时立即进入配网模式
#[allow(dead_code)]
pub async fn run(portal: &Portal, stop: watch::Receiver<bool>) -> anyhow::Result<()> {
    tracing::info!("🚀 Policy: On-Start. Entering provisioning mode immediately.");
    run_provisioning_server(portal, stop).await
}
