use crate::runner::Portal;
use tokio::sync::watch;

pub mod daemon_if_disconnected;
pub mod on_start;

const POLICY_COUNT: usize =
    cfg!(feature = "policy_on_start") as usize + cfg!(feature = "policy_daemon_if_disconnected") as usize;
const _: () = assert!(POLICY_COUNT == 1, "Select exactly ONE policy feature (e.g., policy_on_start).");

/// 策略调度器：根据编译时选择的 policy feature 调用对应实现。
pub async fn dispatch(portal: &Portal, stop: watch::Receiver<bool>) -> anyhow::Result<()> {
    #[cfg(feature = "policy_on_start")]
    {
        on_start::run(portal, stop).await
    }

    #[cfg(feature = "policy_daemon_if_disconnected")]
    {
        daemon_if_disconnected::run(portal, stop).await
    }
}
