use crate::structs::{Credentials, Network};
use async_trait::async_trait;
use std::borrow::Cow;

// 在这里定义所有后端和前端共享的 trait。

/// 前端资源提供者接口。
#[async_trait]
pub trait UiAssetProvider: Send + Sync {
    /// Retrieves a single UI asset.
    ///
    /// # Arguments
    /// * `path` - The path to the asset (e.g., "index.html", "style.css").
    ///
    /// # Returns
    /// A `Result` containing a tuple of (`Cow<'static, [u8]>`, `String`)
    /// representing the asset's content and its MIME type, or an `Error` if not found.
    async fn get_asset(&self, path: &str) -> crate::Result<(Cow<'static, [u8]>, String)>;
}

// -----------------------------------------------------------------------------
// 策略层最小化能力：只关心连接状态
// 用于行为策略，比如守护进程模式下的“如果未连接则启动配网”
#[async_trait]
pub trait PolicyCheck: Send + Sync {
    /// 检查设备当前是否已连接到网络
    async fn is_connected(&self) -> crate::Result<bool>;
}

/// Wi-Fi 控制能力：启动 AP、实时扫描、连接以及退出配网模式
#[async_trait]
pub trait WifiBackend: PolicyCheck {
    /// 进入配网模式（启动 AP）
    async fn enter_provisioning_mode(&self) -> crate::Result<()>;

    /// 执行一次实时的 Wi-Fi 扫描
    async fn scan(&self) -> crate::Result<Vec<Network>>;

    /// 使用给定凭据连接（STA 模式）
    async fn connect(&self, credentials: &Credentials) -> crate::Result<()>;

    /// 彻底退出配网模式（清理 AP）
    async fn exit_provisioning_mode(&self) -> crate::Result<()>;
}

/// 凭据持久化。保存总是覆盖上一次的内容，因此重复提交是安全的。
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> crate::Result<Option<Credentials>>;

    async fn save(&self, credentials: &Credentials) -> crate::Result<()>;

    async fn clear(&self) -> crate::Result<()>;
}
