use crate::traits::UiAssetProvider;
use std::sync::Arc;

pub mod provider_disk;
pub mod provider_embed;

/// Page served for `/` and for any path the captive portal does not know.
pub const INDEX_PAGE: &str = "index.html";

/// 根据编译特性选择前端资源提供者
pub fn create_frontend() -> Arc<dyn UiAssetProvider> {
    #[cfg(feature = "frontend_disk")]
    {
        tracing::info!("💿 Frontend: Disk Provider selected (for local development)");
        Arc::new(provider_disk::DiskFrontend::new(provider_disk::DEFAULT_UI_DIR))
    }
    #[cfg(not(feature = "frontend_disk"))]
    {
        tracing::info!("📦 Frontend: Embed Provider selected (for deployment)");
        Arc::new(provider_embed::EmbedFrontend::new())
    }
}
