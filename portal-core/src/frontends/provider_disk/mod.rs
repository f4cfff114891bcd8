use crate::traits::UiAssetProvider;
use crate::{Error, Result};
use async_trait::async_trait;
use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// `build.rs` of the daemon copies `ui/` next to the binary.
pub const DEFAULT_UI_DIR: &str = "ui";

/// A UI asset provider that reads files directly from disk.
#[derive(Debug)]
pub struct DiskFrontend {
    root: PathBuf,
}

impl DiskFrontend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

// 只允许普通路径分量，防止目录穿越
fn is_safe_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl UiAssetProvider for DiskFrontend {
    async fn get_asset(&self, path: &str) -> Result<(Cow<'static, [u8]>, String)> {
        let relative = Path::new(path);
        if path.is_empty() || !is_safe_relative(relative) {
            return Err(Error::AssetNotFound(path.to_string()));
        }

        let content = fs::read(self.root.join(relative))
            .await
            .map_err(|_| Error::AssetNotFound(path.to_string()))?;

        // Guess the MIME type based on the file extension
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        Ok((Cow::Owned(content), mime))
    }
}
