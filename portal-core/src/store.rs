//! 凭据持久化的两个实现：磁盘上的 JSON 文件和内存。

use crate::structs::Credentials;
use crate::traits::CredentialStore;
use crate::Result;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Stores credentials as a JSON file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a power loss never leaves a half-written file behind.
/// Writers share one temporary file and take turns.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let credentials: Credentials = serde_json::from_slice(&data)?;
        tracing::debug!(path = %self.path.display(), ssid = %credentials.ssid, "Loaded stored credentials");
        Ok(Some(credentials))
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_vec_pretty(credentials)?;
        let _guard = self.write_lock.lock().await;
        let tmp = self.temp_path();
        fs::write(&tmp, &data).await?;
        fs::rename(&tmp, &self.path).await?;
        tracing::info!(path = %self.path.display(), ssid = %credentials.ssid, "Credentials saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Stored credentials removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps credentials in memory only. Used by tests and the mock daemon.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.inner.lock().await = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.inner.lock().await.take();
        Ok(())
    }
}
