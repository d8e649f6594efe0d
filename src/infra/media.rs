//! Uploaded image storage on the local filesystem.

use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Stores uploaded files and hands back their media-relative path.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Save `bytes` under `folder` with a fresh name and `extension`.
    async fn save(&self, folder: &str, extension: &str, bytes: Vec<u8>) -> AppResult<String>;

    /// Remove a previously saved file; missing files are ignored.
    async fn remove(&self, path: &str) -> AppResult<()>;
}

/// Files below `MEDIA_ROOT`.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStore {
    async fn save(&self, folder: &str, extension: &str, bytes: Vec<u8>) -> AppResult<String> {
        let relative = format!("{}/{}.{}", folder, Uuid::new_v4(), extension);
        let target = self.root.join(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::internal(format!("Media directory error: {}", e)))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| AppError::internal(format!("Media write error: {}", e)))?;

        tracing::debug!(path = %relative, "Media file stored");
        Ok(relative)
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::internal(format!("Media remove error: {}", e))),
        }
    }
}
