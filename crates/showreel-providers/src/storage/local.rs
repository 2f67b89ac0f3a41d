// Local filesystem storage rooted at a base path.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use showreel_types::{ProductionError, ProductionResult};

use crate::contract::{StorageProvider, StorageResult};

pub struct LocalStorageProvider {
    base_path: PathBuf,
}

impl LocalStorageProvider {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, remote_path: &str) -> PathBuf {
        self.base_path.join(remote_path.trim_start_matches('/'))
    }
}

fn storage_err(err: std::io::Error) -> ProductionError {
    ProductionError::ProviderTransient(format!("local storage: {err}"))
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
    ) -> ProductionResult<StorageResult> {
        let target = self.resolve(remote_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(storage_err)?;
        }
        fs::copy(local_path, &target).await.map_err(storage_err)?;
        let size = fs::metadata(&target).await.map_err(storage_err)?.len();
        Ok(StorageResult {
            file_url: Some(format!("file://{}", target.display())),
            file_path: Some(target.display().to_string()),
            size_bytes: Some(size),
        })
    }

    async fn download(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> ProductionResult<StorageResult> {
        let source = self.resolve(remote_path);
        if !source.exists() {
            return Err(ProductionError::InputInvalid(format!(
                "no stored file at `{remote_path}`"
            )));
        }
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await.map_err(storage_err)?;
        }
        fs::copy(&source, local_path).await.map_err(storage_err)?;
        let size = fs::metadata(local_path).await.map_err(storage_err)?.len();
        Ok(StorageResult {
            file_url: None,
            file_path: Some(local_path.display().to_string()),
            size_bytes: Some(size),
        })
    }

    async fn get_url(&self, remote_path: &str, _expires_in_secs: u64) -> ProductionResult<String> {
        Ok(format!("file://{}", self.resolve(remote_path).display()))
    }

    async fn delete(&self, remote_path: &str) -> ProductionResult<bool> {
        let target = self.resolve(remote_path);
        if !target.exists() {
            return Ok(false);
        }
        fs::remove_file(&target).await.map_err(storage_err)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_download_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageProvider::new(dir.path().join("store"));

        let source = dir.path().join("clip.mp4");
        tokio::fs::write(&source, b"clip bytes").await.unwrap();

        let uploaded = storage.upload(&source, "runs/run-1/clip.mp4").await.unwrap();
        assert_eq!(uploaded.size_bytes, Some(10));

        let restored = dir.path().join("restored.mp4");
        storage
            .download("runs/run-1/clip.mp4", &restored)
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&restored).await.unwrap(), b"clip bytes");

        assert!(storage.delete("runs/run-1/clip.mp4").await.unwrap());
        assert!(!storage.delete("runs/run-1/clip.mp4").await.unwrap());
    }
}
