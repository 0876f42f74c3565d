//! Filesystem bucket: one data file per blob plus a JSON sidecar

use std::path::PathBuf;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BlobDigest, BlobInfo, BlobStore, ByteStream, NewBlob};
use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl FsBlobStore {
    pub async fn new(base_path: impl Into<PathBuf>, max_size: usize) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| AppError::Storage {
            message: format!(
                "Failed to create blob directory '{}': {}",
                base_path.display(),
                e
            ),
        })?;

        info!(path = %base_path.display(), "Blob store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    // File names are always rendered from a Uuid, so they cannot escape the base directory.
    fn data_path(&self, id: Uuid) -> PathBuf {
        self.base_path.join(id.to_string())
    }

    fn meta_path(&self, id: Uuid) -> PathBuf {
        self.base_path.join(format!("{}.json", id))
    }

    async fn discard(&self, id: Uuid) {
        if let Err(e) = fs::remove_file(self.data_path(id)).await {
            warn!(id = %id, error = %e, "Failed to remove partial blob");
        }
    }

    async fn write_body(&self, id: Uuid, mut body: ByteStream<'_>) -> Result<BlobDigest> {
        let mut file = fs::File::create(self.data_path(id)).await?;
        let mut digest = BlobDigest::new(self.max_size);

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            digest.update(&chunk)?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(digest)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put<'a>(&self, blob: NewBlob, body: ByteStream<'a>) -> Result<BlobInfo> {
        let id = Uuid::new_v4();

        let info = match self.write_body(id, body).await {
            Ok(digest) => digest.finish(id, blob),
            Err(e) => Err(e),
        };

        let info = match info {
            Ok(info) => info,
            Err(e) => {
                self.discard(id).await;
                return Err(e);
            }
        };

        let sidecar = serde_json::to_vec(&info)?;
        if let Err(e) = fs::write(self.meta_path(id), sidecar).await {
            self.discard(id).await;
            return Err(e.into());
        }

        debug!(id = %id, size = info.size, "Stored blob");
        Ok(info)
    }

    async fn open(&self, id: Uuid) -> Result<(BlobInfo, ByteStream<'static>)> {
        let sidecar = match fs::read(self.meta_path(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ContentNotFound { id: id.to_string() });
            }
            Err(e) => return Err(e.into()),
        };
        let info: BlobInfo = serde_json::from_slice(&sidecar)?;

        let file = match fs::File::open(self.data_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ContentNotFound { id: id.to_string() });
            }
            Err(e) => return Err(e.into()),
        };

        let stream = ReaderStream::new(file).map_err(AppError::from).boxed();
        Ok((info, stream))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        match fs::remove_file(self.meta_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ContentNotFound { id: id.to_string() });
            }
            Err(e) => return Err(e.into()),
        }
        fs::remove_file(self.data_path(id)).await?;

        debug!(id = %id, "Deleted blob");
        Ok(())
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::chunks;
    use tempfile::TempDir;

    async fn test_store(max_size: usize) -> (FsBlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(dir.path().to_path_buf(), max_size)
            .await
            .unwrap();
        (store, dir)
    }

    fn pdf() -> NewBlob {
        NewBlob {
            original_name: "paper.pdf".into(),
            media_type: "application/pdf".into(),
        }
    }

    #[tokio::test]
    async fn test_put_and_read() {
        let (store, _dir) = test_store(1024).await;
        let info = store.put(pdf(), chunks(&[b"%PDF-", b"1.7"])).await.unwrap();
        assert_eq!(info.size, 8);
        assert_eq!(info.original_name, "paper.pdf");

        let (read_info, data) = store.read_to_end(info.id).await.unwrap();
        assert_eq!(read_info, info);
        assert_eq!(data, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_oversized_blob_leaves_nothing_behind() {
        let (store, dir) = test_store(4).await;
        let err = store.put(pdf(), chunks(&[b"abc", b"def"])).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { .. }));

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_blob_rejected() {
        let (store, _dir) = test_store(1024).await;
        assert!(store.put(pdf(), chunks(&[])).await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _dir) = test_store(1024).await;
        let info = store.put(pdf(), chunks(&[b"delete-me"])).await.unwrap();

        store.delete(info.id).await.unwrap();
        assert!(matches!(
            store.open(info.id).await,
            Err(AppError::ContentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_not_found() {
        let (store, _dir) = test_store(1024).await;
        assert!(matches!(
            store.open(Uuid::new_v4()).await,
            Err(AppError::ContentNotFound { .. })
        ));
    }
}
