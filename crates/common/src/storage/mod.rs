//! Blob storage for uploaded paper files
//!
//! Bytes are streamed in chunk by chunk, hashed and size-checked on the way.
//! A write that exceeds the ceiling is aborted and the partial blob removed.

mod fs;
mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stream of file chunks
pub type ByteStream<'a> = BoxStream<'a, Result<Bytes>>;

/// Metadata supplied with a new blob
#[derive(Debug, Clone)]
pub struct NewBlob {
    pub original_name: String,
    pub media_type: String,
}

/// Stored blob metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    pub id: Uuid,
    pub original_name: String,
    pub media_type: String,
    pub size: u64,
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Bucket-style store keyed by generated ids
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stream `body` into a new blob
    async fn put<'a>(&self, blob: NewBlob, body: ByteStream<'a>) -> Result<BlobInfo>;

    /// Open a blob for streamed reading
    async fn open(&self, id: Uuid) -> Result<(BlobInfo, ByteStream<'static>)>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Largest accepted blob, in bytes
    fn max_size(&self) -> usize;

    /// Read a whole blob into memory
    async fn read_to_end(&self, id: Uuid) -> Result<(BlobInfo, Vec<u8>)> {
        let (info, mut stream) = self.open(id).await?;
        let mut data = Vec::with_capacity(info.size as usize);
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok((info, data))
    }
}

/// Running size and digest of a blob being written
pub(crate) struct BlobDigest {
    hasher: Sha256,
    size: u64,
    limit: usize,
}

impl BlobDigest {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            hasher: Sha256::new(),
            size: 0,
            limit,
        }
    }

    /// Account for a chunk; fails once the running size passes the limit
    pub(crate) fn update(&mut self, chunk: &[u8]) -> Result<()> {
        self.size += chunk.len() as u64;
        if self.size > self.limit as u64 {
            return Err(AppError::PayloadTooLarge { limit: self.limit });
        }
        self.hasher.update(chunk);
        Ok(())
    }

    pub(crate) fn finish(self, id: Uuid, blob: NewBlob) -> Result<BlobInfo> {
        if self.size == 0 {
            return Err(AppError::Validation {
                message: "Uploaded file is empty".to_string(),
                field: Some("file".to_string()),
            });
        }
        Ok(BlobInfo {
            id,
            original_name: blob.original_name,
            media_type: blob.media_type,
            size: self.size,
            sha256: hex::encode(self.hasher.finalize()),
            uploaded_at: Utc::now(),
        })
    }
}

#[cfg(test)]
pub(crate) fn chunks(parts: &[&'static [u8]]) -> ByteStream<'static> {
    let items: Vec<Result<Bytes>> = parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
    futures::stream::iter(items).boxed()
}
