//! In-process bucket for tests and the `memory` provider

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BlobDigest, BlobInfo, BlobStore, ByteStream, NewBlob};
use crate::errors::{AppError, Result};

#[derive(Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<Uuid, (BlobInfo, Bytes)>>>,
    max_size: usize,
}

impl MemoryBlobStore {
    pub fn new(max_size: usize) -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            max_size,
        }
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put<'a>(&self, blob: NewBlob, mut body: ByteStream<'a>) -> Result<BlobInfo> {
        let mut digest = BlobDigest::new(self.max_size);
        let mut data = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            digest.update(&chunk)?;
            data.extend_from_slice(&chunk);
        }

        let info = digest.finish(Uuid::new_v4(), blob)?;
        self.blobs
            .write()
            .await
            .insert(info.id, (info.clone(), Bytes::from(data)));
        Ok(info)
    }

    async fn open(&self, id: Uuid) -> Result<(BlobInfo, ByteStream<'static>)> {
        let (info, data) = self
            .blobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::ContentNotFound { id: id.to_string() })?;

        Ok((info, futures::stream::once(async move { Ok(data) }).boxed()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.blobs
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::ContentNotFound { id: id.to_string() })
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}
