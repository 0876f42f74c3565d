//! HTTP client for the gateway API

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

use paperledger_common::{
    api::{ChatRequest, ChatResponse, PaperSummary, SessionUpdate, SessionView},
    errors::ErrorResponse,
};

/// Downloaded paper file
#[derive(Debug, Clone)]
pub struct Content {
    pub media_type: String,
    pub bytes: Bytes,
}

/// The gateway operations the agent relies on
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn search_papers(&self, query: &str) -> Result<Vec<PaperSummary>>;

    async fn download_content(&self, paper_id: &str) -> Result<Content>;

    async fn create_session(&self) -> Result<SessionView>;

    async fn get_session(&self, id: Uuid) -> Result<SessionView>;

    async fn update_session(&self, id: Uuid, update: &SessionUpdate) -> Result<SessionView>;

    async fn quote(&self, id: Uuid) -> Result<SessionView>;

    async fn pay(&self, id: Uuid) -> Result<SessionView>;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Turn a non-2xx response into an error carrying the gateway's message
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => bail!("{} ({:?})", err.error.message, err.error.code),
            Err(_) => bail!("Gateway returned {}: {}", status, body),
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let response = Self::check(response).await?;
        response
            .json()
            .await
            .context("Failed to decode gateway response")
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn search_papers(&self, query: &str) -> Result<Vec<PaperSummary>> {
        let response = self
            .client
            .get(self.url("/papers"))
            .query(&[("q", query)])
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn download_content(&self, paper_id: &str) -> Result<Content> {
        let response = self
            .client
            .get(self.url(&format!("/papers/{}/content", paper_id)))
            .send()
            .await?;
        let response = Self::check(response).await?;

        let media_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await?;

        tracing::debug!(paper_id, size = bytes.len(), media_type = %media_type, "Content downloaded");
        Ok(Content { media_type, bytes })
    }

    async fn create_session(&self) -> Result<SessionView> {
        let response = self.client.post(self.url("/sessions")).send().await?;
        Self::decode(response).await
    }

    async fn get_session(&self, id: Uuid) -> Result<SessionView> {
        let response = self
            .client
            .get(self.url(&format!("/sessions/{}", id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn update_session(&self, id: Uuid, update: &SessionUpdate) -> Result<SessionView> {
        let response = self
            .client
            .put(self.url(&format!("/sessions/{}", id)))
            .json(update)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn quote(&self, id: Uuid) -> Result<SessionView> {
        let response = self
            .client
            .post(self.url(&format!("/sessions/{}/quote", id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn pay(&self, id: Uuid) -> Result<SessionView> {
        let response = self
            .client
            .post(self.url(&format!("/sessions/{}/pay", id)))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(self.url("/chat"))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }
}
