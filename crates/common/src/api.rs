//! Wire types shared by the gateway and the agent
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::models::{
    ChatMessage, ChatSession, Paper, PaymentReceipt, PaymentStatus, Quote, RelatedPaper,
    SessionStage,
};
use crate::db::NewPaper;
use crate::errors::{AppError, Result};
use crate::storage::BlobInfo;

/// Paper metadata without its content location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperSummary {
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub topic_id: Option<String>,
    pub publisher_id: String,
    pub fee: f64,
    pub publish_date: DateTime<Utc>,
    pub access_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub has_content: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Paper> for PaperSummary {
    fn from(paper: &Paper) -> Self {
        Self {
            paper_id: paper.id.clone(),
            title: paper.title.clone(),
            authors: paper.authors.0.clone(),
            abstract_text: paper.abstract_text.clone(),
            keywords: paper.keywords.0.clone(),
            topic_id: paper.topic_id.clone(),
            publisher_id: paper.publisher_id.clone(),
            fee: paper.fee,
            publish_date: paper.published_at.with_timezone(&Utc),
            access_count: paper.access_count,
            last_accessed_at: paper.last_accessed_at.map(|t| t.with_timezone(&Utc)),
            has_content: paper.has_content(),
            created_at: paper.created_at.with_timezone(&Utc),
        }
    }
}

/// Full paper, including the content location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperDocument {
    #[serde(flatten)]
    pub summary: PaperSummary,
    pub content_id: Option<Uuid>,
}

impl From<&Paper> for PaperDocument {
    fn from(paper: &Paper) -> Self {
        Self {
            summary: PaperSummary::from(paper),
            content_id: paper.content_id,
        }
    }
}

/// Body of `POST /api/papers`; every field optional so that absence is
/// reported per field rather than as a parse failure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaperRequest {
    pub paper_id: Option<String>,
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub publisher_id: Option<String>,
    pub fee: Option<f64>,
    pub publish_date: Option<DateTime<Utc>>,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::missing(field)),
    }
}

impl CreatePaperRequest {
    /// Check required fields and fee, producing the paper to insert
    pub fn into_new_paper(self) -> Result<NewPaper> {
        let id = required(self.paper_id, "paperId")?;
        let title = required(self.title, "title")?;

        let authors: Vec<String> = self
            .authors
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if authors.is_empty() {
            return Err(AppError::missing("authors"));
        }

        let abstract_text = required(self.abstract_text, "abstract")?;
        let publisher_id = required(self.publisher_id, "publisherId")?;

        let fee = self.fee.unwrap_or(0.0);
        if !fee.is_finite() || fee < 0.0 {
            return Err(AppError::Validation {
                message: "fee must be a non-negative number".to_string(),
                field: Some("fee".to_string()),
            });
        }

        let paper = NewPaper {
            id,
            title,
            authors,
            abstract_text,
            keywords: self.keywords.unwrap_or_default(),
            publisher_id,
            fee,
            published_at: self.publish_date,
            content_id: None,
            topic_id: None,
        };
        paper.validate()?;
        Ok(paper)
    }
}

/// Response of `POST /api/papers/upload`: the created paper, with the stored
/// file and registry sequence alongside its fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(flatten)]
    pub paper: PaperDocument,
    pub file: BlobInfo,
    /// Registry message sequence number, when a registry topic exists
    pub registry_sequence: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub session_id: Option<Uuid>,
}

/// Paper entry of a chat reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPaper {
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub fee: f64,
}

impl From<&Paper> for ChatPaper {
    fn from(paper: &Paper) -> Self {
        Self {
            paper_id: paper.id.clone(),
            title: paper.title.clone(),
            authors: paper.authors.0.clone(),
            fee: paper.fee,
        }
    }
}

impl From<&PaperSummary> for ChatPaper {
    fn from(paper: &PaperSummary) -> Self {
        Self {
            paper_id: paper.paper_id.clone(),
            title: paper.title.clone(),
            authors: paper.authors.clone(),
            fee: paper.fee,
        }
    }
}

impl ChatPaper {
    /// Selection entry for a session update. The gateway replaces title,
    /// fee and content location with the stored values.
    pub fn to_related(&self) -> RelatedPaper {
        RelatedPaper {
            paper_id: self.paper_id.clone(),
            title: self.title.clone(),
            fee: self.fee,
            content_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub papers: Vec<ChatPaper>,
}

/// Body of `PUT /api/sessions/{id}`; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub messages: Option<Vec<ChatMessage>>,
    pub related_papers: Option<Vec<RelatedPaper>>,
}

/// Session as exposed over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub stage: SessionStage,
    pub payment_status: PaymentStatus,
    pub messages: Vec<ChatMessage>,
    pub related_papers: Vec<RelatedPaper>,
    pub quote: Option<Quote>,
    pub payment: Option<PaymentReceipt>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChatSession> for SessionView {
    fn from(session: ChatSession) -> Self {
        Self {
            id: session.id,
            stage: session.stage(),
            payment_status: session.status(),
            messages: session.messages.0,
            related_papers: session.related_papers.0,
            quote: session.quote,
            payment: session.payment,
            created_at: session.created_at.with_timezone(&Utc),
            updated_at: session.updated_at.with_timezone(&Utc),
        }
    }
}
