//! Chat session entity for the conversational agent

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Payment status enum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "paid" => PaymentStatus::Paid,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => "pending".to_string(),
            PaymentStatus::Paid => "paid".to_string(),
            PaymentStatus::Failed => "failed".to_string(),
        }
    }
}

/// Where a session is in the search → quote → pay flow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    Idle,
    PapersSelected,
    Quoted,
    Paid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    pub time: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct MessageLog(pub Vec<ChatMessage>);

/// Denormalized snapshot of a paper attached to a session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPaper {
    pub paper_id: String,
    pub title: String,
    pub fee: f64,
    pub content_id: Option<Uuid>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct RelatedPapers(pub Vec<RelatedPaper>);

/// Cost quote for the selected papers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub papers_cost: f64,
    pub platform_fee: f64,
    pub total: f64,
    pub papers: Vec<RelatedPaper>,
}

/// Outcome of settling a quote
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    /// True when no value moved on the ledger
    pub simulated: bool,
    pub transaction_id: Option<String>,
    pub amount: f64,
    pub paper_ids: Vec<String>,
    pub settled_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chat_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "JsonBinary")]
    pub messages: MessageLog,

    #[sea_orm(column_type = "JsonBinary")]
    pub related_papers: RelatedPapers,

    #[sea_orm(column_type = "Text")]
    pub payment_status: String,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub quote: Option<Quote>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub payment: Option<PaymentReceipt>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Fresh session with an empty log
    pub fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: MessageLog::default(),
            related_papers: RelatedPapers::default(),
            payment_status: PaymentStatus::Pending.into(),
            quote: None,
            payment: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    /// Get the payment status as an enum
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from(self.payment_status.clone())
    }

    pub fn stage(&self) -> SessionStage {
        if self.status() == PaymentStatus::Paid {
            SessionStage::Paid
        } else if self.quote.is_some() {
            SessionStage::Quoted
        } else if !self.related_papers.0.is_empty() {
            SessionStage::PapersSelected
        } else {
            SessionStage::Idle
        }
    }

    pub fn push_message(&mut self, role: MessageRole, text: impl Into<String>) {
        self.messages.0.push(ChatMessage {
            role,
            text: text.into(),
            time: Utc::now(),
        });
    }

    pub fn is_paid(&self) -> bool {
        self.status() == PaymentStatus::Paid
    }

    /// Replace the selection. Any previous quote or failed payment no
    /// longer applies to the new set of papers. A paid session keeps its
    /// selection and receipt; a new purchase needs a new session.
    pub fn select_papers(&mut self, papers: Vec<RelatedPaper>) -> crate::errors::Result<()> {
        if self.is_paid() {
            return Err(AppError::InvalidSessionState {
                message: "session is already paid; open a new session to buy more papers"
                    .to_string(),
            });
        }
        self.related_papers = RelatedPapers(papers);
        self.quote = None;
        self.payment = None;
        self.payment_status = PaymentStatus::Pending.into();
        Ok(())
    }

    /// Attach a quote. Requires a non-empty selection that is not yet paid.
    pub fn apply_quote(&mut self, quote: Quote) -> crate::errors::Result<()> {
        if self.related_papers.0.is_empty() {
            return Err(AppError::InvalidSessionState {
                message: "no papers selected; search first".to_string(),
            });
        }
        if self.is_paid() {
            return Err(AppError::InvalidSessionState {
                message: "session is already paid".to_string(),
            });
        }
        self.quote = Some(quote);
        self.payment_status = PaymentStatus::Pending.into();
        Ok(())
    }

    /// The quote to settle. Requires a quote and a non-paid status.
    pub fn payable_quote(&self) -> crate::errors::Result<&Quote> {
        if self.is_paid() {
            return Err(AppError::InvalidSessionState {
                message: "session is already paid".to_string(),
            });
        }
        self.quote.as_ref().ok_or_else(|| AppError::InvalidSessionState {
            message: "no quote issued; request a quote first".to_string(),
        })
    }

    pub fn mark_paid(&mut self, receipt: PaymentReceipt) {
        self.payment = Some(receipt);
        self.payment_status = PaymentStatus::Paid.into();
    }

    pub fn mark_failed(&mut self) {
        self.payment = None;
        self.payment_status = PaymentStatus::Failed.into();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().into();
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
