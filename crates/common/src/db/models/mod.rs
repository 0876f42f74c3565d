//! SeaORM entity models
//!
//! Database entities for PaperLedger

mod chat_session;
mod paper;

pub use paper::{
    Entity as PaperEntity,
    Model as Paper,
    ActiveModel as PaperActiveModel,
    Column as PaperColumn,
    StringList,
};

pub use chat_session::{
    Entity as ChatSessionEntity,
    Model as ChatSession,
    ActiveModel as ChatSessionActiveModel,
    Column as ChatSessionColumn,
    ChatMessage,
    MessageLog,
    MessageRole,
    PaymentReceipt,
    PaymentStatus,
    Quote,
    RelatedPaper,
    RelatedPapers,
    SessionStage,
};
