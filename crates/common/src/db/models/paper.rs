//! Paper entity

use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

use super::chat_session::RelatedPaper;

/// Ordered list of strings stored as a JSONB array
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct StringList(pub Vec<String>);

impl StringList {
    /// Build a keyword set: trimmed, case-insensitively deduplicated,
    /// first spelling wins
    pub fn keyword_set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = std::collections::HashSet::new();
        let keywords = items
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .filter(|k| seen.insert(k.to_lowercase()))
            .collect();
        Self(keywords)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub authors: StringList,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub keywords: StringList,

    /// Blob id of the uploaded file, if any
    pub content_id: Option<Uuid>,

    /// Ledger topic created for the paper's content
    #[sea_orm(column_type = "Text", nullable)]
    pub topic_id: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub publisher_id: String,

    #[sea_orm(column_type = "Double")]
    pub fee: f64,

    pub published_at: DateTimeWithTimeZone,

    pub access_count: i64,

    pub last_accessed_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether a file was uploaded for this paper
    pub fn has_content(&self) -> bool {
        self.content_id.is_some()
    }

    /// Session snapshot built from the stored row, so price and content
    /// location always come from the catalogue
    pub fn to_related(&self) -> RelatedPaper {
        RelatedPaper {
            paper_id: self.id.clone(),
            title: self.title.clone(),
            fee: self.fee,
            content_id: self.content_id,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
