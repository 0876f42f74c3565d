//! PostgreSQL repository
//!
//! Implements the store traits on top of SeaORM. Full-text search uses
//! PostgreSQL's built-in `tsvector` ranking; terms are OR-combined so any
//! matching word qualifies a paper.

use crate::db::models::*;
use crate::db::{DbPool, NewPaper, PaperStore, ScoredPaper, SessionStore};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbBackend, DbErr, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr, Statement,
};
use std::collections::HashMap;
use uuid::Uuid;

const SEARCH_SQL: &str = r#"
    SELECT p.id, ts_rank_cd(d.doc, q.query)::float8 AS score
    FROM papers p
    CROSS JOIN LATERAL (
        SELECT setweight(to_tsvector('english', p.title), 'A')
            || setweight(jsonb_to_tsvector('english', p.keywords, '["string"]'), 'B')
            || setweight(to_tsvector('english', p.abstract_text), 'C') AS doc
    ) d
    CROSS JOIN (
        SELECT replace(plainto_tsquery('english', $1)::text, '&', '|')::tsquery AS query
    ) q
    WHERE d.doc @@ q.query
    ORDER BY score DESC, p.published_at DESC
"#;

/// Repository for data access operations
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }
}

#[async_trait]
impl PaperStore for Repository {
    async fn insert_paper(&self, paper: NewPaper) -> Result<Paper> {
        let now = chrono::Utc::now();
        let id = paper.id.clone();

        let model = PaperActiveModel {
            id: Set(paper.id),
            title: Set(paper.title),
            authors: Set(StringList(paper.authors)),
            abstract_text: Set(paper.abstract_text),
            keywords: Set(StringList::keyword_set(paper.keywords)),
            content_id: Set(paper.content_id),
            topic_id: Set(paper.topic_id),
            publisher_id: Set(paper.publisher_id),
            fee: Set(paper.fee),
            published_at: Set(paper.published_at.unwrap_or(now).into()),
            access_count: Set(0),
            last_accessed_at: Set(None),
            created_at: Set(now.into()),
        };

        model.insert(self.conn()).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicatePaper { id },
            _ => AppError::Database(e),
        })
    }

    async fn find_paper(&self, id: &str) -> Result<Option<Paper>> {
        PaperEntity::find_by_id(id.to_string())
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn list_papers(&self) -> Result<Vec<Paper>> {
        PaperEntity::find()
            .order_by_desc(PaperColumn::PublishedAt)
            .order_by_asc(PaperColumn::Id)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn search_papers(&self, query: &str) -> Result<Vec<ScoredPaper>> {
        if query.trim().is_empty() {
            let papers = self.list_papers().await?;
            return Ok(papers
                .into_iter()
                .map(|paper| ScoredPaper { paper, score: 0.0 })
                .collect());
        }

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, SEARCH_SQL, vec![query.into()]);

        let ranked: Vec<(String, f64)> = self
            .conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .filter_map(|row| {
                Some((
                    row.try_get_by_index::<String>(0).ok()?,
                    row.try_get_by_index::<f64>(1).ok()?,
                ))
            })
            .collect();

        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id: HashMap<String, Paper> = PaperEntity::find()
            .filter(PaperColumn::Id.is_in(ranked.iter().map(|(id, _)| id.clone())))
            .all(self.conn())
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| by_id.remove(&id).map(|paper| ScoredPaper { paper, score }))
            .collect())
    }

    async fn record_access(&self, id: &str) -> Result<Option<Paper>> {
        let result = PaperEntity::update_many()
            .col_expr(
                PaperColumn::AccessCount,
                Expr::col(PaperColumn::AccessCount).add(1),
            )
            .col_expr(
                PaperColumn::LastAccessedAt,
                Expr::value(sea_orm::Value::from(chrono::Utc::now().fixed_offset())),
            )
            .filter(PaperColumn::Id.eq(id))
            .exec(self.conn())
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.find_paper(id).await
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[async_trait]
impl SessionStore for Repository {
    async fn create_session(&self) -> Result<ChatSession> {
        let session = ChatSession::new(Uuid::new_v4());

        let model = ChatSessionActiveModel {
            id: Set(session.id),
            messages: Set(session.messages),
            related_papers: Set(session.related_papers),
            payment_status: Set(session.payment_status),
            quote: Set(session.quote),
            payment: Set(session.payment),
            created_at: Set(session.created_at),
            updated_at: Set(session.updated_at),
        };

        model.insert(self.conn()).await.map_err(Into::into)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<ChatSession>> {
        ChatSessionEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn save_session(&self, mut session: ChatSession) -> Result<ChatSession> {
        session.touch();
        let id = session.id;

        let model = ChatSessionActiveModel {
            id: Unchanged(session.id),
            messages: Set(session.messages),
            related_papers: Set(session.related_papers),
            payment_status: Set(session.payment_status),
            quote: Set(session.quote),
            payment: Set(session.payment),
            created_at: Unchanged(session.created_at),
            updated_at: Set(session.updated_at),
        };

        model.update(self.conn()).await.map_err(|e| match e {
            DbErr::RecordNotUpdated => AppError::SessionNotFound { id: id.to_string() },
            other => AppError::Database(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{MockDatabase, MockExecResult, Transaction, Value};
    use std::collections::BTreeMap;

    fn paper(id: &str, access_count: i64) -> Paper {
        let now = chrono::Utc::now().fixed_offset();
        Paper {
            id: id.to_string(),
            title: format!("Paper {}", id),
            authors: StringList(vec!["Ada".to_string()]),
            abstract_text: "x".to_string(),
            keywords: StringList::default(),
            content_id: None,
            topic_id: None,
            publisher_id: "pub1".to_string(),
            fee: 5.0,
            published_at: now,
            access_count,
            last_accessed_at: (access_count > 0).then_some(now),
            created_at: now,
        }
    }

    fn ranked(id: &str, score: f64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("id", Value::from(id)), ("score", Value::from(score))])
    }

    #[tokio::test]
    async fn test_search_binds_query_and_keeps_rank_order() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![ranked("p2", 0.9), ranked("p1", 0.4)]])
            // Rows come back from the id lookup in arbitrary order
            .append_query_results([vec![paper("p1", 0), paper("p2", 0)]])
            .into_connection();
        let repo = Repository::new(DbPool { primary: db });

        let hits = repo.search_papers("ledger payments").await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.paper.id.as_str()).collect();
        assert_eq!(ids, ["p2", "p1"]);
        assert_eq!(hits[0].score, 0.9);

        let log = repo.pool.primary.into_transaction_log();
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[0],
            Transaction::from_sql_and_values(
                DbBackend::Postgres,
                SEARCH_SQL,
                [Value::from("ledger payments")]
            )
        );
    }

    #[test]
    fn test_search_sql_or_combines_terms() {
        assert!(SEARCH_SQL.contains("replace(plainto_tsquery('english', $1)::text, '&', '|')"));
        assert!(SEARCH_SQL.contains("ORDER BY score DESC, p.published_at DESC"));
    }

    #[tokio::test]
    async fn test_search_without_matches_skips_lookup() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<BTreeMap<&'static str, Value>>::new()])
            .into_connection();
        let repo = Repository::new(DbPool { primary: db });

        assert!(repo.search_papers("nothing").await.unwrap().is_empty());
        assert_eq!(repo.pool.primary.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_record_access_increments_in_place() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![paper("p1", 1)]])
            .into_connection();
        let repo = Repository::new(DbPool { primary: db });

        let updated = repo.record_access("p1").await.unwrap().unwrap();
        assert_eq!(updated.access_count, 1);
        assert!(updated.last_accessed_at.is_some());

        let log = repo.pool.primary.into_transaction_log();
        assert_eq!(log.len(), 2);
        let update = format!("{:?}", log[0]);
        assert!(update.contains("UPDATE \\\"papers\\\""));
        assert!(update.contains("\\\"access_count\\\" + "));
    }

    #[tokio::test]
    async fn test_record_access_unknown_id() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let repo = Repository::new(DbPool { primary: db });

        assert!(repo.record_access("missing").await.unwrap().is_none());
        assert_eq!(repo.pool.primary.into_transaction_log().len(), 1);
    }
}
