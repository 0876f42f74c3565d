//! In-process store for development and tests

use crate::db::models::{ChatSession, Paper, StringList};
use crate::db::{search_terms, NewPaper, PaperStore, ScoredPaper, SessionStore};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const TITLE_WEIGHT: f64 = 3.0;
const KEYWORD_WEIGHT: f64 = 2.0;
const ABSTRACT_WEIGHT: f64 = 1.0;

/// Papers and sessions held in maps behind async locks
#[derive(Clone, Default)]
pub struct MemoryStore {
    papers: Arc<RwLock<HashMap<String, Paper>>>,
    sessions: Arc<RwLock<HashMap<Uuid, ChatSession>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_newest_first(papers: &mut [Paper]) {
    papers.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn relevance(paper: &Paper, terms: &[String]) -> f64 {
    let title = search_terms(&paper.title);
    let abstract_text = search_terms(&paper.abstract_text);
    let keywords: Vec<String> = paper
        .keywords
        .as_slice()
        .iter()
        .flat_map(|k| search_terms(k))
        .collect();

    terms
        .iter()
        .map(|term| {
            let hits = |words: &[String]| words.iter().filter(|w| *w == term).count() as f64;
            hits(&title) * TITLE_WEIGHT
                + hits(&keywords) * KEYWORD_WEIGHT
                + hits(&abstract_text) * ABSTRACT_WEIGHT
        })
        .sum()
}

#[async_trait]
impl PaperStore for MemoryStore {
    async fn insert_paper(&self, paper: NewPaper) -> Result<Paper> {
        let mut papers = self.papers.write().await;
        if papers.contains_key(&paper.id) {
            return Err(AppError::DuplicatePaper { id: paper.id });
        }

        let now = Utc::now();
        let model = Paper {
            id: paper.id.clone(),
            title: paper.title,
            authors: StringList(paper.authors),
            abstract_text: paper.abstract_text,
            keywords: StringList::keyword_set(paper.keywords),
            content_id: paper.content_id,
            topic_id: paper.topic_id,
            publisher_id: paper.publisher_id,
            fee: paper.fee,
            published_at: paper.published_at.unwrap_or(now).into(),
            access_count: 0,
            last_accessed_at: None,
            created_at: now.into(),
        };

        papers.insert(paper.id, model.clone());
        Ok(model)
    }

    async fn find_paper(&self, id: &str) -> Result<Option<Paper>> {
        Ok(self.papers.read().await.get(id).cloned())
    }

    async fn list_papers(&self) -> Result<Vec<Paper>> {
        let mut papers: Vec<Paper> = self.papers.read().await.values().cloned().collect();
        sort_newest_first(&mut papers);
        Ok(papers)
    }

    async fn search_papers(&self, query: &str) -> Result<Vec<ScoredPaper>> {
        if query.trim().is_empty() {
            let papers = self.list_papers().await?;
            return Ok(papers
                .into_iter()
                .map(|paper| ScoredPaper { paper, score: 0.0 })
                .collect());
        }

        let terms = search_terms(query);
        let mut hits: Vec<ScoredPaper> = self
            .list_papers()
            .await?
            .into_iter()
            .map(|paper| {
                let score = relevance(&paper, &terms);
                ScoredPaper { paper, score }
            })
            .filter(|hit| hit.score > 0.0)
            .collect();

        // Stable sort keeps the newest-first order among equal scores
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits)
    }

    async fn record_access(&self, id: &str) -> Result<Option<Paper>> {
        let mut papers = self.papers.write().await;
        Ok(papers.get_mut(id).map(|paper| {
            paper.access_count += 1;
            paper.last_accessed_at = Some(Utc::now().into());
            paper.clone()
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self) -> Result<ChatSession> {
        let session = ChatSession::new(Uuid::new_v4());
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<ChatSession>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn save_session(&self, mut session: ChatSession) -> Result<ChatSession> {
        let mut sessions = self.sessions.write().await;
        let Some(stored) = sessions.get_mut(&session.id) else {
            return Err(AppError::SessionNotFound {
                id: session.id.to_string(),
            });
        };
        session.created_at = stored.created_at;
        session.touch();
        *stored = session.clone();
        Ok(session)
    }
}
