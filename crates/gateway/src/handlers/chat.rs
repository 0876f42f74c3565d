//! Chat handler: catalogue search plus an LLM reply

use axum::{extract::State, Json};
use std::time::Instant;

use crate::extract::ApiJson;
use crate::AppState;
use paperledger_common::{
    api::{ChatPaper, ChatRequest, ChatResponse},
    db::models::MessageRole,
    errors::{AppError, Result},
    llm::{chat_prompt, PromptPaper},
    metrics,
};

/// Papers passed to the model and returned to the caller
const MAX_CHAT_PAPERS: usize = 5;

pub async fn chat(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let message = request
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::missing("message"))?;

    let session = match request.session_id {
        Some(id) => Some(
            state
                .sessions
                .find_session(id)
                .await?
                .ok_or(AppError::SessionNotFound { id: id.to_string() })?,
        ),
        None => None,
    };

    let start = Instant::now();
    let hits = state.papers.search_papers(&message).await?;
    metrics::record_search(start.elapsed().as_secs_f64(), "chat", hits.len());

    let papers: Vec<_> = hits
        .into_iter()
        .take(MAX_CHAT_PAPERS)
        .map(|hit| hit.paper)
        .collect();

    let prompt_papers: Vec<PromptPaper<'_>> = papers
        .iter()
        .map(|p| PromptPaper {
            title: &p.title,
            authors: p.authors.as_slice(),
            fee: p.fee,
        })
        .collect();
    let prompt = chat_prompt(&message, &prompt_papers);
    let reply = state.chat_model.complete(&prompt.system, &prompt.user).await?;

    if let Some(mut session) = session {
        session.push_message(MessageRole::User, message.as_str());
        session.push_message(MessageRole::Assistant, reply.as_str());
        // A paid session keeps its selection; chat still answers
        if !papers.is_empty() && !session.is_paid() {
            session.select_papers(papers.iter().map(|p| p.to_related()).collect())?;
        }
        state.sessions.save_session(session).await?;
    }

    tracing::debug!(matches = papers.len(), model = state.chat_model.model_name(), "Chat answered");

    Ok(Json(ChatResponse {
        reply,
        papers: papers.iter().map(ChatPaper::from).collect(),
    }))
}
