//! Session handlers: the search → quote → pay flow driven by the agent

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::extract::ApiJson;
use crate::AppState;
use paperledger_common::{
    api::{SessionUpdate, SessionView},
    db::models::{ChatSession, MessageLog, Quote, RelatedPaper},
    errors::{AppError, Result},
};

async fn load(state: &AppState, id: Uuid) -> Result<ChatSession> {
    state
        .sessions
        .find_session(id)
        .await?
        .ok_or(AppError::SessionNotFound { id: id.to_string() })
}

/// Rebuild a selection from the catalogue. Only the ids of the client's
/// entries are used; title, fee and content location come from the stored
/// paper, and an unknown id fails the whole request.
async fn resolve_selection(state: &AppState, papers: &[RelatedPaper]) -> Result<Vec<RelatedPaper>> {
    let mut resolved = Vec::with_capacity(papers.len());
    for entry in papers {
        let paper = state
            .papers
            .find_paper(&entry.paper_id)
            .await?
            .ok_or_else(|| AppError::PaperNotFound {
                id: entry.paper_id.clone(),
            })?;
        resolved.push(paper.to_related());
    }
    Ok(resolved)
}

/// Create a new session
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>)> {
    let session = state.sessions.create_session().await?;
    tracing::info!(session_id = %session.id, "Session created");
    Ok((StatusCode::CREATED, Json(SessionView::from(session))))
}

/// Get session state
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    Ok(Json(SessionView::from(load(&state, session_id).await?)))
}

/// Replace the message log and/or the paper selection
///
/// Selected papers are resolved against the catalogue. A changed selection
/// invalidates any quote or failed payment, and is refused once the session
/// is paid.
pub async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    ApiJson(update): ApiJson<SessionUpdate>,
) -> Result<Json<SessionView>> {
    let mut session = load(&state, session_id).await?;

    if let Some(messages) = update.messages {
        session.messages = MessageLog(messages);
    }
    if let Some(papers) = update.related_papers {
        let papers = resolve_selection(&state, &papers).await?;
        if papers != session.related_papers.0 {
            session.select_papers(papers)?;
        }
    }

    let session = state.sessions.save_session(session).await?;
    Ok(Json(SessionView::from(session)))
}

/// Price the selected papers at their current catalogue fees
pub async fn quote_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    let mut session = load(&state, session_id).await?;
    if session.is_paid() {
        return Err(AppError::InvalidSessionState {
            message: "session is already paid".to_string(),
        });
    }

    let papers = resolve_selection(&state, &session.related_papers.0).await?;
    session.related_papers.0 = papers.clone();
    let quote = Quote::compute(papers, state.config.payment.platform_fee_percent);
    session.apply_quote(quote)?;

    let session = state.sessions.save_session(session).await?;
    tracing::info!(
        session_id = %session_id,
        total = session.quote.as_ref().map(|q| q.total).unwrap_or_default(),
        "Quote issued"
    );
    Ok(Json(SessionView::from(session)))
}

/// Settle the current quote
///
/// Settlement failure is recorded on the session before the error is returned.
pub async fn pay_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    let mut session = load(&state, session_id).await?;
    let quote = session.payable_quote()?.clone();

    match state.payments.settle(session_id, &quote).await {
        Ok(receipt) => {
            session.mark_paid(receipt);
            let session = state.sessions.save_session(session).await?;
            tracing::info!(session_id = %session_id, mode = state.payments.mode(), "Session paid");
            Ok(Json(SessionView::from(session)))
        }
        Err(e) => {
            session.mark_failed();
            state.sessions.save_session(session).await?;
            Err(e)
        }
    }
}
