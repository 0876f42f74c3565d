//! Paper catalogue handlers

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use std::time::Instant;

use crate::extract::ApiJson;
use crate::AppState;
use paperledger_common::{
    api::{CreatePaperRequest, PaperDocument, PaperSummary},
    errors::{AppError, Result},
    metrics,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
}

/// List papers, or search them when `q` is given
pub async fn list_papers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PaperSummary>>> {
    let papers = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => {
            let start = Instant::now();
            let hits = state.papers.search_papers(q).await?;
            metrics::record_search(start.elapsed().as_secs_f64(), "catalogue", hits.len());
            hits.into_iter().map(|hit| hit.paper).collect()
        }
        _ => state.papers.list_papers().await?,
    };

    Ok(Json(papers.iter().map(PaperSummary::from).collect()))
}

/// Fetch a paper; each fetch counts as an access
pub async fn get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<PaperDocument>> {
    let paper = state
        .papers
        .record_access(&paper_id)
        .await?
        .ok_or(AppError::PaperNotFound { id: paper_id })?;

    Ok(Json(PaperDocument::from(&paper)))
}

/// Create paper metadata without a file
pub async fn create_paper(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreatePaperRequest>,
) -> Result<(StatusCode, Json<PaperDocument>)> {
    let new_paper = request.into_new_paper()?;
    let paper = state.papers.insert_paper(new_paper).await?;

    metrics::record_paper_created("json", 0);
    tracing::info!(paper_id = %paper.id, "Paper created");

    Ok((StatusCode::CREATED, Json(PaperDocument::from(&paper))))
}

/// Stream the uploaded file of a paper
pub async fn get_content(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Response> {
    let paper = state
        .papers
        .find_paper(&paper_id)
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            id: paper_id.clone(),
        })?;

    let content_id = paper
        .content_id
        .ok_or(AppError::ContentNotFound { id: paper_id })?;

    let (info, stream) = state.blobs.open(content_id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        info.original_name.replace(['"', '\\', '\r', '\n'], "_")
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, info.media_type)
        .header(header::CONTENT_LENGTH, info.size)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal {
            message: format!("Failed to build response: {}", e),
        })
}
