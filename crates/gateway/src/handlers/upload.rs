//! Paper upload handler
//!
//! Multipart body: metadata text fields followed by a `file` part. The file is
//! streamed straight into blob storage, so metadata must precede it.
//!
//! Order of effects: validate metadata, require the ledger, store the blob,
//! create the content topic, insert metadata, announce on the registry topic.
//! A failure after the blob is stored deletes the blob again.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;

use crate::AppState;
use paperledger_common::{
    api::{CreatePaperRequest, PaperDocument, UploadResponse},
    db::NewPaper,
    errors::{AppError, Result},
    ledger::Ledger,
    metrics,
    storage::{BlobInfo, NewBlob},
};

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge { limit };
    }
    AppError::InvalidFormat {
        message: err.body_text(),
    }
}

/// JSON array (`["a","b"]`) or comma-separated text
fn parse_list(field: &str, text: &str) -> Result<Vec<String>> {
    let text = text.trim();
    if text.starts_with('[') {
        return serde_json::from_str(text).map_err(|e| AppError::Validation {
            message: format!("{} must be a JSON array of strings: {}", field, e),
            field: Some(field.to_string()),
        });
    }
    Ok(text
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn parse_fee(text: &str) -> Result<f64> {
    text.trim().parse().map_err(|_| AppError::Validation {
        message: "fee must be a number".to_string(),
        field: Some("fee".to_string()),
    })
}

/// RFC 3339 timestamp or a plain `YYYY-MM-DD` date
fn parse_date(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::Validation {
            message: "publishDate must be an RFC 3339 timestamp or YYYY-MM-DD".to_string(),
            field: Some("publishDate".to_string()),
        })
}

fn apply_field(request: &mut CreatePaperRequest, name: &str, text: String) -> Result<()> {
    match name {
        "paperId" => request.paper_id = Some(text),
        "title" => request.title = Some(text),
        "authors" => request.authors = Some(parse_list("authors", &text)?),
        "abstract" => request.abstract_text = Some(text),
        "keywords" => request.keywords = Some(parse_list("keywords", &text)?),
        "publisherId" => request.publisher_id = Some(text),
        "fee" if !text.trim().is_empty() => request.fee = Some(parse_fee(&text)?),
        "publishDate" if !text.trim().is_empty() => {
            request.publish_date = Some(parse_date(&text)?)
        }
        other => tracing::debug!(field = other, "Ignoring unknown upload field"),
    }
    Ok(())
}

/// Media type without parameters, lowercased
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub async fn upload_paper(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let limit = state.config.server.max_upload_bytes;
    let to_app_error = move |e| multipart_error(e, limit);

    let mut request = CreatePaperRequest::default();
    let mut stored: Option<(NewPaper, Arc<dyn Ledger>, BlobInfo)> = None;

    while let Some(field) = multipart.next_field().await.map_err(to_app_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name != "file" {
            if stored.is_some() {
                tracing::debug!(field = %name, "Ignoring field after file part");
                continue;
            }
            let text = field.text().await.map_err(to_app_error)?;
            apply_field(&mut request, &name, text)?;
            continue;
        }

        if stored.is_some() {
            return Err(AppError::Validation {
                message: "only one file may be uploaded".to_string(),
                field: Some("file".to_string()),
            });
        }

        // Metadata is complete once the file part starts
        let new_paper = std::mem::take(&mut request).into_new_paper()?;
        // Early duplicate check; the insert still enforces uniqueness
        if state.papers.find_paper(&new_paper.id).await?.is_some() {
            return Err(AppError::DuplicatePaper { id: new_paper.id });
        }
        let ledger = state.require_ledger()?.clone();

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let media_type = field
            .content_type()
            .map(essence)
            .filter(|t| t != "application/octet-stream")
            .unwrap_or_else(|| {
                mime_guess::from_path(&original_name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            });

        if !state
            .config
            .server
            .allowed_media_types
            .iter()
            .any(|allowed| essence(allowed) == media_type)
        {
            return Err(AppError::UnsupportedMediaType { media_type });
        }

        let body = field.map_err(to_app_error);
        let blob = state
            .blobs
            .put(
                NewBlob {
                    original_name,
                    media_type,
                },
                Box::pin(body),
            )
            .await?;

        stored = Some((new_paper, ledger, blob));
    }

    let Some((new_paper, ledger, blob)) = stored else {
        return Err(AppError::missing("file"));
    };

    match register(&state, ledger.as_ref(), new_paper, &blob).await {
        Ok((paper, registry_sequence)) => {
            metrics::record_paper_created("upload", blob.size);
            tracing::info!(
                paper_id = %paper.summary.paper_id,
                content_id = %blob.id,
                size = blob.size,
                "Paper uploaded"
            );
            Ok((
                StatusCode::CREATED,
                Json(UploadResponse {
                    paper,
                    file: blob,
                    registry_sequence,
                }),
            ))
        }
        Err(e) => {
            if let Err(cleanup) = state.blobs.delete(blob.id).await {
                tracing::warn!(content_id = %blob.id, error = %cleanup, "Failed to remove orphaned blob");
            }
            Err(e)
        }
    }
}

/// Create the content topic and insert the metadata row, then announce it
async fn register(
    state: &AppState,
    ledger: &dyn Ledger,
    mut new_paper: NewPaper,
    blob: &BlobInfo,
) -> Result<(PaperDocument, Option<u64>)> {
    let topic_id = ledger
        .create_topic(&format!("PaperLedger paper {}", new_paper.id))
        .await?;

    new_paper.content_id = Some(blob.id);
    new_paper.topic_id = Some(topic_id.clone());
    let paper = state.papers.insert_paper(new_paper).await?;

    // The row is in place; a registry failure must not undo it
    let registry_sequence = match &state.registry_topic {
        Some(registry) => {
            let message = json!({
                "paperId": paper.id,
                "topicId": topic_id,
                "contentId": blob.id,
            });
            match ledger
                .submit_message(registry, message.to_string().as_bytes())
                .await
            {
                Ok(receipt) => Some(receipt.sequence_number),
                Err(e) => {
                    tracing::warn!(paper_id = %paper.id, error = %e, "Registry announcement failed");
                    None
                }
            }
        }
        None => None,
    };

    Ok((PaperDocument::from(&paper), registry_sequence))
}
