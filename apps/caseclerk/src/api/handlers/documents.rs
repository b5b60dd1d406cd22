//! Document upload, metadata and analysis.

use axum::extract::{Multipart, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use caseclerk_core::ai::analyze_document;
use caseclerk_core::model::{DocumentFilter, DocumentUpdate, NewDocument, is_allowed_document_type};
use caseclerk_core::{
    CaseId, CoreError, Database, Document, DocumentId, DocumentStatus, DocumentType,
    MAX_DOCUMENT_BYTES,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::multipart::read_form;
use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{AuthUser, ListQuery, PathId, ValidJson, ValidQuery, parse_filter};
use crate::api::response::{Envelope, created, deleted, ok, paged};

#[derive(Debug, Default, Deserialize)]
pub struct DocumentQuery {
    pub case_id: Option<u64>,
    pub document_type: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

impl DocumentQuery {
    fn filter(self) -> ApiResult<DocumentFilter> {
        Ok(DocumentFilter {
            case_id: self.case_id.map(CaseId),
            document_type: parse_filter(self.document_type)?,
            status: parse_filter(self.status)?,
            search: self.search,
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidQuery(list): ValidQuery<ListQuery>,
    ValidQuery(query): ValidQuery<DocumentQuery>,
) -> ApiResult<Envelope<Vec<Document>>> {
    let (filter, params) = (query.filter()?, list.params()?);
    let page = state.db.read().await.list_documents(&filter, &params)?;
    Ok(paged(page))
}

/// `multipart/form-data` with a `file` part and optional `title`,
/// `case_id`, `document_type` and comma separated `tags`.
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Envelope<Document>)> {
    let mut form = read_form(multipart, MAX_DOCUMENT_BYTES).await?;
    let file = form.take_file()?;
    if !is_allowed_document_type(&file.content_type) {
        return Err(ApiError::UnsupportedMediaType(format!(
            "'{}' is not an accepted document type",
            file.content_type
        )));
    }
    let case_id = form
        .field("case_id")
        .map(|raw| {
            raw.parse::<u64>()
                .map(CaseId)
                .map_err(|_| CoreError::validation("case_id", format!("'{}' is not an id", raw)))
        })
        .transpose()?;
    let document_type = match form.field("document_type") {
        Some(raw) => raw.parse::<DocumentType>()?,
        None => DocumentType::default(),
    };
    let tags = form
        .field("tags")
        .map(|raw| raw.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    let new = NewDocument {
        case_id,
        title: form.field("title").unwrap_or_default().to_string(),
        file_name: file.file_name,
        mime_type: file.content_type,
        document_type,
        tags,
    };

    let document = state
        .db
        .write()
        .await
        .create_document(new, file.bytes, Some(auth.id), Utc::now())?;
    tracing::info!(
        document_id = %document.id,
        size = document.file_size,
        mime = %document.mime_type,
        "document uploaded"
    );
    Ok(created(document))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<DocumentId>,
) -> ApiResult<Envelope<Document>> {
    let db = state.db.read().await;
    Ok(ok(db.get_document(id)?.clone()))
}

pub async fn update(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<DocumentId>,
    ValidJson(update): ValidJson<DocumentUpdate>,
) -> ApiResult<Envelope<Document>> {
    let document = state
        .db
        .write()
        .await
        .update_document(id, update, Utc::now())?;
    tracing::info!(document_id = %id, "document updated");
    Ok(ok(document))
}

pub async fn delete(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<DocumentId>,
) -> ApiResult<Envelope<Value>> {
    state.db.write().await.delete_document(id)?;
    tracing::info!(document_id = %id, "document deleted");
    Ok(deleted(id))
}

/// The stored bytes with their original content type.
pub async fn download(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<DocumentId>,
) -> ApiResult<Response> {
    let (document, bytes) = {
        let db = state.db.read().await;
        (db.get_document(id)?.clone(), db.document_content(id)?.to_vec())
    };
    let content_type = HeaderValue::from_str(&document.mime_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.file_name.replace(['"', '\\', '\r', '\n'], "_")
    );
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or(HeaderValue::from_static("attachment"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Runs the analysis and stores summary, text and key points.
pub async fn summarize(
    State(state): State<AppState>,
    _auth: AuthUser,
    PathId(id): PathId<DocumentId>,
) -> ApiResult<Envelope<Document>> {
    let (document, content) = {
        let mut db = state.db.write().await;
        let content = db.document_content(id)?.to_vec();
        let document = db.set_document_status(id, DocumentStatus::Processing, Utc::now())?;
        (document, content)
    };
    let guard = ProcessingGuard::new(state.db.clone(), id);
    state.simulate_ai_latency().await;
    let analysis = analyze_document(&document, &content);
    let document = state
        .db
        .write()
        .await
        .apply_document_analysis(id, analysis, Utc::now())?;
    guard.disarm();
    tracing::info!(document_id = %id, "document summarized");
    Ok(ok(document))
}

/// Marks a document `failed` if its analysis is abandoned before the
/// result is stored, e.g. when the client disconnects mid-request.
struct ProcessingGuard {
    db: Arc<RwLock<Database>>,
    id: DocumentId,
    armed: bool,
}

impl ProcessingGuard {
    fn new(db: Arc<RwLock<Database>>, id: DocumentId) -> Self {
        Self { db, id, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let id = self.id;
        if let Ok(mut db) = self.db.try_write() {
            mark_failed(&mut db, id);
            return;
        }
        let db = self.db.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    mark_failed(&mut *db.write().await, id);
                });
            }
            Err(_) => {
                tracing::warn!(document_id = %id, "analysis abandoned, status left as processing")
            }
        }
    }
}

fn mark_failed(db: &mut Database, id: DocumentId) {
    match db.set_document_status(id, DocumentStatus::Failed, Utc::now()) {
        Ok(_) => tracing::warn!(document_id = %id, "analysis abandoned, document marked failed"),
        Err(err) => tracing::debug!(document_id = %id, error = %err, "abandoned document is gone"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database_with_document() -> (Arc<RwLock<Database>>, DocumentId) {
        let mut db = Database::new();
        let document = db
            .create_document(
                NewDocument {
                    title: "Settlement memo".to_string(),
                    file_name: "memo.txt".to_string(),
                    mime_type: "text/plain".to_string(),
                    ..NewDocument::default()
                },
                b"The parties agree to settle.".to_vec(),
                None,
                Utc::now(),
            )
            .unwrap();
        db.set_document_status(document.id, DocumentStatus::Processing, Utc::now())
            .unwrap();
        (Arc::new(RwLock::new(db)), document.id)
    }

    #[tokio::test]
    async fn abandoned_analysis_marks_document_failed() {
        let (db, id) = database_with_document();
        drop(ProcessingGuard::new(db.clone(), id));
        let status = db.read().await.get_document(id).unwrap().status;
        assert_eq!(status, DocumentStatus::Failed);
    }

    #[tokio::test]
    async fn finished_analysis_keeps_its_status() {
        let (db, id) = database_with_document();
        let guard = ProcessingGuard::new(db.clone(), id);
        db.write()
            .await
            .set_document_status(id, DocumentStatus::Processed, Utc::now())
            .unwrap();
        guard.disarm();
        let status = db.read().await.get_document(id).unwrap().status;
        assert_eq!(status, DocumentStatus::Processed);
    }

    #[tokio::test]
    async fn guard_waits_for_a_busy_lock() {
        let (db, id) = database_with_document();
        let held = db.clone().write_owned().await;
        drop(ProcessingGuard::new(db.clone(), id));
        drop(held);
        let mut status = DocumentStatus::Processing;
        for _ in 0..100 {
            tokio::task::yield_now().await;
            status = db.read().await.get_document(id).unwrap().status;
            if status == DocumentStatus::Failed {
                break;
            }
        }
        assert_eq!(status, DocumentStatus::Failed);
    }
}
