//! Stand-in AI endpoints. Results are deterministic; only the latency is
//! simulated.

use axum::extract::{Multipart, State};
use caseclerk_core::ai::{
    DocumentAnalysis, MAX_AUDIO_BYTES, ResearchResult, Transcript, analyze_document,
    call_insights, is_allowed_audio_type, legal_research, summarize_text, transcribe_audio,
};
use caseclerk_core::{CallInsights, DocumentId};
use serde::{Deserialize, Serialize};

use super::multipart::read_form;
use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{AuthUser, ValidJson};
use crate::api::response::{Envelope, ok};

/// Either raw `text` or the id of a stored document.
#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub jurisdiction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Transcription {
    #[serde(flatten)]
    pub transcript: Transcript,
    pub insights: CallInsights,
}

pub async fn summarize(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidJson(req): ValidJson<SummarizeRequest>,
) -> ApiResult<Envelope<DocumentAnalysis>> {
    let analysis = match (req.document_id, req.text) {
        (Some(id), _) => {
            let (document, content) = {
                let db = state.db.read().await;
                let id = DocumentId(id);
                (db.get_document(id)?.clone(), db.document_content(id)?.to_vec())
            };
            state.simulate_ai_latency().await;
            analyze_document(&document, &content)
        }
        (None, Some(text)) if !text.trim().is_empty() => {
            state.simulate_ai_latency().await;
            summarize_text(&text)
        }
        _ => return Err(ApiError::validation("provide 'text' or 'document_id'")),
    };
    Ok(ok(analysis))
}

/// `multipart/form-data` with an audio `file` part.
pub async fn transcribe(
    State(state): State<AppState>,
    _auth: AuthUser,
    multipart: Multipart,
) -> ApiResult<Envelope<Transcription>> {
    let mut form = read_form(multipart, MAX_AUDIO_BYTES).await?;
    let file = form.take_file()?;
    if !is_allowed_audio_type(&file.content_type) {
        return Err(ApiError::UnsupportedMediaType(format!(
            "'{}' is not an accepted audio type",
            file.content_type
        )));
    }
    if file.bytes.is_empty() {
        return Err(ApiError::validation("uploaded file is empty"));
    }
    state.simulate_ai_latency().await;
    let transcript = transcribe_audio(&file.file_name, file.bytes.len() as u64);
    let insights = call_insights(&transcript.text);
    tracing::info!(
        file = %transcript.file_name,
        duration = transcript.duration_seconds,
        "audio transcribed"
    );
    Ok(ok(Transcription {
        transcript,
        insights,
    }))
}

pub async fn research(
    State(state): State<AppState>,
    _auth: AuthUser,
    ValidJson(req): ValidJson<ResearchRequest>,
) -> ApiResult<Envelope<ResearchResult>> {
    let result = legal_research(&req.query, req.jurisdiction.as_deref())?;
    state.simulate_ai_latency().await;
    Ok(ok(result))
}
