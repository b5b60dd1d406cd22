//! Shared reading of `multipart/form-data` uploads.

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use std::collections::BTreeMap;

use crate::api::error::{ApiError, ApiResult};

/// The `file` part of a form.
#[derive(Debug)]
pub(super) struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub(super) struct UploadForm {
    pub file: Option<UploadedFile>,
    /// Every other part, as text.
    pub fields: BTreeMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self) -> ApiResult<UploadedFile> {
        self.file
            .take()
            .ok_or_else(|| ApiError::validation("a 'file' part is required"))
    }
}

/// Reads the whole form. A file larger than `max_file_bytes` is `413`.
pub(super) async fn read_form(mut multipart: Multipart, max_file_bytes: u64) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let declared = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            if bytes.len() as u64 > max_file_bytes {
                return Err(ApiError::PayloadTooLarge(format!(
                    "file exceeds the {} MB limit",
                    max_file_bytes / (1024 * 1024)
                )));
            }
            let content_type = resolve_content_type(declared.as_deref(), &file_name);
            form.file = Some(UploadedFile {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let text = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, text);
        }
    }
    Ok(form)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::validation(err.body_text())
    }
}

/// The declared content type, or a guess from the extension when the client
/// sent none or a generic one.
fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(str::trim) {
        Some(mime) if !mime.is_empty() && mime != "application/octet-stream" => mime.to_string(),
        _ => guess_from_extension(file_name)
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

fn guess_from_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/x-m4a",
        "ogg" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_wins() {
        assert_eq!(resolve_content_type(Some("text/csv"), "a.txt"), "text/csv");
    }

    #[test]
    fn generic_type_falls_back_to_extension() {
        assert_eq!(
            resolve_content_type(Some("application/octet-stream"), "Brief.PDF"),
            "application/pdf"
        );
        assert_eq!(resolve_content_type(None, "call.m4a"), "audio/x-m4a");
        assert_eq!(
            resolve_content_type(None, "noext"),
            "application/octet-stream"
        );
    }
}
