//! Uploaded files and the analysis attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{double_option, matches_search, normalize_tags, required_text};
use crate::error::{CoreError, CoreResult};
use crate::query::SortOrder;
use crate::{CaseId, DocumentId, UserId};

/// Largest document accepted by the upload endpoint (50 MiB).
pub const MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;

const MAX_TITLE_LEN: usize = 256;
const MAX_FILE_NAME_LEN: usize = 255;

/// Content types accepted for documents.
pub const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "text/csv",
    "image/jpeg",
    "image/png",
    "image/tiff",
];

/// Lowercases a content type and strips its parameters (`; charset=...`).
pub fn essence_of(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_allowed_document_type(mime: &str) -> bool {
    DOCUMENT_MIME_TYPES.contains(&essence_of(mime).as_str())
}

string_enum! {
    pub enum DocumentType {
        Pleading => "pleading",
        Motion => "motion",
        Contract => "contract",
        Evidence => "evidence",
        Correspondence => "correspondence",
        CourtOrder => "court_order",
        Discovery => "discovery",
        Brief => "brief",
        Other => "other",
    }
    default = Other
}

string_enum! {
    /// Where a document is in the analysis pipeline.
    pub enum DocumentStatus {
        Uploaded => "uploaded",
        Processing => "processing",
        Processed => "processed",
        Failed => "failed",
    }
    default = Uploaded
}

/// Metadata of an uploaded file. The bytes live in the database blob map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub case_id: Option<CaseId>,
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub checksum: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub summary: Option<String>,
    pub extracted_text: Option<String>,
    pub key_points: Vec<String>,
    pub tags: Vec<String>,
    pub uploaded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn from_form(
        form: NewDocument,
        content: &[u8],
        uploaded_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DocumentId(0),
            case_id: form.case_id,
            title: form.title,
            file_name: form.file_name,
            mime_type: form.mime_type,
            file_size: content.len() as u64,
            checksum: blake3::hash(content).to_hex().to_string(),
            document_type: form.document_type,
            status: DocumentStatus::Uploaded,
            summary: None,
            extracted_text: None,
            key_points: Vec::new(),
            tags: form.tags,
            uploaded_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: DocumentUpdate, now: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(case_id) = update.case_id {
            self.case_id = case_id;
        }
        if let Some(document_type) = update.document_type {
            self.document_type = document_type;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        self.updated_at = now;
    }

    pub fn is_text(&self) -> bool {
        self.mime_type.starts_with("text/")
    }
}

// =============================================================================
// FORMS
// =============================================================================

/// Metadata collected from an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewDocument {
    pub case_id: Option<CaseId>,
    pub title: String,
    pub file_name: String,
    pub mime_type: String,
    pub document_type: DocumentType,
    pub tags: Vec<String>,
}

impl NewDocument {
    /// Validates the upload metadata. A blank title falls back to the file name.
    pub fn normalized(self) -> CoreResult<Self> {
        let file_name = required_text("file_name", &self.file_name, MAX_FILE_NAME_LEN)?;
        let title = if self.title.trim().is_empty() {
            file_name.clone()
        } else {
            required_text("title", &self.title, MAX_TITLE_LEN)?
        };
        let mime_type = essence_of(&self.mime_type);
        if !is_allowed_document_type(&mime_type) {
            return Err(CoreError::validation(
                "mime_type",
                format!("'{}' is not an accepted document type", mime_type),
            ));
        }
        Ok(Self {
            case_id: self.case_id,
            title,
            file_name,
            mime_type,
            document_type: self.document_type,
            tags: normalize_tags(self.tags),
        })
    }
}

/// Partial update of a document's metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub case_id: Option<Option<CaseId>>,
    pub document_type: Option<DocumentType>,
    pub tags: Option<Vec<String>>,
}

impl DocumentUpdate {
    pub fn normalized(mut self) -> CoreResult<Self> {
        if let Some(title) = &self.title {
            self.title = Some(required_text("title", title, MAX_TITLE_LEN)?);
        }
        self.tags = self.tags.map(normalize_tags);
        Ok(self)
    }
}

// =============================================================================
// LISTING
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub case_id: Option<CaseId>,
    pub document_type: Option<DocumentType>,
    pub status: Option<DocumentStatus>,
    pub search: Option<String>,
}

impl DocumentFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        if self.case_id.is_some() && self.case_id != doc.case_id {
            return false;
        }
        if self.document_type.is_some_and(|t| t != doc.document_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != doc.status) {
            return false;
        }
        match &self.search {
            Some(search) => matches_search(
                search,
                &[Some(doc.title.as_str()), Some(doc.file_name.as_str())],
            ),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentSortKey {
    #[default]
    CreatedAt,
    Title,
    FileSize,
}

impl DocumentSortKey {
    pub fn parse(raw: Option<&str>) -> CoreResult<Self> {
        Ok(match raw.map(str::trim) {
            None | Some("") | Some("created_at") => Self::CreatedAt,
            Some("title") => Self::Title,
            Some("file_size") => Self::FileSize,
            Some(other) => {
                return Err(CoreError::validation(
                    "sort_by",
                    format!("cannot sort documents by '{}'", other),
                ));
            }
        })
    }

    pub fn compare(&self, a: &Document, b: &Document, order: SortOrder) -> Ordering {
        let primary = match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            Self::FileSize => a.file_size.cmp(&b.file_size),
        };
        order.apply(primary.then(a.id.cmp(&b.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_parameters_are_ignored() {
        assert!(is_allowed_document_type("text/plain; charset=utf-8"));
        assert!(is_allowed_document_type("Application/PDF"));
        assert!(!is_allowed_document_type("application/x-msdownload"));
    }

    #[test]
    fn blank_title_falls_back_to_file_name() {
        let form = NewDocument {
            file_name: "complaint.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            ..NewDocument::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(form.title, "complaint.pdf");
    }

    #[test]
    fn executable_upload_is_rejected() {
        let err = NewDocument {
            file_name: "setup.exe".to_string(),
            mime_type: "application/x-msdownload".to_string(),
            ..NewDocument::default()
        }
        .normalized()
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "mime_type", .. }));
    }

    #[test]
    fn checksum_and_size_come_from_content() {
        let form = NewDocument {
            file_name: "memo.txt".to_string(),
            mime_type: "text/plain".to_string(),
            ..NewDocument::default()
        }
        .normalized()
        .unwrap();
        let doc = Document::from_form(form, b"hello", None, Utc::now());
        assert_eq!(doc.file_size, 5);
        assert_eq!(doc.checksum, blake3::hash(b"hello").to_hex().to_string());
        assert_eq!(doc.status, DocumentStatus::Uploaded);
    }
}
