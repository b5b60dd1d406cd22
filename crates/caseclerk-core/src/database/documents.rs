use chrono::{DateTime, Utc};

use super::{Database, list_sorted};
use crate::ai::DocumentAnalysis;
use crate::error::{CoreError, CoreResult};
use crate::model::{
    DocumentFilter, DocumentSortKey, DocumentUpdate, MAX_DOCUMENT_BYTES, NewDocument,
};
use crate::query::{ListParams, Page, SortOrder};
use crate::{Document, DocumentId, DocumentStatus, UserId};

impl Database {
    /// Stores an upload. The bytes are kept beside the metadata.
    pub fn create_document(
        &mut self,
        form: NewDocument,
        content: Vec<u8>,
        uploaded_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> CoreResult<Document> {
        let form = form.normalized()?;
        if content.is_empty() {
            return Err(CoreError::validation("file", "uploaded file is empty"));
        }
        if content.len() as u64 > MAX_DOCUMENT_BYTES {
            return Err(CoreError::validation(
                "file",
                format!("larger than {} bytes", MAX_DOCUMENT_BYTES),
            ));
        }
        self.ensure_case(form.case_id)?;
        let document = self
            .documents
            .insert(Document::from_form(form, &content, uploaded_by, now));
        self.blobs.insert(document.id, content);
        Ok(document)
    }

    pub fn get_document(&self, id: DocumentId) -> CoreResult<&Document> {
        self.documents.get(id)
    }

    pub fn document_content(&self, id: DocumentId) -> CoreResult<&[u8]> {
        self.documents.get(id)?;
        self.blobs
            .get(&id)
            .map(Vec::as_slice)
            .ok_or_else(|| CoreError::not_found("document content", id))
    }

    pub fn update_document(
        &mut self,
        id: DocumentId,
        update: DocumentUpdate,
        now: DateTime<Utc>,
    ) -> CoreResult<Document> {
        let update = update.normalized()?;
        self.documents.get(id)?;
        if let Some(case_id) = update.case_id {
            self.ensure_case(case_id)?;
        }
        let document = self.documents.get_mut(id)?;
        document.apply(update, now);
        Ok(document.clone())
    }

    pub fn delete_document(&mut self, id: DocumentId) -> CoreResult<Document> {
        let document = self.documents.remove(id)?;
        self.blobs.remove(&id);
        Ok(document)
    }

    pub fn list_documents(
        &self,
        filter: &DocumentFilter,
        params: &ListParams,
    ) -> CoreResult<Page<Document>> {
        let key = DocumentSortKey::parse(params.sort_by.as_deref())?;
        Ok(list_sorted(
            &self.documents,
            params,
            |d| filter.matches(d),
            |a, b, order| key.compare(a, b, order),
            params.order_or(SortOrder::Desc),
        ))
    }

    pub fn set_document_status(
        &mut self,
        id: DocumentId,
        status: DocumentStatus,
        now: DateTime<Utc>,
    ) -> CoreResult<Document> {
        let document = self.documents.get_mut(id)?;
        document.status = status;
        document.updated_at = now;
        Ok(document.clone())
    }

    /// Stores the result of an analysis run and marks the document processed.
    pub fn apply_document_analysis(
        &mut self,
        id: DocumentId,
        analysis: DocumentAnalysis,
        now: DateTime<Utc>,
    ) -> CoreResult<Document> {
        let document = self.documents.get_mut(id)?;
        document.summary = Some(analysis.summary);
        document.extracted_text = Some(analysis.extracted_text);
        document.key_points = analysis.key_points;
        document.status = DocumentStatus::Processed;
        document.updated_at = now;
        Ok(document.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::ai;
    use crate::{CaseId, DocumentType};

    fn upload(case_id: Option<CaseId>, name: &str) -> NewDocument {
        NewDocument {
            case_id,
            file_name: name.to_string(),
            mime_type: "text/plain; charset=utf-8".to_string(),
            document_type: DocumentType::Brief,
            ..NewDocument::default()
        }
    }

    #[test]
    fn upload_keeps_content_and_checksum() {
        let (mut db, case) = with_case("CV-1");
        let doc = db
            .create_document(upload(Some(case.id), "brief.txt"), b"hello".to_vec(), None, t0())
            .unwrap();
        assert_eq!(doc.title, "brief.txt");
        assert_eq!(doc.mime_type, "text/plain");
        assert_eq!(doc.file_size, 5);
        assert_eq!(doc.checksum, blake3::hash(b"hello").to_hex().to_string());
        assert_eq!(db.document_content(doc.id).unwrap(), b"hello");
    }

    #[test]
    fn unknown_case_and_empty_file_are_rejected() {
        let mut db = Database::new();
        assert!(
            db.create_document(upload(Some(CaseId(7)), "a.txt"), b"x".to_vec(), None, t0())
                .is_err()
        );
        assert!(
            db.create_document(upload(None, "a.txt"), Vec::new(), None, t0())
                .is_err()
        );
        assert_eq!(db.counts().documents, 0);
    }

    #[test]
    fn disallowed_mime_type_is_rejected() {
        let mut db = Database::new();
        let mut form = upload(None, "tool.exe");
        form.mime_type = "application/x-msdownload".to_string();
        let err = db
            .create_document(form, b"MZ".to_vec(), None, t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "mime_type", .. }));
    }

    #[test]
    fn analysis_marks_document_processed() {
        let mut db = Database::new();
        let text = b"The defendant shall pay damages. The court will hear the motion.";
        let doc = db
            .create_document(upload(None, "memo.txt"), text.to_vec(), None, t0())
            .unwrap();
        let analysis = ai::analyze_document(&doc, db.document_content(doc.id).unwrap());
        let doc = db.apply_document_analysis(doc.id, analysis, t0()).unwrap();
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert!(doc.summary.is_some());
        assert!(!doc.key_points.is_empty());
    }

    #[test]
    fn list_filters_by_case() {
        let (mut db, case) = with_case("CV-1");
        db.create_document(upload(Some(case.id), "a.txt"), b"a".to_vec(), None, t0())
            .unwrap();
        db.create_document(upload(None, "b.txt"), b"b".to_vec(), None, t0())
            .unwrap();
        let filter = DocumentFilter {
            case_id: Some(case.id),
            ..DocumentFilter::default()
        };
        let page = db.list_documents(&filter, &ListParams::default()).unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.items[0].file_name, "a.txt");
    }

    #[test]
    fn delete_drops_content() {
        let mut db = Database::new();
        let doc = db
            .create_document(upload(None, "a.txt"), b"a".to_vec(), None, t0())
            .unwrap();
        db.delete_document(doc.id).unwrap();
        assert!(matches!(
            db.document_content(doc.id),
            Err(CoreError::NotFound { .. })
        ));
    }
}
