use reqwest::multipart::{Form, Part};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{ScreenerError, ScreenerResult};
use crate::models::{Document, TargetDocument};

/// Which side of the comparison holds many documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchMode {
    /// Many resumes against one job description (text or PDF).
    Bulk,
    /// One resume against many job descriptions.
    Reverse,
}

impl BatchMode {
    pub fn endpoint(self) -> &'static str {
        match self {
            BatchMode::Bulk => "/bulk-analyze",
            BatchMode::Reverse => "/reverse-analyze",
        }
    }

    fn candidate_role(self) -> &'static str {
        match self {
            BatchMode::Bulk => "resume",
            BatchMode::Reverse => "job description",
        }
    }

    fn target_role(self) -> &'static str {
        match self {
            BatchMode::Bulk => "job description",
            BatchMode::Reverse => "resume",
        }
    }
}

/// A batch submission. Built once, validated, then consumed by the submitter.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub batch_id: Uuid,
    pub mode: BatchMode,
    pub target: TargetDocument,
    pub candidates: Vec<Document>,
}

impl BatchRequest {
    pub fn bulk(target: TargetDocument, resumes: Vec<Document>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            mode: BatchMode::Bulk,
            target,
            candidates: resumes,
        }
    }

    pub fn reverse(resume: Document, job_descriptions: Vec<Document>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            mode: BatchMode::Reverse,
            target: TargetDocument::File(resume),
            candidates: job_descriptions,
        }
    }

    /// Checks every precondition of a submission. Runs before any network activity.
    pub fn validate(&self) -> ScreenerResult<()> {
        if self.candidates.is_empty() {
            return Err(ScreenerError::Validation(format!(
                "Please select at least one {}.",
                self.mode.candidate_role()
            )));
        }

        match (&self.target, self.mode) {
            (TargetDocument::Text(text), BatchMode::Bulk) => {
                if text.trim().is_empty() {
                    return Err(ScreenerError::Validation(
                        "Please enter a job description.".to_string(),
                    ));
                }
            }
            (TargetDocument::Text(_), BatchMode::Reverse) => {
                return Err(ScreenerError::Validation(
                    "Reverse screening needs a resume PDF as the target.".to_string(),
                ));
            }
            (TargetDocument::File(doc), mode) => doc.ensure_pdf(mode.target_role())?,
        }

        for doc in &self.candidates {
            doc.ensure_pdf(self.mode.candidate_role())?;
        }
        Ok(())
    }

    /// Builds the multipart body the streaming endpoint expects.
    pub fn to_form(&self) -> ScreenerResult<Form> {
        let mut form = Form::new();

        form = match (&self.target, self.mode) {
            (TargetDocument::Text(text), _) => form.text("job_description", text.clone()),
            (TargetDocument::File(doc), BatchMode::Bulk) => {
                form.part("job_description_file", pdf_part(doc)?)
            }
            (TargetDocument::File(doc), BatchMode::Reverse) => form.part("resume", pdf_part(doc)?),
        };

        let field = match self.mode {
            BatchMode::Bulk => "resumes",
            BatchMode::Reverse => "job_descriptions",
        };
        for doc in &self.candidates {
            form = form.part(field, pdf_part(doc)?);
        }
        Ok(form)
    }
}

pub(crate) fn pdf_part(doc: &Document) -> ScreenerResult<Part> {
    Ok(Part::bytes(doc.bytes.to_vec())
        .file_name(doc.filename.clone())
        .mime_str("application/pdf")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> Document {
        Document::new(name, "%PDF-1.4")
    }

    #[test]
    fn test_valid_bulk_text_request() {
        let req = BatchRequest::bulk(
            TargetDocument::Text("Senior Rust engineer".to_string()),
            vec![pdf("a.pdf"), pdf("b.pdf")],
        );
        assert!(req.validate().is_ok());
        assert_eq!(req.mode.endpoint(), "/bulk-analyze");
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let req = BatchRequest::bulk(TargetDocument::Text("JD".to_string()), vec![]);
        let err = req.validate().unwrap_err();
        assert!(matches!(err, ScreenerError::Validation(msg) if msg.contains("resume")));
    }

    #[test]
    fn test_blank_text_target_rejected() {
        let req = BatchRequest::bulk(TargetDocument::Text("   \n".to_string()), vec![pdf("a.pdf")]);
        assert!(matches!(req.validate(), Err(ScreenerError::Validation(_))));
    }

    #[test]
    fn test_reverse_requires_file_target() {
        let mut req = BatchRequest::reverse(pdf("me.pdf"), vec![pdf("jd1.pdf")]);
        assert!(req.validate().is_ok());

        req.target = TargetDocument::Text("my resume text".to_string());
        assert!(matches!(req.validate(), Err(ScreenerError::Validation(_))));
    }

    #[test]
    fn test_non_pdf_candidate_rejected() {
        let req = BatchRequest::bulk(
            TargetDocument::Text("JD".to_string()),
            vec![pdf("a.pdf"), Document::new("b.docx", "x")],
        );
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("b.docx"));
    }

    #[test]
    fn test_non_pdf_target_file_rejected() {
        let req = BatchRequest::bulk(
            TargetDocument::File(Document::new("jd.txt", "text")),
            vec![pdf("a.pdf")],
        );
        assert!(matches!(req.validate(), Err(ScreenerError::Validation(_))));
    }

    #[test]
    fn test_each_request_gets_its_own_batch_id() {
        let a = BatchRequest::bulk(TargetDocument::Text("JD".to_string()), vec![pdf("a.pdf")]);
        let b = BatchRequest::bulk(TargetDocument::Text("JD".to_string()), vec![pdf("a.pdf")]);
        assert_ne!(a.batch_id, b.batch_id);
    }

    #[test]
    fn test_form_builds_for_both_modes() {
        let bulk = BatchRequest::bulk(
            TargetDocument::File(pdf("jd.pdf")),
            vec![pdf("a.pdf"), pdf("b.pdf")],
        );
        assert!(bulk.to_form().is_ok());

        let reverse = BatchRequest::reverse(pdf("me.pdf"), vec![pdf("jd1.pdf")]);
        assert!(reverse.to_form().is_ok());
    }
}
