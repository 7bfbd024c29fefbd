use std::path::Path;

use bytes::Bytes;

use crate::errors::{ScreenerError, ScreenerResult};

/// An uploaded file: a resume or a job description PDF.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub bytes: Bytes,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a document from disk, keeping only the file name for the upload.
    pub async fn from_path(path: impl AsRef<Path>) -> ScreenerResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ScreenerError::Validation(format!("{} is not a file path", path.display()))
            })?;
        Ok(Self::new(filename, bytes))
    }

    pub fn is_pdf(&self) -> bool {
        Path::new(&self.filename)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
    }

    /// Checks the document is a non-empty PDF. `role` names it in the error ("resume", "job description").
    pub fn ensure_pdf(&self, role: &str) -> ScreenerResult<()> {
        if !self.is_pdf() {
            return Err(ScreenerError::Validation(format!(
                "Please upload a valid PDF {role} ({} is not a PDF).",
                self.filename
            )));
        }
        if self.bytes.is_empty() {
            return Err(ScreenerError::Validation(format!(
                "The {role} {} is empty.",
                self.filename
            )));
        }
        Ok(())
    }
}

/// The document every candidate is scored against: pasted text or a single file.
#[derive(Debug, Clone)]
pub enum TargetDocument {
    Text(String),
    File(Document),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_extension_is_case_insensitive() {
        assert!(Document::new("cv.PDF", "x").is_pdf());
        assert!(Document::new("cv.pdf", "x").is_pdf());
        assert!(!Document::new("cv.docx", "x").is_pdf());
        assert!(!Document::new("pdf", "x").is_pdf());
    }

    #[test]
    fn test_ensure_pdf_rejects_empty_file() {
        let err = Document::new("cv.pdf", Vec::new()).ensure_pdf("resume").unwrap_err();
        assert!(matches!(err, ScreenerError::Validation(msg) if msg.contains("empty")));
    }

    #[test]
    fn test_ensure_pdf_names_the_role() {
        let err = Document::new("jd.txt", "text").ensure_pdf("job description").unwrap_err();
        assert!(err.to_string().contains("job description"));
    }

    #[tokio::test]
    async fn test_from_path_keeps_file_name_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.pdf");
        tokio::fs::write(&path, b"%PDF-1.4").await.unwrap();

        let doc = Document::from_path(&path).await.unwrap();
        assert_eq!(doc.filename, "alice.pdf");
        assert_eq!(doc.bytes.as_ref(), b"%PDF-1.4");
    }
}
