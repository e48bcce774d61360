//! Resume text extraction.
//!
//! The resume is read once, before the session starts, and only feeds the
//! question generator.  Any failure degrades to "no resume context".

use std::path::Path;

use thiserror::Error;

use crate::config::ResumeConfig;

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("failed to read resume: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to extract text from PDF: {0}")]
    Pdf(String),

    #[error("resume contains no extractable text")]
    Empty,
}

pub trait ResumeExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, ResumeError>;
}

/// Reads `.pdf` files through `pdf-extract` and anything else as UTF-8 text.
#[derive(Debug, Clone)]
pub struct FileResumeExtractor {
    max_chars: usize,
}

impl FileResumeExtractor {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn from_config(config: &ResumeConfig) -> Self {
        Self::new(config.max_chars)
    }
}

impl ResumeExtractor for FileResumeExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, ResumeError> {
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

        let raw = if is_pdf {
            let bytes = std::fs::read(path)?;
            // pdf-extract panics on some malformed documents.
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
                .map_err(|_| ResumeError::Pdf("extractor panicked".into()))?
                .map_err(|e| ResumeError::Pdf(e.to_string()))?
        } else {
            std::fs::read_to_string(path)?
        };

        let text = normalize(&raw, self.max_chars);
        if text.is_empty() {
            return Err(ResumeError::Empty);
        }
        Ok(text)
    }
}

/// Collapse whitespace runs to single spaces and cut at `max_chars`
/// characters (never inside a UTF-8 sequence).
pub fn normalize(raw: &str, max_chars: usize) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((idx, _)) => collapsed[..idx].trim_end().to_string(),
        None => collapsed,
    }
}

/// Extract resume text for the session, or `None` on any failure.
pub fn load_resume_context(extractor: &dyn ResumeExtractor, path: &Path) -> Option<String> {
    match extractor.extract_text(path) {
        Ok(text) => {
            log::info!(
                "resume: extracted {} chars from {}",
                text.chars().count(),
                path.display()
            );
            Some(text)
        }
        Err(e) => {
            log::warn!("resume: continuing without resume context: {e}");
            None
        }
    }
}
