//! PDF text extraction using poppler-utils (`pdfinfo`, `pdftotext`).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use scribe_core::{Error, Result};

use super::{captions::clean_transcript, run_cmd_with_timeout, PipelineConfig};

/// Text and metadata read from a PDF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfText {
    pub text: String,
    pub page_count: Option<i32>,
    pub title: Option<String>,
}

/// Capability to read text out of a PDF on disk.
#[async_trait]
pub trait PdfTextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<PdfText>;
}

/// Parse `pdfinfo` output into (page count, title).
fn parse_pdfinfo(output: &str) -> (Option<i32>, Option<String>) {
    let mut pages = None;
    let mut title = None;

    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "Pages" => pages = value.parse::<i32>().ok(),
                "Title" => title = Some(value.to_string()),
                _ => {}
            }
        }
    }

    (pages, title)
}

/// [`PdfTextExtractor`] that shells out to poppler-utils.
pub struct PopplerPdfExtractor {
    pdftotext_path: String,
    pdfinfo_path: String,
    timeout: Duration,
}

impl PopplerPdfExtractor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            pdftotext_path: config.pdftotext_path.clone(),
            pdfinfo_path: config.pdfinfo_path.clone(),
            timeout: config.caption_timeout,
        }
    }
}

#[async_trait]
impl PdfTextExtractor for PopplerPdfExtractor {
    async fn extract(&self, path: &Path) -> Result<PdfText> {
        let (page_count, title) = match run_cmd_with_timeout(
            Command::new(&self.pdfinfo_path).arg(path),
            self.timeout,
        )
        .await
        {
            Ok(output) => parse_pdfinfo(&output),
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "pdf",
                    error = %e,
                    "pdfinfo failed, continuing without metadata"
                );
                (None, None)
            }
        };

        let raw = run_cmd_with_timeout(
            Command::new(&self.pdftotext_path).arg(path).arg("-"),
            self.timeout,
        )
        .await?;

        let text = clean_transcript(&raw);
        if text.is_empty() {
            return Err(Error::Extraction(
                "PDF contains no extractable text".to_string(),
            ));
        }

        Ok(PdfText {
            text,
            page_count,
            title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pdfinfo() {
        let output = "Title:          Annual Report\nAuthor:         Someone\nPages:          12\nEncrypted:      no\n";
        let (pages, title) = parse_pdfinfo(output);
        assert_eq!(pages, Some(12));
        assert_eq!(title.as_deref(), Some("Annual Report"));
    }

    #[test]
    fn test_parse_pdfinfo_missing_fields() {
        let (pages, title) = parse_pdfinfo("Producer: x\nTitle:\n");
        assert!(pages.is_none());
        assert!(title.is_none());
    }

    #[tokio::test]
    async fn test_missing_binaries_fail_extraction() {
        let config = PipelineConfig {
            pdftotext_path: "scribe-missing-pdftotext".to_string(),
            pdfinfo_path: "scribe-missing-pdfinfo".to_string(),
            ..Default::default()
        };
        let extractor = PopplerPdfExtractor::new(&config);
        let result = extractor.extract(Path::new("/nonexistent.pdf")).await;
        assert!(result.is_err());
    }
}
