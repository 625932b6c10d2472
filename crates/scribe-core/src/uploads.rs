//! Validation for uploaded audio and PDF files before they are staged to disk.

use crate::error::{Error, Result};

/// PDF files start with `%PDF-`.
const PDF_MAGIC: &[u8] = b"%PDF-";

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "m4a", "aac", "flac", "ogg", "oga", "opus", "webm", "mp4", "mpeg", "mpga",
];

/// Strip path components and characters that are unsafe in file names.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim().trim_start_matches('.');
    if sanitized.is_empty() {
        return "upload".to_string();
    }

    if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        return sanitized[..end].to_string();
    }

    sanitized.to_string()
}

fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn check_size(data: &[u8], max_bytes: usize) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidInput("uploaded file is empty".to_string()));
    }
    if data.len() > max_bytes {
        return Err(Error::InvalidInput(format!(
            "uploaded file exceeds maximum size of {max_bytes} bytes"
        )));
    }
    Ok(())
}

/// Accept an audio upload when either its declared MIME type or its
/// extension says it is audio.
pub fn validate_audio_upload(
    filename: &str,
    mime_type: Option<&str>,
    data: &[u8],
    max_bytes: usize,
) -> Result<()> {
    check_size(data, max_bytes)?;

    let mime_ok = mime_type
        .map(|m| m.starts_with("audio/") || m.starts_with("video/"))
        .unwrap_or(false);
    let ext_ok = extension(filename)
        .map(|e| AUDIO_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false);

    if mime_ok || ext_ok {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{filename} does not look like an audio file"
        )))
    }
}

/// Accept a PDF upload only when the content carries the PDF signature.
pub fn validate_pdf_upload(data: &[u8], max_bytes: usize) -> Result<()> {
    check_size(data, max_bytes)?;
    if !data.starts_with(PDF_MAGIC) {
        return Err(Error::InvalidInput(
            "uploaded file is not a PDF".to_string(),
        ));
    }
    Ok(())
}
