//! Uploaded-file ingestion
//!
//! Pure transform from raw upload bytes to a bounded plain-text excerpt that
//! can ride along in a prompt. No network, no state.

use crate::core::errors::IngestError;

/// Appended to an excerpt when the source was cut off
pub const TRUNCATION_MARKER: &str = "\n[content truncated]";

/// Text formats the ingestor can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    PlainText,
    Markdown,
    RestructuredText,
    Csv,
    Json,
    Yaml,
    Toml,
    Xml,
}

impl TextFormat {
    /// Detect format from a mime type, ignoring parameters like charset
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => Some(TextFormat::PlainText),
            "text/markdown" => Some(TextFormat::Markdown),
            "text/x-rst" => Some(TextFormat::RestructuredText),
            "text/csv" => Some(TextFormat::Csv),
            "application/json" => Some(TextFormat::Json),
            "application/x-yaml" | "application/yaml" | "text/yaml" => Some(TextFormat::Yaml),
            "application/toml" => Some(TextFormat::Toml),
            "application/xml" | "text/xml" => Some(TextFormat::Xml),
            _ => None,
        }
    }
}

/// Bounded excerpt produced from an upload
#[derive(Debug, Clone)]
pub struct Excerpt {
    pub text: String,
    pub format: TextFormat,
    /// Whether the source was longer than the cap
    pub truncated: bool,
    /// Length of the fully decoded source, in characters
    pub source_chars: usize,
}

pub struct FileIngestor;

impl FileIngestor {
    /// Extract a plain-text excerpt of at most `max_excerpt_chars` characters.
    ///
    /// Truncation lands on a `char` boundary and the marker is appended
    /// within the cap, so the result never exceeds `max_excerpt_chars`.
    pub fn ingest(
        bytes: &[u8],
        mime_type: &str,
        max_excerpt_chars: usize,
    ) -> Result<Excerpt, IngestError> {
        let format = TextFormat::from_mime(mime_type)
            .ok_or_else(|| IngestError::UnsupportedFormat(mime_type.to_string()))?;

        let text = std::str::from_utf8(bytes).map_err(|e| {
            IngestError::Corrupt(format!("invalid UTF-8 at byte {}", e.valid_up_to()))
        })?;

        let source_chars = text.chars().count();
        if source_chars <= max_excerpt_chars {
            return Ok(Excerpt {
                text: text.to_string(),
                format,
                truncated: false,
                source_chars,
            });
        }

        let marker_chars = TRUNCATION_MARKER.chars().count();
        let budget = max_excerpt_chars.saturating_sub(marker_chars);
        let mut out: String = text.chars().take(budget).collect();
        out.push_str(TRUNCATION_MARKER);
        if budget == 0 {
            // Cap smaller than the marker itself; keep the cap authoritative.
            out = out.chars().take(max_excerpt_chars).collect();
        }

        Ok(Excerpt {
            text: out,
            format,
            truncated: true,
            source_chars,
        })
    }
}
