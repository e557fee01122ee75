//! Pick the classifiable text out of a message.
//!
//! Plaintext wins as soon as it is seen. HTML is only a fallback, and when a
//! message carries several HTML parts the last one is used.

use super::message::InboundMessage;
use crate::error::ExtractError;

/// Where the extracted text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Plain,
    Html,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: String,
    pub source: SourceKind,
}

impl ExtractedContent {
    fn empty() -> Self {
        Self {
            text: String::new(),
            source: SourceKind::None,
        }
    }
}

/// Extract the text body to classify.
pub fn extract(message: &InboundMessage) -> Result<ExtractedContent, ExtractError> {
    if !message.multipart {
        let Some(part) = message.parts.first() else {
            return Ok(ExtractedContent::empty());
        };
        let source = if part.content_type == "text/html" {
            SourceKind::Html
        } else {
            SourceKind::Plain
        };
        return Ok(ExtractedContent {
            text: part.decode_text()?,
            source,
        });
    }

    let mut last_html = None;
    for part in &message.parts {
        match part.content_type.as_str() {
            "text/plain" => {
                return Ok(ExtractedContent {
                    text: part.decode_text()?,
                    source: SourceKind::Plain,
                });
            }
            "text/html" => last_html = Some(part),
            _ => {}
        }
    }

    match last_html {
        Some(part) => Ok(ExtractedContent {
            text: part.decode_text()?,
            source: SourceKind::Html,
        }),
        None => Ok(ExtractedContent::empty()),
    }
}
