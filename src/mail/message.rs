//! Fetched message representation.

use std::borrow::Cow;

use encoding_rs::{Encoding as Charset, UTF_8};
use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Encoding, MessagePart, MessageParser, MimeHeaders, PartType};

use crate::error::ExtractError;

/// Subject used when the original has none.
pub const DEFAULT_SUBJECT: &str = "No Subject";

/// One leaf MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimePart {
    /// Lower-cased `type/subtype`.
    pub content_type: String,
    /// Payload with the transfer encoding removed, still in `charset`.
    pub payload: Vec<u8>,
    /// Declared `charset` parameter. Absent means UTF-8.
    pub charset: Option<String>,
    /// The base64 or quoted-printable body could not be decoded.
    pub encoding_problem: bool,
}

impl MimePart {
    pub fn new(content_type: &str, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.to_ascii_lowercase(),
            payload: payload.into(),
            charset: None,
            encoding_problem: false,
        }
    }

    pub fn with_charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.trim().to_string());
        self
    }

    /// Payload as text in its declared charset.
    ///
    /// Decoding is strict: an unknown charset, a broken transfer encoding or
    /// any byte sequence invalid in the charset is an error, never a
    /// replacement character.
    pub fn decode_text(&self) -> Result<String, ExtractError> {
        if self.encoding_problem {
            return Err(self.decode_error("invalid transfer encoding".to_string()));
        }

        let charset = match self.charset.as_deref() {
            None => UTF_8,
            Some(label) => Charset::for_label(label.as_bytes())
                .ok_or_else(|| self.decode_error(format!("unknown charset {label:?}")))?,
        };

        charset
            .decode_without_bom_handling_and_without_replacement(&self.payload)
            .map(Cow::into_owned)
            .ok_or_else(|| self.decode_error(format!("invalid {} byte sequence", charset.name())))
    }

    fn decode_error(&self, reason: String) -> ExtractError {
        ExtractError::Decode {
            content_type: self.content_type.clone(),
            reason,
        }
    }

    fn from_parsed(part: &MessagePart<'_>, raw: &[u8]) -> Self {
        let content_type = match part.content_type() {
            Some(ct) => match ct.subtype() {
                Some(sub) => format!("{}/{}", ct.ctype(), sub),
                None => ct.ctype().to_string(),
            },
            // RFC 2045 default
            None => "text/plain".to_string(),
        };

        let body = raw
            .get(part.raw_body_offset() as usize..part.raw_end_offset() as usize)
            .unwrap_or_default();
        // The parser downgrades a body it cannot decode to `Encoding::None`
        // and flags it instead.
        let decoded = match part.encoding {
            _ if part.is_encoding_problem => None,
            Encoding::None => Some(body.to_vec()),
            Encoding::QuotedPrintable => quoted_printable_decode(body),
            Encoding::Base64 => base64_decode(body),
        };

        let mut mime = match decoded {
            Some(payload) => Self::new(&content_type, payload),
            None => Self {
                encoding_problem: true,
                ..Self::new(&content_type, Vec::new())
            },
        };
        if let Some(charset) = part.content_type().and_then(|ct| ct.attribute("charset")) {
            mime = mime.with_charset(charset);
        }
        mime
    }
}

/// A message pulled from the inbox, reduced to what the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Bare address of the first `From` mailbox.
    pub sender_address: String,
    pub subject: String,
    pub multipart: bool,
    /// Leaf parts in depth-first order. A non-multipart message has one.
    pub parts: Vec<MimePart>,
}

impl InboundMessage {
    /// Parse raw RFC 822 bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, ExtractError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or(ExtractError::Malformed)?;

        let sender_address = parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.address())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ExtractError::MissingSender)?;

        let subject = parsed
            .subject()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SUBJECT)
            .to_string();

        let multipart = parsed
            .parts
            .first()
            .is_some_and(|p| matches!(p.body, PartType::Multipart(_)));

        let parts = parsed
            .parts
            .iter()
            .filter(|p| !matches!(p.body, PartType::Multipart(_)))
            .map(|part| MimePart::from_parsed(part, raw))
            .collect();

        Ok(Self {
            sender_address,
            subject,
            multipart,
            parts,
        })
    }
}
