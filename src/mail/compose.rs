//! Verdict replies.

use lettre::Message;
use lettre::message::header::ContentType;

use crate::classifier::Label;
use crate::error::SendError;

const PHISHING_BODY: &str = "The email provided is a phishing email.\n\n\
Do not click any links or open any attachments it contains, \
and delete it from your inbox.";

const LEGITIMATE_BODY: &str = "The email provided is legitimate.";

/// A reply ready to hand to a [`ReplyTransport`](super::ReplyTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundReply {
    /// Build the wire message.
    pub fn to_message(&self) -> Result<Message, SendError> {
        Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| SendError::Build(format!("Invalid from address: {e}")))?,
            )
            .to(self
                .to
                .parse()
                .map_err(|e| SendError::Build(format!("Invalid to address: {e}")))?)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())
            .map_err(|e| SendError::Build(format!("Failed to build email: {e}")))
    }
}

/// Builds verdict replies from our own address.
#[derive(Debug, Clone)]
pub struct ReplyComposer {
    from_address: String,
}

impl ReplyComposer {
    pub fn new(from_address: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
        }
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    pub fn compose(&self, label: Label, sender_address: &str, subject: &str) -> OutboundReply {
        let body = match label {
            Label::Phishing => PHISHING_BODY,
            Label::Legitimate => LEGITIMATE_BODY,
        };
        OutboundReply {
            from: self.from_address.clone(),
            to: sender_address.to_string(),
            subject: reply_subject(subject),
            body: body.to_string(),
        }
    }
}

pub fn reply_subject(subject: &str) -> String {
    format!("Re: {subject} - Classification Result")
}
