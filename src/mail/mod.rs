//! Mail plumbing: parsing, content extraction, reply composition and the
//! IMAP/SMTP clients the poller drives.

pub mod compose;
pub mod extract;
pub mod imap;
pub mod message;
pub mod smtp;

pub use compose::{OutboundReply, ReplyComposer};
pub use extract::{ExtractedContent, SourceKind, extract};
pub use imap::ImapConnector;
pub use message::{InboundMessage, MimePart};
pub use smtp::SmtpReplyTransport;

use crate::error::{ConnectionError, FetchError, SendError};

/// An authenticated mailbox session with INBOX selected.
///
/// Blocking; the poller drives it from the blocking thread pool.
pub trait MailboxSession {
    /// Ids of all unread messages.
    fn search_unseen(&mut self) -> Result<Vec<String>, ConnectionError>;

    /// Raw RFC 822 bytes of one message. Marks it read on the server.
    fn fetch(&mut self, id: &str) -> Result<Vec<u8>, FetchError>;

    /// End the session. Failures are logged, never returned.
    fn logout(&mut self);
}

/// Opens mailbox sessions, one per poll cycle.
pub trait MailboxConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn MailboxSession>, ConnectionError>;
}

/// Outbound mail submission.
pub trait ReplyTransport: Send + Sync {
    fn send(&self, reply: &OutboundReply) -> Result<(), SendError>;
}
