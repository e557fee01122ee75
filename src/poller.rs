//! One inbox poll cycle: connect → search unseen → per message
//! (fetch → extract → classify → compose → send) → logout.
//!
//! A failing message is logged and skipped; only a failure to connect or to
//! search aborts the cycle. A connection lost mid-batch ends the batch. Fetching with RFC822 marks each message \Seen,
//! so a message is never answered twice even if a cycle dies halfway.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::classifier::{Classifier, Label};
use crate::error::{ConnectionError, FetchError, MessageError};
use crate::mail::{
    InboundMessage, MailboxConnector, MailboxSession, ReplyComposer, ReplyTransport, extract,
};

/// What happened to one message.
#[derive(Debug)]
pub enum MessageOutcome {
    Replied(Label),
    /// Our own outbound mail; answering it would loop.
    SkippedSelfSent,
    Failed(MessageError),
}

/// Per-cycle tallies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub found: usize,
    pub replied: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct InboxPoller {
    connector: Arc<dyn MailboxConnector>,
    classifier: Arc<dyn Classifier>,
    composer: ReplyComposer,
    transport: Arc<dyn ReplyTransport>,
}

impl InboxPoller {
    pub fn new(
        connector: Arc<dyn MailboxConnector>,
        classifier: Arc<dyn Classifier>,
        composer: ReplyComposer,
        transport: Arc<dyn ReplyTransport>,
    ) -> Self {
        Self {
            connector,
            classifier,
            composer,
            transport,
        }
    }

    /// Run one full cycle. Blocking.
    ///
    /// Every session that was opened is logged out exactly once, whether the
    /// cycle succeeds or not.
    pub fn run_cycle(&self) -> Result<CycleReport, ConnectionError> {
        let mut session = self.connector.connect()?;
        let result = self.process_mailbox(session.as_mut());
        session.logout();
        result
    }

    fn process_mailbox(
        &self,
        session: &mut dyn MailboxSession,
    ) -> Result<CycleReport, ConnectionError> {
        let ids = session.search_unseen()?;
        let mut report = CycleReport {
            found: ids.len(),
            ..CycleReport::default()
        };

        if ids.is_empty() {
            debug!("No unread messages");
            return Ok(report);
        }

        for (done, id) in ids.iter().enumerate() {
            match self.process_message(session, id) {
                MessageOutcome::Replied(_) => report.replied += 1,
                MessageOutcome::SkippedSelfSent => report.skipped += 1,
                MessageOutcome::Failed(MessageError::Fetch(FetchError::ConnectionLost {
                    ..
                })) => {
                    report.failed += 1;
                    // Unfetched messages stay unseen for the next cycle.
                    warn!(
                        remaining = ids.len() - done - 1,
                        "IMAP connection lost, ending batch"
                    );
                    break;
                }
                MessageOutcome::Failed(_) => report.failed += 1,
            }
        }

        Ok(report)
    }

    /// Handle one message id. Logs its own failures with whatever context is
    /// known at the point of failure.
    pub fn process_message(&self, session: &mut dyn MailboxSession, id: &str) -> MessageOutcome {
        let raw = match session.fetch(id) {
            Ok(raw) => raw,
            Err(e) => {
                error!(id, error = %e, "Failed to fetch message");
                return MessageOutcome::Failed(e.into());
            }
        };

        let message = match InboundMessage::parse(&raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(id, bytes = raw.len(), error = %e, "Skipping unparseable message");
                return MessageOutcome::Failed(e.into());
            }
        };

        if message
            .sender_address
            .eq_ignore_ascii_case(self.composer.from_address())
        {
            debug!(id, "Skipping self-sent message");
            return MessageOutcome::SkippedSelfSent;
        }

        match self.classify_and_reply(&message) {
            Ok(label) => {
                info!(
                    id,
                    sender = %message.sender_address,
                    subject = %message.subject,
                    classification = %label,
                    "Classification reply sent"
                );
                MessageOutcome::Replied(label)
            }
            Err(e) => {
                error!(
                    id,
                    sender = %message.sender_address,
                    subject = %message.subject,
                    error = %e,
                    "Failed to process message"
                );
                MessageOutcome::Failed(e)
            }
        }
    }

    fn classify_and_reply(&self, message: &InboundMessage) -> Result<Label, MessageError> {
        let content = extract(message)?;
        let label = self.classifier.classify(&content.text)?;
        let reply = self
            .composer
            .compose(label, &message.sender_address, &message.subject);
        self.transport.send(&reply)?;
        Ok(label)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{ModelError, SendError};
    use crate::mail::OutboundReply;

    /// Anything mentioning "prize" is phishing; NUL is rejected.
    pub(crate) struct KeywordClassifier;

    impl Classifier for KeywordClassifier {
        fn classify(&self, text: &str) -> Result<Label, ModelError> {
            if text.contains('\0') {
                return Err(ModelError::NonText("binary".into()));
            }
            Ok(if text.to_lowercase().contains("prize") {
                Label::Phishing
            } else {
                Label::Legitimate
            })
        }
    }

    #[derive(Default)]
    pub(crate) struct MailboxState {
        pub(crate) connects: AtomicUsize,
        pub(crate) logouts: AtomicUsize,
        pub(crate) fetched: Mutex<Vec<String>>,
    }

    pub(crate) struct FakeMailbox {
        pub(crate) messages: Vec<(String, Result<Vec<u8>, String>)>,
        pub(crate) fail_connect: bool,
        pub(crate) fail_search: bool,
        /// Fetching this id drops the connection.
        pub(crate) lose_connection_at: Option<String>,
        pub(crate) state: Arc<MailboxState>,
    }

    impl FakeMailbox {
        pub(crate) fn with(messages: Vec<(&str, Result<&[u8], &str>)>) -> Self {
            Self {
                messages: messages
                    .into_iter()
                    .map(|(id, m)| (id.to_string(), m.map(<[u8]>::to_vec).map_err(str::to_string)))
                    .collect(),
                fail_connect: false,
                fail_search: false,
                lose_connection_at: None,
                state: Arc::new(MailboxState::default()),
            }
        }
    }

    struct FakeSession {
        messages: HashMap<String, Result<Vec<u8>, String>>,
        order: Vec<String>,
        fail_search: bool,
        lose_connection_at: Option<String>,
        state: Arc<MailboxState>,
    }

    impl MailboxSession for FakeSession {
        fn search_unseen(&mut self) -> Result<Vec<String>, ConnectionError> {
            if self.fail_search {
                return Err(ConnectionError::CommandFailed {
                    command: "SEARCH".into(),
                    response: "NO".into(),
                });
            }
            Ok(self.order.clone())
        }

        fn fetch(&mut self, id: &str) -> Result<Vec<u8>, FetchError> {
            self.state.fetched.lock().unwrap().push(id.to_string());
            if self.lose_connection_at.as_deref() == Some(id) {
                return Err(FetchError::ConnectionLost {
                    id: id.to_string(),
                    reason: "IMAP connection closed by server".into(),
                });
            }
            match self.messages.get(id) {
                Some(Ok(raw)) => Ok(raw.clone()),
                Some(Err(reason)) => Err(FetchError::Failed {
                    id: id.to_string(),
                    reason: reason.clone(),
                }),
                None => Err(FetchError::Empty { id: id.to_string() }),
            }
        }

        fn logout(&mut self) {
            self.state.logouts.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl MailboxConnector for FakeMailbox {
        fn connect(&self) -> Result<Box<dyn MailboxSession>, ConnectionError> {
            self.state.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(ConnectionError::AuthFailed {
                    user: "catch@example.com".into(),
                });
            }
            Ok(Box::new(FakeSession {
                messages: self.messages.iter().cloned().collect(),
                order: self.messages.iter().map(|(id, _)| id.clone()).collect(),
                fail_search: self.fail_search,
                lose_connection_at: self.lose_connection_at.clone(),
                state: Arc::clone(&self.state),
            }))
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) sent: Mutex<Vec<OutboundReply>>,
        pub(crate) fail_for: Option<String>,
    }

    impl ReplyTransport for RecordingTransport {
        fn send(&self, reply: &OutboundReply) -> Result<(), SendError> {
            if self.fail_for.as_deref() == Some(reply.to.as_str()) {
                return Err(SendError::Transport("550 mailbox unavailable".into()));
            }
            self.sent.lock().unwrap().push(reply.clone());
            Ok(())
        }
    }

    const PHISH: &[u8] = b"From: Mallory <mallory@evil.example>\r\n\
Subject: You won\r\n\
Content-Type: text/plain\r\n\
\r\n\
Claim your PRIZE now\r\n";

    const FRIENDLY: &[u8] = b"From: Alice <alice@example.com>\r\n\
Subject: Lunch\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"sep\"\r\n\
\r\n\
--sep\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>You won a prize</p>\r\n\
--sep\r\n\
Content-Type: text/plain\r\n\
\r\n\
Lunch at noon?\r\n\
--sep--\r\n";

    const NO_SENDER: &[u8] = b"Subject: mystery\r\n\r\nwho sent this\r\n";

    const BINARY_BODY: &[u8] = b"From: bin@example.com\r\nSubject: blob\r\n\r\nabc\0def\r\n";

    const BAD_BYTES: &[u8] = b"From: Trent <trent@example.net>\r\n\
Subject: Invoice\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
abc \xff\xfe\xc3\x28\r\n";

    const SELF_SENT: &[u8] = b"From: Catch <CATCH@example.com>\r\n\
Subject: Re: Lunch - Classification Result\r\n\
\r\n\
The email provided is legitimate.\r\n";

    fn poller(mailbox: FakeMailbox, transport: Arc<RecordingTransport>) -> InboxPoller {
        InboxPoller::new(
            Arc::new(mailbox),
            Arc::new(KeywordClassifier),
            ReplyComposer::new("catch@example.com"),
            transport,
        )
    }

    #[test]
    fn replies_with_verdicts() {
        let mailbox = FakeMailbox::with(vec![("1", Ok(PHISH)), ("2", Ok(FRIENDLY))]);
        let state = Arc::clone(&mailbox.state);
        let transport = Arc::new(RecordingTransport::default());

        let report = poller(mailbox, Arc::clone(&transport)).run_cycle().unwrap();
        assert_eq!(
            report,
            CycleReport {
                found: 2,
                replied: 2,
                skipped: 0,
                failed: 0
            }
        );

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].to, "mallory@evil.example");
        assert_eq!(sent[0].subject, "Re: You won - Classification Result");
        assert!(sent[0].body.contains("phishing"));
        // Plaintext part wins over the HTML mentioning a prize.
        assert_eq!(sent[1].to, "alice@example.com");
        assert!(sent[1].body.contains("legitimate"));

        assert_eq!(state.logouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_message_does_not_stop_batch() {
        let mailbox = FakeMailbox::with(vec![("1", Ok(NO_SENDER)), ("2", Ok(PHISH))]);
        let transport = Arc::new(RecordingTransport::default());

        let report = poller(mailbox, Arc::clone(&transport)).run_cycle().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.replied, 1);
        assert_eq!(transport.sent.lock().unwrap()[0].to, "mallory@evil.example");
    }

    #[test]
    fn model_rejection_is_per_message() {
        let mailbox = FakeMailbox::with(vec![("1", Ok(BINARY_BODY)), ("2", Ok(FRIENDLY))]);
        let transport = Arc::new(RecordingTransport::default());

        let report = poller(mailbox, Arc::clone(&transport)).run_cycle().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.replied, 1);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
    }

    #[test]
    fn undecodable_body_is_skipped() {
        let mailbox = FakeMailbox::with(vec![("1", Ok(BAD_BYTES)), ("2", Ok(PHISH))]);
        let transport = Arc::new(RecordingTransport::default());

        let report = poller(mailbox, Arc::clone(&transport)).run_cycle().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.replied, 1);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "mallory@evil.example");
    }

    #[test]
    fn lost_connection_ends_the_batch() {
        let mut mailbox = FakeMailbox::with(vec![
            ("1", Ok(PHISH)),
            ("2", Ok(FRIENDLY)),
            ("3", Ok(PHISH)),
        ]);
        mailbox.lose_connection_at = Some("2".into());
        let state = Arc::clone(&mailbox.state);
        let transport = Arc::new(RecordingTransport::default());

        let report = poller(mailbox, Arc::clone(&transport)).run_cycle().unwrap();
        assert_eq!(
            report,
            CycleReport {
                found: 3,
                replied: 1,
                skipped: 0,
                failed: 1
            }
        );
        assert_eq!(*state.fetched.lock().unwrap(), vec!["1", "2"]);
        assert_eq!(state.logouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fetch_failure_is_per_message() {
        let mailbox = FakeMailbox::with(vec![("1", Err("timeout")), ("2", Ok(PHISH))]);
        let state = Arc::clone(&mailbox.state);
        let transport = Arc::new(RecordingTransport::default());

        let report = poller(mailbox, Arc::clone(&transport)).run_cycle().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.replied, 1);
        assert_eq!(*state.fetched.lock().unwrap(), vec!["1", "2"]);
    }

    #[test]
    fn send_failure_is_counted_and_not_retried() {
        let mailbox = FakeMailbox::with(vec![("1", Ok(PHISH)), ("2", Ok(FRIENDLY))]);
        let state = Arc::clone(&mailbox.state);
        let transport = Arc::new(RecordingTransport {
            fail_for: Some("mallory@evil.example".into()),
            ..RecordingTransport::default()
        });

        let report = poller(mailbox, Arc::clone(&transport)).run_cycle().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.replied, 1);
        assert_eq!(state.fetched.lock().unwrap().len(), 2);
    }

    #[test]
    fn self_sent_messages_are_skipped() {
        let mailbox = FakeMailbox::with(vec![("1", Ok(SELF_SENT))]);
        let transport = Arc::new(RecordingTransport::default());

        let report = poller(mailbox, Arc::clone(&transport)).run_cycle().unwrap();
        assert_eq!(report.skipped, 1);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_inbox_is_a_normal_cycle() {
        let mailbox = FakeMailbox::with(vec![]);
        let state = Arc::clone(&mailbox.state);
        let report = poller(mailbox, Arc::default()).run_cycle().unwrap();
        assert_eq!(report, CycleReport::default());
        assert_eq!(state.logouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn search_failure_still_logs_out_once() {
        let mut mailbox = FakeMailbox::with(vec![("1", Ok(PHISH))]);
        mailbox.fail_search = true;
        let state = Arc::clone(&mailbox.state);

        let err = poller(mailbox, Arc::default()).run_cycle().unwrap_err();
        assert!(matches!(err, ConnectionError::CommandFailed { .. }));
        assert_eq!(state.logouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connect_failure_aborts_without_session() {
        let mut mailbox = FakeMailbox::with(vec![("1", Ok(PHISH))]);
        mailbox.fail_connect = true;
        let state = Arc::clone(&mailbox.state);
        let transport = Arc::new(RecordingTransport::default());

        let err = poller(mailbox, Arc::clone(&transport)).run_cycle().unwrap_err();
        assert!(matches!(err, ConnectionError::AuthFailed { .. }));
        assert_eq!(state.logouts.load(Ordering::SeqCst), 0);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn each_cycle_logs_out_once() {
        let mailbox = FakeMailbox::with(vec![("1", Ok(PHISH))]);
        let state = Arc::clone(&mailbox.state);
        let poller = poller(mailbox, Arc::default());
        for _ in 0..3 {
            poller.run_cycle().unwrap();
        }
        assert_eq!(state.connects.load(Ordering::SeqCst), 3);
        assert_eq!(state.logouts.load(Ordering::SeqCst), 3);
    }
}
