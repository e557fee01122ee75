//! Minimal blocking IMAP4rev1 client over implicit TLS.
//!
//! Only the commands the poller needs: LOGIN, SELECT, SEARCH UNSEEN,
//! FETCH RFC822 and LOGOUT. Message bodies are read as IMAP literals, so
//! arbitrary bytes survive intact.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tracing::debug;

use super::{MailboxConnector, MailboxSession};
use crate::config::MailConfig;
use crate::error::{ConnectionError, FetchError};

const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens a fresh TLS session per poll cycle.
pub struct ImapConnector {
    config: MailConfig,
    tls: Arc<ClientConfig>,
}

impl ImapConnector {
    pub fn new(config: MailConfig) -> Result<Self, ConnectionError> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnectionError::Tls {
            host: config.imap_host.clone(),
            reason: e.to_string(),
        })?
        .with_root_certificates(root_store)
        .with_no_client_auth();

        Ok(Self {
            config,
            tls: Arc::new(tls),
        })
    }
}

impl MailboxConnector for ImapConnector {
    fn connect(&self) -> Result<Box<dyn MailboxSession>, ConnectionError> {
        let host = self.config.imap_host.clone();
        let io_err = |source| ConnectionError::Io {
            host: host.clone(),
            source,
        };

        let tcp = TcpStream::connect((host.as_str(), self.config.imap_port)).map_err(io_err)?;
        tcp.set_read_timeout(Some(IO_TIMEOUT)).map_err(io_err)?;
        tcp.set_write_timeout(Some(IO_TIMEOUT)).map_err(io_err)?;

        let server_name =
            ServerName::try_from(host.clone()).map_err(|e| ConnectionError::Tls {
                host: host.clone(),
                reason: e.to_string(),
            })?;
        let conn = ClientConnection::new(Arc::clone(&self.tls), server_name).map_err(|e| {
            ConnectionError::Tls {
                host: host.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut session = ImapSession::new(StreamOwned::new(conn, tcp), host);
        session.read_greeting()?;

        let login = session.command(&format!(
            "LOGIN {} {}",
            quote(&self.config.username),
            quote(self.config.password.expose_secret())
        ))?;
        if !login.is_ok() {
            // Close politely; the server may keep the socket otherwise.
            session.logout();
            return Err(ConnectionError::AuthFailed {
                user: self.config.username.clone(),
            });
        }

        let select = session.command("SELECT \"INBOX\"")?;
        if !select.is_ok() {
            session.logout();
            return Err(ConnectionError::CommandFailed {
                command: "SELECT".into(),
                response: select.status,
            });
        }

        debug!(host = %self.config.imap_host, "IMAP session established");
        Ok(Box::new(session))
    }
}

/// Tagged command response: untagged lines, literals, and the final status.
#[derive(Debug, Default)]
struct Response {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
    /// Tagged status line minus the tag, e.g. `OK LOGIN completed`.
    status: String,
}

impl Response {
    fn is_ok(&self) -> bool {
        self.status.starts_with("OK")
    }
}

/// A live session. Generic over the stream so tests can script the server.
pub struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    host: String,
    next_tag: u32,
    logged_out: bool,
    /// Set once a read or write fails. The stream may be mid-response, so
    /// nothing more is sent on it.
    broken: bool,
}

impl<S: Read + Write> ImapSession<S> {
    pub fn new(stream: S, host: String) -> Self {
        Self {
            stream: BufReader::new(stream),
            host,
            next_tag: 1,
            logged_out: false,
            broken: false,
        }
    }

    fn read_greeting(&mut self) -> Result<(), ConnectionError> {
        let greeting = self.read_line()?;
        if greeting.starts_with("* OK") || greeting.starts_with("* PREAUTH") {
            Ok(())
        } else {
            Err(ConnectionError::CommandFailed {
                command: "greeting".into(),
                response: greeting.trim_end().to_string(),
            })
        }
    }

    fn read_line(&mut self) -> Result<String, ConnectionError> {
        let mut buf = Vec::new();
        let n = self
            .stream
            .read_until(b'\n', &mut buf)
            .map_err(|source| self.io_error(source))?;
        if n == 0 {
            return Err(ConnectionError::Closed);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn io_error(&self, source: std::io::Error) -> ConnectionError {
        ConnectionError::Io {
            host: self.host.clone(),
            source,
        }
    }

    fn command(&mut self, cmd: &str) -> Result<Response, ConnectionError> {
        if self.broken {
            return Err(ConnectionError::Closed);
        }
        let result = self.exchange(cmd);
        if matches!(
            result,
            Err(ConnectionError::Io { .. } | ConnectionError::Closed)
        ) {
            self.broken = true;
        }
        result
    }

    fn exchange(&mut self, cmd: &str) -> Result<Response, ConnectionError> {
        let tag = format!("A{:04}", self.next_tag);
        self.next_tag += 1;

        let full = format!("{tag} {cmd}\r\n");
        let written = {
            let inner = self.stream.get_mut();
            inner.write_all(full.as_bytes()).and_then(|()| inner.flush())
        };
        written.map_err(|source| self.io_error(source))?;

        let mut response = Response::default();
        loop {
            let line = self.read_line()?;

            if let Some(rest) = line.strip_prefix(&tag).and_then(|r| r.strip_prefix(' ')) {
                response.status = rest.trim_end().to_string();
                return Ok(response);
            }

            if let Some(len) = literal_length(&line) {
                let mut literal = vec![0u8; len];
                self.stream
                    .read_exact(&mut literal)
                    .map_err(|source| self.io_error(source))?;
                response.literals.push(literal);
            }
            response.lines.push(line);
        }
    }
}

impl<S: Read + Write> MailboxSession for ImapSession<S> {
    fn search_unseen(&mut self) -> Result<Vec<String>, ConnectionError> {
        let resp = self.command("SEARCH UNSEEN")?;
        if !resp.is_ok() {
            return Err(ConnectionError::CommandFailed {
                command: "SEARCH".into(),
                response: resp.status,
            });
        }
        Ok(parse_search(&resp.lines))
    }

    fn fetch(&mut self, id: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.command(&format!("FETCH {id} RFC822")).map_err(|e| {
            let reason = e.to_string();
            if self.broken {
                FetchError::ConnectionLost {
                    id: id.to_string(),
                    reason,
                }
            } else {
                FetchError::Failed {
                    id: id.to_string(),
                    reason,
                }
            }
        })?;
        if !resp.is_ok() {
            return Err(FetchError::Failed {
                id: id.to_string(),
                reason: resp.status,
            });
        }
        resp.literals
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Empty { id: id.to_string() })
    }

    fn logout(&mut self) {
        if self.logged_out {
            return;
        }
        self.logged_out = true;
        if self.broken {
            debug!(host = %self.host, "IMAP connection already lost, not sending LOGOUT");
            return;
        }
        if let Err(e) = self.command("LOGOUT") {
            debug!(host = %self.host, error = %e, "IMAP logout did not complete cleanly");
        }
    }
}

/// `{123}\r\n` at end of line → 123.
fn literal_length(line: &str) -> Option<usize> {
    let trimmed = line.trim_end();
    let open = trimmed.rfind('{')?;
    let inner = trimmed[open + 1..].strip_suffix('}')?;
    inner.trim_end_matches('+').parse().ok()
}

fn parse_search(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace())
        .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

/// IMAP quoted string.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
