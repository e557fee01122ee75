//! Error types for catch-that-phish.

/// Top-level error type for startup and wiring.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Mailbox connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Reply transport error: {0}")]
    Send(#[from] SendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failure to establish or drive an IMAP session. Aborts the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("IO error talking to {host}: {source}")]
    Io {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed for {host}: {reason}")]
    Tls { host: String, reason: String },

    #[error("IMAP login rejected for {user}")]
    AuthFailed { user: String },

    #[error("IMAP {command} failed: {response}")]
    CommandFailed { command: String, response: String },

    #[error("IMAP connection closed by server")]
    Closed,
}

/// Failure fetching a single message by id.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Fetch of message {id} failed: {reason}")]
    Failed { id: String, reason: String },

    #[error("Fetch of message {id} returned no body")]
    Empty { id: String },

    /// The connection dropped mid-command; the session is unusable.
    #[error("Connection lost while fetching message {id}: {reason}")]
    ConnectionLost { id: String, reason: String },
}

/// Failure turning a fetched message into classifiable text.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Message is not parseable as RFC 822")]
    Malformed,

    #[error("Message has no sender address")]
    MissingSender,

    #[error("Failed to decode {content_type} payload: {reason}")]
    Decode {
        content_type: String,
        reason: String,
    },
}

/// Classifier errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to load {artifact} from {path}: {reason}")]
    Load {
        artifact: String,
        path: String,
        reason: String,
    },

    #[error("Model shape mismatch: {0}")]
    Shape(String),

    #[error("Input rejected by vectorizer: {0}")]
    NonText(String),
}

/// Reply dispatch errors.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Failed to build reply: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Transport(String),
}

/// Everything that can go wrong for one message inside a poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Send(#[from] SendError),
}

/// Result type alias for startup code.
pub type Result<T> = std::result::Result<T, Error>;
