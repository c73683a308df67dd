/// Shared error type used across all akd crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("executor {kind}: {message}")]
    Executor { kind: String, message: String },

    #[error("rpc: {0}")]
    Rpc(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session gone: {0}")]
    SessionGone(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The four reaction buckets from the error handling design: a failure's
/// *kind* determines how the daemon reacts, independent of its message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Recoverable at the session level — surface to the session and move on.
    TransientSession,
    /// Failure of a single turn — end the turn with an error status.
    Turn,
    /// Infrastructure trouble (child process died, disk full) — log loudly,
    /// keep the daemon alive.
    Infra,
    /// Cannot continue running at all.
    FatalStartup,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::SessionNotFound(_) | Error::SessionGone(_) => ErrorClass::TransientSession,
            Error::Timeout(_) | Error::Rpc(_) => ErrorClass::Turn,
            Error::Executor { .. } | Error::Io(_) => ErrorClass::Infra,
            Error::Config(_) => ErrorClass::FatalStartup,
            Error::Json(_) | Error::Other(_) => ErrorClass::Infra,
        }
    }
}
