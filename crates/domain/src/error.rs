/// Shared error type used across all navigation-agent crates.
///
/// Variants map onto the error taxonomy of the design: most of these are
/// recoverable within a turn and are folded back into chat history as data
/// by the agent loop rather than unwound as Rust errors. Only browser loss
/// and signal-driven shutdown are allowed to propagate out of `main`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("Timeout after {0}s")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("locator unresolved: {0}")]
    Locator(String),

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("delegation: {0}")]
    Delegation(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("sqlite: {0}")]
    Sqlite(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors the agent loop should fold back into chat history as
    /// data (a synthetic user message or a tool result) rather than abort on.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Io(_))
    }
}
