use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeminiAgentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Gemini CLI not found. Install it with 'npm install -g @google/gemini-cli'")]
    BinaryNotFound { binary: String },

    #[error("Failed to launch '{binary}': {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process error: {0}")]
    Process(String),
}

/// Failures of the hosted API path. None of these reach the caller directly;
/// they are logged (redacted) and trigger the CLI fallback.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no usable API key configured")]
    MissingKey,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("response blocked: {0}")]
    Blocked(String),

    #[error("response contained no text")]
    EmptyResponse,

    #[error("hosted call did not finish before the invocation deadline")]
    DeadlineExceeded,
}
