//! `gemini-agent`: runs prompts against Gemini.
//!
//! # Architecture
//!
//! ```text
//! InvocationRequest
//!     │
//!     ▼
//! Invoker          ← picks the model, owns the per-invocation deadline
//!     │
//!     ├── HostedBackend      ← generateContent over HTTPS, when a key is set
//!     │
//!     └── GeminiProcess      ← `gemini -m <model> -p <prompt>`, reduced env,
//!                               stdout read line by line, stderr drained
//!     ▼
//! InvocationResult ← success text, or a redacted failure with its kind
//! ```
//!
//! [`Invoker::stream`] runs the same path in a background task and yields
//! [`InvocationEvent`]s as they happen.

pub mod api;
pub mod error;
pub mod invoker;
pub mod process;
pub mod stream;
pub mod types;


pub use api::{GenerativeLanguageClient, HostedBackend};
pub use error::{ApiError, GeminiAgentError};
pub use invoker::{InvocationState, Invoker, Transition};
pub use process::CliInvocation;
pub use stream::{InvocationEvent, InvocationStream};
pub use types::{Backend, FailureKind, InvocationRequest, InvocationResult, MAX_PROMPT_CHARS};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, GeminiAgentError>;
