use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid prompt: must be non-empty string")]
    EmptyPrompt,

    #[error("Prompt too large ({len} characters, max {max})")]
    PromptTooLarge { len: usize, max: usize },

    #[error("Invalid task type: {0}")]
    InvalidTaskType(String),

    #[error("Invalid model name")]
    EmptyModelName,

    /// The offending name is kept for debugging but never rendered, since it
    /// may come from a tampered environment.
    #[error("Invalid model name characters")]
    InvalidModelNameCharacters(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
