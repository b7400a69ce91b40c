//! Core Error Types
//!
//! Startup and process-level failures of the gateway: reading and validating
//! configuration, wiring services, binding the listener. Request-path failures
//! have their own enums (`LlmError`, `CascadeError`, `PipelineError`) and never
//! become a `CoreError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting that cannot be used as given (bad PORT, unbindable address,
    /// HTTP client or route table that cannot be built)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The config file exists but is not valid TOML for `GatewayConfig`
    #[error("Parse error: {0}")]
    Parse(String),

    /// Well-formed configuration that the cascade cannot run with
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP server stopped with an error
    #[error("Server error: {0}")]
    Server(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }

    /// Whether fixing the config file (rather than the environment) resolves it.
    pub fn is_config_file_problem(&self) -> bool {
        matches!(self, CoreError::Parse(_) | CoreError::Validation(_))
    }
}
