use thiserror::Error;

/// Top-level error type for the IoT agent.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid subnet: {0}")]
    InvalidSubnet(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
