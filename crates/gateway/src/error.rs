//! Error types for the gateway crate

use thiserror::Error;

/// Transport-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Send failed: {0}")]
    Send(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Timeout waiting for response")]
    Timeout,
}

/// Gateway-level errors (adapter construction and wiring)
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid adapter configuration: {0}")]
    Config(String),
}

/// Outcome of a failed execution attempt
///
/// Both variants are retryable by the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Execution timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Execution failed: {0}")]
    Failed(String),
}

impl ExecutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout { .. })
    }
}

impl From<TransportError> for ExecutionError {
    fn from(e: TransportError) -> Self {
        ExecutionError::Failed(e.to_string())
    }
}
