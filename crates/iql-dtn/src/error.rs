//! DTN-specific error types

use thiserror::Error;

/// Errors that can occur in the routing core
#[derive(Debug, Error)]
pub enum DtnError {
    /// Buffer-related errors
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Errors reported by the host
    #[error("Host error: {0}")]
    Host(#[from] iql_core::HostError),
}

/// Buffer space errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// Message can never fit, even in an empty buffer
    #[error("Message exceeds buffer capacity (size: {size}, capacity: {capacity})")]
    TooLarge { size: usize, capacity: usize },

    /// Every remaining message is being transferred
    #[error("No evictable message left (needed: {needed}, free: {free})")]
    NoEvictableMessage { needed: usize, free: usize },
}

/// Result type for DTN operations
pub type DtnResult<T> = Result<T, DtnError>;
