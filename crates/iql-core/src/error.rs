//! Error types shared by the IQL crates

use thiserror::Error;

/// Errors raised by a host when it cannot honor a buffer mutation
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Message {id} does not fit: {size} bytes requested, {free} free")]
    InsufficientSpace { id: String, size: usize, free: usize },

    #[error("Message already buffered: {0}")]
    Duplicate(String),

    #[error("Unknown link: {0}")]
    UnknownLink(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_display() {
        let err = HostError::InsufficientSpace {
            id: "M7".to_string(),
            size: 500,
            free: 120,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("M7"));
        assert!(msg.contains("500"));
        assert!(msg.contains("120"));

        assert!(format!("{}", HostError::UnknownLink(9)).contains('9'));
    }
}
