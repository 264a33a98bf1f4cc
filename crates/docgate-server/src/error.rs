//! Server plumbing errors.

use thiserror::Error;

/// Errors that stop the server.
///
/// Per-request failures never surface here; they become HTTP responses.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address is invalid or already taken.
    #[error("bind error: {0}")]
    Bind(String),

    /// I/O failure outside a single connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ServerError::Bind("address in use".to_string());
        assert_eq!(err.to_string(), "bind error: address in use");

        let err = ServerError::from(std::io::Error::other("broken pipe"));
        assert_eq!(err.to_string(), "I/O error: broken pipe");
    }
}
