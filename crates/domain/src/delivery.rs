use thiserror::Error;

/// Whether a failed delivery attempt can ever succeed when retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The attempt can never succeed as given, e.g. the issue was deleted
    /// or the integration lost access to the repository.
    Permanent,
    /// A temporary condition like rate limiting or a network blip.
    Transient,
}

impl ErrorKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Permanent => "PERMANENT",
            Self::Transient => "TEMPORARY",
        }
    }
}

/// Error produced when a reminder could not be delivered.
///
/// The `kind` is decided where the error is constructed, so that the retry
/// policy never has to inspect the message text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {message}", kind.label())]
pub struct DeliveryError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DeliveryError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind == ErrorKind::Permanent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_with_kind_prefix() {
        assert_eq!(
            DeliveryError::permanent("Issue not found (404)").to_string(),
            "PERMANENT: Issue not found (404)"
        );
        assert_eq!(
            DeliveryError::transient("Rate limit exceeded").to_string(),
            "TEMPORARY: Rate limit exceeded"
        );
    }

    #[test]
    fn kind_is_carried_explicitly() {
        // A transient error mentioning the word permanent is still transient
        let err = DeliveryError::transient("upstream said PERMANENT redirect");
        assert!(!err.is_permanent());
        assert!(DeliveryError::permanent("gone").is_permanent());
    }
}
