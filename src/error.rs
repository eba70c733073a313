//! Error taxonomy for the conversation engine.

/// Rejected before any transport call; surfaced to the caller synchronously.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Message body is empty after trimming.
    #[error("message body is empty")]
    EmptyBody,
    /// Message body exceeds the allowed number of code points.
    #[error("message body exceeds {limit} characters")]
    BodyTooLong { limit: usize },
}

/// Network or store failure. No local state is mutated; the same operation is
/// safe to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Engine error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Validation error
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Unknown conversation or message identifier at the data-access boundary.
    /// Update events for unknown identifiers never reach this: they are
    /// dropped as no-ops before an error is constructed.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl ChatError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(TransportError::new(message))
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ChatError::not_found("conversation", "c-9");
        assert_eq!(err.to_string(), "conversation not found: c-9");

        let err = ChatError::from(ValidationError::BodyTooLong { limit: 500 });
        assert_eq!(err.to_string(), "message body exceeds 500 characters");
    }
}
