//! Closed error taxonomy surfaced by the engine.

use thiserror::Error;

/// All errors the engine reports to its host.
///
/// Every variant is constructed explicitly at its failure site; nothing is
/// inferred from the shape of a caught value.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No opening template resolves for the unit, neither through a
    /// unit-specific binding nor through the default-flagged template.
    #[error("no opening template found for unit {unit_id}")]
    TemplateNotFound { unit_id: String },

    /// The template resolved but carries no active questions.
    #[error("template {template_id} has no questions")]
    QuestionsNotFound { template_id: String },

    /// Submission preconditions are not met: the answer set fails
    /// validation, or the session is missing its template or executor.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// A remote create/save/complete call was rejected.
    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },

    /// Explicit connectivity failure, distinguished from a server rejection
    /// where the transport can tell the difference.
    #[error("network error: {message}")]
    Network { message: String },

    /// A draft write could not be persisted.
    #[error("could not save draft: {message}")]
    DraftStore { message: String },
}

impl EngineError {
    /// Classify a transport failure into connectivity vs. remote rejection.
    pub(crate) fn from_http(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Network {
                message: err.to_string(),
            }
        } else {
            Self::ExecutionFailed {
                message: err.to_string(),
            }
        }
    }

    /// Short message suitable for direct display to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::TemplateNotFound { .. } => "No checklist is configured for this unit.",
            Self::QuestionsNotFound { .. } => "This checklist has no questions.",
            Self::Validation { .. } => "Please review the highlighted questions.",
            Self::ExecutionFailed { .. } => "The checklist could not be submitted. Try again.",
            Self::Network { .. } => "No connection. Your answers are kept on this device.",
            Self::DraftStore { .. } => "Your progress could not be saved on this device.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_covers_every_kind() {
        // Each kind maps to a short, non-empty display string.
        let errors = [
            EngineError::TemplateNotFound {
                unit_id: "u1".into(),
            },
            EngineError::QuestionsNotFound {
                template_id: "t1".into(),
            },
            EngineError::Validation {
                message: "m".into(),
            },
            EngineError::ExecutionFailed {
                message: "m".into(),
            },
            EngineError::Network {
                message: "m".into(),
            },
            EngineError::DraftStore {
                message: "m".into(),
            },
        ];
        for e in errors {
            assert!(!e.user_message().is_empty());
        }
    }
}
