use thiserror::Error;

/// Funds pipeline errors.
///
/// Client-class variants carry a stable snake_case reason code so callers can
/// branch on the code while the message stays free to change.
#[derive(Debug, Error)]
pub enum FundsError {
    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("{message}")]
    State { code: &'static str, message: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("actor '{actor}' lacks the '{capability}' capability")]
    Authorization { actor: String, capability: &'static str },

    #[error("storage error: {0}")]
    Persistence(String),

    #[error("internal consistency violation: {0}")]
    Inconsistency(String),
}

impl FundsError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn state(code: &'static str, message: impl Into<String>) -> Self {
        Self::State {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable reason code for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } => code,
            Self::State { code, .. } => code,
            Self::NotFound { .. } => "not_found",
            Self::Authorization { .. } => "forbidden",
            Self::Persistence(_) => "persistence",
            Self::Inconsistency(_) => "inconsistency",
        }
    }
}
