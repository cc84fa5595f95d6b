//! Capability-based authorization seam.
//!
//! The pipeline checks capabilities, not role labels; mapping actors to
//! capabilities is the authorization collaborator's concern.

use crate::error::FundsError;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// May decide fund requests (approve/reject).
    Supervisory,
    /// May record and reverse partial payments.
    FinanceOperator,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Self::Supervisory => "supervisory",
            Self::FinanceOperator => "finance_operator",
        }
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn allows(&self, actor: &str, capability: Capability) -> Result<bool, FundsError>;

    /// Convenience wrapper turning a denial into the uniform error.
    async fn require(&self, actor: &str, capability: Capability) -> Result<(), FundsError> {
        if self.allows(actor, capability).await? {
            Ok(())
        } else {
            Err(FundsError::Authorization {
                actor: actor.to_string(),
                capability: capability.name(),
            })
        }
    }
}
