//! Auth Context
//!
//! Typed identity of the actor performing an operation, plus request
//! correlation metadata for tracing. Passed explicitly into every ledger
//! and reference-cache call.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DomainError;

/// Context for an operation, supplied by the authentication layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user, absent for anonymous callers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl AuthContext {
    /// Create an anonymous context
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create a context for an authenticated user
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            correlation_id: None,
        }
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// The acting user, or `Unauthenticated` when the caller carries no identity
    pub fn current_user_id(&self) -> Result<Uuid, DomainError> {
        self.user_id.ok_or(DomainError::Unauthenticated)
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}
