//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;
use uuid::Uuid;

use super::{ItemStatus, MoneyError, RentalStatus};

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// No authenticated actor on the operation
    #[error("Authentication required")]
    Unauthenticated,

    /// Item does not exist
    #[error("Item not found: {0}")]
    ItemNotFound(Uuid),

    /// Rental does not exist
    #[error("Rental not found: {0}")]
    RentalNotFound(Uuid),

    /// Item cannot leave its current status
    #[error("Item {item_id} is not available (status: {status})")]
    ItemUnavailable { item_id: Uuid, status: ItemStatus },

    /// Buyer or renter is the item's owner
    #[error("Cannot trade your own item")]
    SelfTrade,

    /// Item carries no rental price
    #[error("Item {0} is not offered for rent")]
    NotRentable(Uuid),

    /// Malformed or out-of-range rental dates
    #[error("Invalid rental period: {0}")]
    InvalidPeriod(String),

    /// Actor is neither owner nor renter of the rental
    #[error("User {actor_id} is not a party to rental {rental_id}")]
    NotRentalParty { rental_id: Uuid, actor_id: Uuid },

    /// Rental already settled
    #[error("Rental {rental_id} is not active (status: {status})")]
    RentalNotActive { rental_id: Uuid, status: RentalStatus },

    /// Illegal item status transition
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },

    /// Arithmetic or validation failure on an amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),
}

impl DomainError {
    /// Check if this is a state/business-rule violation
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            Self::ItemUnavailable { .. }
                | Self::SelfTrade
                | Self::NotRentable(_)
                | Self::RentalNotActive { .. }
                | Self::InvalidTransition { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_error() {
        let item_id = Uuid::new_v4();
        let err = DomainError::ItemUnavailable {
            item_id,
            status: ItemStatus::Sold,
        };

        assert!(err.is_precondition_failure());
        assert!(err.to_string().contains("sold"));
    }

    #[test]
    fn test_invalid_period_is_not_precondition() {
        let err = DomainError::InvalidPeriod("end before start".to_string());
        assert!(!err.is_precondition_failure());
    }
}
