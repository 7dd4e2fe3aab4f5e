//! Domain module
//!
//! Core domain types and business logic.

pub mod context;
pub mod error;
pub mod item;
pub mod money;
pub mod records;
pub mod rental;

pub use context::AuthContext;
pub use error::DomainError;
pub use item::{InventoryItem, ItemStatus};
pub use money::{Money, MoneyError};
pub use records::{RentalRecord, RentalStatus, SaleRecord, SaleStatus};
pub use rental::{LateFeePolicy, RentalPeriod, DATE_FORMAT};
