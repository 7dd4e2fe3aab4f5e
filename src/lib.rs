//! Marketplace Ledger Library
//!
//! Transactional inventory ledger (purchase, rent, complete rental) and a
//! read-through reference cache over an external vehicle taxonomy service.

pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod handlers;
pub mod jobs;
pub mod ledger;
pub mod notifications;
pub mod reference;

pub use config::Config;
pub use domain::{AuthContext, DomainError, Money, MoneyError};
pub use error::{AppError, AppResult, ErrorKind, ErrorResponse};
