//! Core document types, validation, numbering and issuer configuration.
//!
//! This module provides the document model for electronic invoices, credit
//! notes and debit notes, with the totals computed from the line items.

mod builder;
mod config;
mod error;
mod numbering;
mod types;
pub mod units;
mod validation;

pub use builder::*;
pub use config::*;
pub use error::*;
pub use numbering::*;
pub use types::*;
pub use units::is_known_unit_code;
pub use validation::{calculate_totals, is_valid_gtin, nit_check_digit};
