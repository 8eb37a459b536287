//! # dian-fe
//!
//! Colombian electronic invoicing for the DIAN validation platform: document
//! model, CUFE/CUDE fiscal identifiers, UBL 2.1 rendering, inclusive C14N
//! digests and XAdES-EPES enveloped signature blocks.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Line amounts are rounded to cents; document totals are exact sums of them.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::DateTime;
//! use dian_fe::core::*;
//! use rust_decimal_macros::dec;
//!
//! let issued_at = DateTime::parse_from_rfc3339("2024-01-15T10:30:00-05:00").unwrap();
//! let document = InvoiceBuilder::new(DocumentNumber::new("SETP", 990000000), issued_at)
//!     .issuer(PartyBuilder::new("35696051", "FLOR MARIA PINEDA CASAMA").check_digit("1").build())
//!     .customer(PartyBuilder::new("222222222222", "Consumidor Final").check_digit("7").build())
//!     .add_line(LineItemBuilder::new("P001", "Arroz Diana 500g", dec!(2), dec!(2500)).build())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(document.totals().subtotal, dec!(5000));
//! assert_eq!(document.totals().tax, dec!(950));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Document types, validation, numbering, configuration, CUFE/CUDE |
//! | `ubl` (default) | UBL 2.1 element tree, rendering and C14N digest |
//! | `xades` (default) | Signing provider seam, signature block embedding, verification |
//! | `batch` (default) | Bounded concurrent signing with timeouts and cancellation |
//! | `all` | Everything |
//!
//! The library emits `tracing` events and never installs a subscriber.

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod fiscal;

#[cfg(feature = "ubl")]
pub mod ubl;

#[cfg(feature = "xades")]
pub mod xades;

#[cfg(feature = "batch")]
pub mod batch;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
