//! SenMarket Core - Shared types library.
//!
//! This crate provides common types used across all SenMarket components:
//! - `storefront` - The JSON API consumed by the shop and the admin dashboard
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure calculations - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, money and statuses
//! - [`pricing`] - Order totals and coupon evaluation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::{
    AMOUNT_LIMIT, CouponRejection, CouponTerms, FormattedQuote, PricedLine, Quote, QuoteError,
    ShippingPolicy, TermsError,
};
pub use types::*;
