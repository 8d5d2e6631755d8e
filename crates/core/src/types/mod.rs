//! Core types for Veloure.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod quantity;

pub use cart::{Cart, CartLine, ProductSnapshot};
pub use id::*;
pub use price::{CurrencyCode, Price, UnknownCurrencyError};
pub use quantity::{normalize_qty, parse_qty};
