//! # Contact-matrix access for gtars.
//!
//! This crate provides the small slice of Hi-C infrastructure the dot caller
//! consumes: a bin table with chromosome extents and balancing weights, a
//! read-only [`ContactMatrix`] store, per-chromosome expected profiles with
//! their Toeplitz expansion, and readers for tab-separated bins, pixels and
//! expected tables (optionally gzipped).
//!
pub mod errors;
pub mod models;
pub mod store;
pub mod utils;

// re-exports
pub use errors::*;
pub use models::*;
pub use store::{ContactMatrix, InMemoryContacts};
