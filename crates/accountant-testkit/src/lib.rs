//! # Accountant Testkit
//!
//! Testing utilities for the Accountant ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known values with their expected canonical bytes and signatures
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Recordable test models
//!
//! ## Golden Vectors
//!
//! Golden vectors pin the canonical encoding across implementations:
//!
//! ```rust
//! use accountant_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, _, signature) in verify_all_vectors() {
//!     println!("{name}: {matches} {signature}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use accountant_testkit::generators::{payload_from_params, PayloadParams};
//!
//! proptest! {
//!     #[test]
//!     fn payload_is_deterministic(params: PayloadParams) {
//!         prop_assert_eq!(payload_from_params(&params), payload_from_params(&params));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use accountant_testkit::fixtures::{Article, User};
//!
//! let article = Article::new(1).with_cipher("content", "bleach");
//! let user = User::new(1, "Ada");
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{Article, User, CREATED_AT};
pub use generators::{payload_from_params, PayloadParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
