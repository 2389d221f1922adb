//! Shared utilities and common types for the race registration backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (hashing, HMAC signatures, capability tokens)
//! - Common validation logic

pub mod crypto;
pub mod validation;
