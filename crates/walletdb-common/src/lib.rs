//! walletdb Common - Shared types and utilities
//!
//! This crate provides the error type and configuration structures
//! used across all walletdb components.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, Result};
