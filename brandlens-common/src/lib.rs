//! # Brandlens Common Library
//!
//! Shared code for the brandlens crates:
//! - Error types
//! - Configuration file resolution and TOML loading
//! - Atomic file writes

pub mod config;
pub mod error;

pub use error::{Error, Result};
