//! # fedsync common library
//!
//! Shared code for the federation data services:
//! - Common error type
//! - Bootstrap configuration (TOML) loading and writing
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
