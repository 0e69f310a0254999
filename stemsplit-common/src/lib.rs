//! # stemsplit Common Library
//!
//! Shared code for the stemsplit services:
//! - Layered configuration (CLI → ENV → TOML → defaults)
//! - Tracing subscriber setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
