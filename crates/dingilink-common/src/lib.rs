//! Dingilink Common Library
//!
//! Version: 0.3.0
//! Purpose: Error types shared across the Dingilink workspace
//! License: Apache-2.0/MIT

pub mod error;

pub use error::{DingilinkError, Result};
