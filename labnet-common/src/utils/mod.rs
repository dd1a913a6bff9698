//! utils
//!
//! Identifier types shared by every labnet crate.

pub mod name;
pub use name::{EndName, ServerName};
