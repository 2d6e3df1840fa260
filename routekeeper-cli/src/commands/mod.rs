//! CLI command implementations.

mod common;
pub mod replay;
pub mod validate;
