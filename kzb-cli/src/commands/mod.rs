//! CLI command implementations.

pub mod cat;
pub mod common;
pub mod config;
pub mod info;
pub mod ls;
pub mod refs;
pub mod shortcuts;
