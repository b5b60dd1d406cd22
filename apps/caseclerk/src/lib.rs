//! # CaseClerk Library
//!
//! This library exposes the CaseClerk modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;

// Re-export caseclerk_core for convenience
pub use caseclerk_core;
