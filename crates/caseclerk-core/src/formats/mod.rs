//! # Formats Module
//!
//! Serialization of a [`Snapshot`](crate::Snapshot) to bytes and back.
//!
//! This module contains:
//! - Binary snapshot format (header + postcard)
//! - JSON export/import
//!
//! Note: File I/O stays in the app layer (apps/caseclerk).
//! This module only handles format conversion (pure transformations).

mod persistence;

pub use persistence::*;
