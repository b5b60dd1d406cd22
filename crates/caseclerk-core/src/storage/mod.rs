//! # Storage Module
//!
//! Disk persistence for a [`Database`](crate::Database) using redb.
//!
//! Uses redb embedded database for:
//! - ACID transactions (a save replaces everything or nothing)
//! - Crash safety (copy-on-write B-trees)
//! - One table per collection, so a store can be inspected record by record

mod redb_store;

pub use redb_store::RedbStore;
