//! # CaseClerk Core
//!
//! Records and rules for a small law practice: cases, documents, call logs,
//! calendar events and the users who own them.
//!
//! The [`Database`] is an in-memory store. Every collection is a `BTreeMap`
//! keyed by a sequential id, so iteration order is stable and snapshots are
//! byte-for-byte reproducible. Persistence is optional and lives in
//! [`formats`] (single snapshot file) and [`storage`] (redb).
//!
//! Nothing in this crate is async or touches the network. The HTTP layer in
//! `apps/caseclerk` owns locking, authentication and latency simulation.

pub mod ai;
pub mod credentials;
pub mod database;
pub mod error;
pub mod formats;
pub mod model;
pub mod query;
pub mod seed;
pub mod storage;
pub mod store;

pub use database::{Database, DatabaseCounts, Snapshot};
pub use error::{CoreError, CoreResult};
pub use model::*;
pub use query::{ListParams, Page, Pagination, SortOrder};
pub use store::{Collection, Record};

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of a [`Case`].
    CaseId
);
define_id!(
    /// Identifier of a [`Document`].
    DocumentId
);
define_id!(
    /// Identifier of a [`CallLog`].
    CallLogId
);
define_id!(
    /// Identifier of a [`CalendarEvent`].
    EventId
);
define_id!(
    /// Identifier of a [`User`].
    UserId
);
