//! Binary and JSON snapshot encodings.
//!
//! Binary layout:
//!
//! ```text
//! +----------+-----------+------------------+
//! | CCLKSNAP | version   | postcard payload |
//! | 8 bytes  | u16 (LE)  | ...              |
//! +----------+-----------+------------------+
//! ```

use crate::database::{Database, Snapshot};
use crate::error::{CoreError, CoreResult};

pub const SNAPSHOT_MAGIC: &[u8; 8] = b"CCLKSNAP";

/// Bump when the record layout changes.
pub const SNAPSHOT_VERSION: u16 = 1;

const HEADER_LEN: usize = SNAPSHOT_MAGIC.len() + 2;

pub fn encode_snapshot(snapshot: &Snapshot) -> CoreResult<Vec<u8>> {
    let payload = postcard::to_stdvec(snapshot)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(SNAPSHOT_MAGIC);
    bytes.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub fn decode_snapshot(bytes: &[u8]) -> CoreResult<Snapshot> {
    let Some((magic, rest)) = bytes.split_first_chunk::<8>() else {
        return Err(CoreError::Format("file is too short".to_string()));
    };
    if magic != SNAPSHOT_MAGIC {
        return Err(CoreError::Format("not a CaseClerk snapshot".to_string()));
    }
    let Some((version, payload)) = rest.split_first_chunk::<2>() else {
        return Err(CoreError::Format("missing format version".to_string()));
    };
    let version = u16::from_le_bytes(*version);
    if version != SNAPSHOT_VERSION {
        return Err(CoreError::Format(format!(
            "version {} (expected {})",
            version, SNAPSHOT_VERSION
        )));
    }
    Ok(postcard::from_bytes(payload)?)
}

pub fn encode_database(db: &Database) -> CoreResult<Vec<u8>> {
    encode_snapshot(&db.snapshot())
}

pub fn decode_database(bytes: &[u8]) -> CoreResult<Database> {
    Database::from_snapshot(decode_snapshot(bytes)?)
}

/// Pretty-printed JSON, for export.
pub fn snapshot_to_json(snapshot: &Snapshot) -> CoreResult<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn snapshot_from_json(json: &str) -> CoreResult<Snapshot> {
    Ok(serde_json::from_str(json)?)
}
