//! redb-backed snapshot store.

use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::database::{Database, Snapshot};
use crate::error::{CoreError, CoreResult};
use crate::store::Record;
use crate::DocumentId;

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

const CASES: RecordTable = TableDefinition::new("cases");
const DOCUMENTS: RecordTable = TableDefinition::new("documents");
const CALL_LOGS: RecordTable = TableDefinition::new("call_logs");
const EVENTS: RecordTable = TableDefinition::new("calendar_events");
const USERS: RecordTable = TableDefinition::new("users");
const BLOBS: RecordTable = TableDefinition::new("blobs");

/// Id counters and the layout version.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const LAYOUT_VERSION: u64 = 1;

const ALL_RECORD_TABLES: [RecordTable; 6] = [CASES, DOCUMENTS, CALL_LOGS, EVENTS, USERS, BLOBS];

/// A database file holding one snapshot.
pub struct RedbStore {
    db: RedbDatabase,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Opens or creates a store, making sure every table exists.
    pub fn open(path: &Path) -> CoreResult<Self> {
        let db = RedbDatabase::create(path).map_err(CoreError::storage)?;
        let txn = db.begin_write().map_err(CoreError::storage)?;
        {
            for table in ALL_RECORD_TABLES {
                txn.open_table(table).map_err(CoreError::storage)?;
            }
            let mut meta = txn.open_table(META).map_err(CoreError::storage)?;
            if meta.get("layout_version").map_err(CoreError::storage)?.is_none() {
                meta.insert("layout_version", LAYOUT_VERSION)
                    .map_err(CoreError::storage)?;
            }
        }
        txn.commit().map_err(CoreError::storage)?;
        let store = Self { db };
        store.check_layout()?;
        Ok(store)
    }

    fn check_layout(&self) -> CoreResult<()> {
        let txn = self.db.begin_read().map_err(CoreError::storage)?;
        let version = read_meta(&txn, "layout_version")?;
        if version != Some(LAYOUT_VERSION) {
            return Err(CoreError::Format(format!(
                "redb layout version {:?} (expected {})",
                version, LAYOUT_VERSION
            )));
        }
        Ok(())
    }

    /// Replaces the stored snapshot in one transaction.
    pub fn save(&self, snapshot: &Snapshot) -> CoreResult<()> {
        let txn = self.db.begin_write().map_err(CoreError::storage)?;
        write_records(&txn, CASES, &snapshot.cases)?;
        write_records(&txn, DOCUMENTS, &snapshot.documents)?;
        write_records(&txn, CALL_LOGS, &snapshot.call_logs)?;
        write_records(&txn, EVENTS, &snapshot.calendar_events)?;
        write_records(&txn, USERS, &snapshot.users)?;
        {
            let mut blobs = clear_table(&txn, BLOBS)?;
            for (id, bytes) in &snapshot.blobs {
                blobs
                    .insert(id.0, bytes.as_slice())
                    .map_err(CoreError::storage)?;
            }
            let mut meta = txn.open_table(META).map_err(CoreError::storage)?;
            for (key, value) in [
                ("next_case_id", snapshot.next_case_id),
                ("next_document_id", snapshot.next_document_id),
                ("next_call_log_id", snapshot.next_call_log_id),
                ("next_event_id", snapshot.next_event_id),
                ("next_user_id", snapshot.next_user_id),
            ] {
                meta.insert(key, value).map_err(CoreError::storage)?;
            }
        }
        txn.commit().map_err(CoreError::storage)
    }

    pub fn load(&self) -> CoreResult<Snapshot> {
        let txn = self.db.begin_read().map_err(CoreError::storage)?;
        let mut blobs = Vec::new();
        {
            let table = txn.open_table(BLOBS).map_err(CoreError::storage)?;
            for entry in table.iter().map_err(CoreError::storage)? {
                let (id, bytes) = entry.map_err(CoreError::storage)?;
                blobs.push((DocumentId(id.value()), bytes.value().to_vec()));
            }
        }
        let counter = |key| read_meta(&txn, key).map(|v| v.unwrap_or(1));
        Ok(Snapshot {
            cases: read_records(&txn, CASES)?,
            next_case_id: counter("next_case_id")?,
            documents: read_records(&txn, DOCUMENTS)?,
            next_document_id: counter("next_document_id")?,
            call_logs: read_records(&txn, CALL_LOGS)?,
            next_call_log_id: counter("next_call_log_id")?,
            calendar_events: read_records(&txn, EVENTS)?,
            next_event_id: counter("next_event_id")?,
            users: read_records(&txn, USERS)?,
            next_user_id: counter("next_user_id")?,
            blobs,
        })
    }

    pub fn save_database(&self, db: &Database) -> CoreResult<()> {
        self.save(&db.snapshot())
    }

    pub fn load_database(&self) -> CoreResult<Database> {
        Database::from_snapshot(self.load()?)
    }
}

fn clear_table<'txn>(
    txn: &'txn WriteTransaction,
    def: RecordTable,
) -> CoreResult<redb::Table<'txn, u64, &'static [u8]>> {
    txn.delete_table(def).map_err(CoreError::storage)?;
    txn.open_table(def).map_err(CoreError::storage)
}

fn write_records<T>(txn: &WriteTransaction, def: RecordTable, records: &[T]) -> CoreResult<()>
where
    T: Record + Serialize,
{
    let mut table = clear_table(txn, def)?;
    for record in records {
        let bytes = postcard::to_stdvec(record)?;
        table
            .insert(Into::<u64>::into(record.id()), bytes.as_slice())
            .map_err(CoreError::storage)?;
    }
    Ok(())
}

fn read_records<T: DeserializeOwned>(txn: &ReadTransaction, def: RecordTable) -> CoreResult<Vec<T>> {
    let table = txn.open_table(def).map_err(CoreError::storage)?;
    let mut records = Vec::new();
    for entry in table.iter().map_err(CoreError::storage)? {
        let (_, bytes) = entry.map_err(CoreError::storage)?;
        records.push(postcard::from_bytes(bytes.value())?);
    }
    Ok(records)
}

fn read_meta(txn: &ReadTransaction, key: &str) -> CoreResult<Option<u64>> {
    let table = txn.open_table(META).map_err(CoreError::storage)?;
    Ok(table
        .get(key)
        .map_err(CoreError::storage)?
        .map(|v| v.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCase, NewDocument};
    use crate::CaseStatus;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample() -> Database {
        let mut db = Database::new();
        for (n, status) in [("CV-1", CaseStatus::Active), ("CV-2", CaseStatus::Closed)] {
            db.create_case(
                NewCase {
                    case_number: n.to_string(),
                    title: format!("Matter {}", n),
                    client_name: "Client".to_string(),
                    status,
                    ..NewCase::default()
                },
                None,
                Utc::now(),
            )
            .unwrap();
        }
        db.create_document(
            NewDocument {
                file_name: "scan.png".to_string(),
                mime_type: "image/png".to_string(),
                ..NewDocument::default()
            },
            vec![0x89, b'P', b'N', b'G'],
            None,
            Utc::now(),
        )
        .unwrap();
        db
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("cc.redb")).unwrap();
        let db = sample();
        store.save_database(&db).unwrap();
        assert_eq!(store.load_database().unwrap(), db);
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cc.redb");
        let store = RedbStore::open(&path).unwrap();
        let mut db = sample();
        store.save_database(&db).unwrap();

        let first = db.snapshot().cases[0].id;
        db.delete_case(first).unwrap();
        store.save_database(&db).unwrap();
        drop(store);

        let reopened = RedbStore::open(&path).unwrap().load_database().unwrap();
        assert_eq!(reopened.counts().cases, 1);
        assert_eq!(reopened.snapshot().next_case_id, 3);
    }

    #[test]
    fn fresh_store_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore::open(&dir.path().join("empty.redb")).unwrap();
        assert!(store.load_database().unwrap().is_empty());
    }
}
