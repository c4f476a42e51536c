//! SQLite-backed Store implementation

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use tracing::{debug, info};

use crate::DB_FILE;
use crate::filter::{Filter, FilterOp};
use crate::record::{IndexValue, Record};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE TABLE IF NOT EXISTS record_indexes (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    field TEXT NOT NULL,
    value,
    PRIMARY KEY (collection, id, field)
);

CREATE INDEX IF NOT EXISTS idx_record_indexes_field
    ON record_indexes (collection, field, value);
"#;

/// Persistent record store
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create a store in the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context("Failed to create store directory")?;
        let db_path = dir.join(DB_FILE);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
            .context("Failed to enable WAL journal")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        debug!(path = %db_path.display(), "Opened store");
        Ok(Self {
            conn,
            path: Some(db_path),
        })
    }

    /// A store that lives only as long as the value
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        Ok(Self { conn, path: None })
    }

    /// Path of the database file, if the store is on disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert a new record; fails if the id already exists
    pub fn create<T: Record>(&mut self, record: T) -> Result<String> {
        debug!(collection = T::collection_name(), id = record.id(), "create: called");
        if self.exists::<T>(record.id())? {
            return Err(eyre!("Record already exists: {}/{}", T::collection_name(), record.id()));
        }
        self.write(&record)?;
        Ok(record.id().to_string())
    }

    /// Replace an existing record; fails if the id is absent
    pub fn update<T: Record>(&mut self, record: T) -> Result<()> {
        debug!(collection = T::collection_name(), id = record.id(), "update: called");
        if !self.exists::<T>(record.id())? {
            return Err(eyre!("Record not found: {}/{}", T::collection_name(), record.id()));
        }
        self.write(&record)
    }

    /// Insert or replace a record
    pub fn upsert<T: Record>(&mut self, record: T) -> Result<String> {
        debug!(collection = T::collection_name(), id = record.id(), "upsert: called");
        self.write(&record)?;
        Ok(record.id().to_string())
    }

    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        debug!(collection = T::collection_name(), id, "get: called");
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM records WHERE collection = ?1 AND id = ?2",
                params![T::collection_name(), id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query record")?;

        match data {
            Some(data) => {
                let record = serde_json::from_str(&data)
                    .with_context(|| format!("Failed to decode record {}/{}", T::collection_name(), id))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Records matching every filter, ordered by id
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        debug!(collection = T::collection_name(), filter_count = filters.len(), "list: called");
        let mut sql = String::from("SELECT data FROM records WHERE collection = ?1");
        let mut values: Vec<SqlValue> = vec![SqlValue::Text(T::collection_name().to_string())];

        for filter in filters {
            let field_idx = values.len() + 1;
            let value_idx = values.len() + 2;
            let comparison = match filter.op {
                FilterOp::Contains => format!("value LIKE '%' || ?{} || '%'", value_idx),
                op => format!("value {} ?{}", op.sql(), value_idx),
            };
            sql.push_str(&format!(
                " AND id IN (SELECT id FROM record_indexes WHERE collection = ?1 AND field = ?{} AND {})",
                field_idx, comparison
            ));
            values.push(SqlValue::Text(filter.field.clone()));
            values.push(sql_value(&filter.value));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list query")?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))
            .context("Failed to list records")?;

        let mut records = Vec::new();
        for row in rows {
            let data = row?;
            records.push(serde_json::from_str(&data).context("Failed to decode record")?);
        }
        Ok(records)
    }

    /// Delete a record; returns whether it existed
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<bool> {
        debug!(collection = T::collection_name(), id, "delete: called");
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            params![T::collection_name(), id],
        )?;
        let removed = tx.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![T::collection_name(), id],
        )?;
        tx.commit().context("Failed to commit delete")?;
        Ok(removed > 0)
    }

    /// Number of records in `T`'s collection
    pub fn count<T: Record>(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![T::collection_name()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Recompute the secondary indexes of every record in `T`'s collection
    pub fn rebuild_indexes<T: Record>(&mut self) -> Result<usize> {
        debug!(collection = T::collection_name(), "rebuild_indexes: called");
        let records: Vec<T> = self.list(&[])?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1",
            params![T::collection_name()],
        )?;
        for record in &records {
            insert_indexes(&tx, record)?;
        }
        tx.commit().context("Failed to commit index rebuild")?;
        info!(collection = T::collection_name(), count = records.len(), "Rebuilt indexes");
        Ok(records.len())
    }

    fn exists<T: Record>(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM records WHERE collection = ?1 AND id = ?2",
                params![T::collection_name(), id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn write<T: Record>(&mut self, record: &T) -> Result<()> {
        let data = serde_json::to_string(record).context("Failed to encode record")?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO records (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![T::collection_name(), record.id(), data, record.updated_at()],
        )?;
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            params![T::collection_name(), record.id()],
        )?;
        insert_indexes(&tx, record)?;
        tx.commit().context("Failed to commit record")?;
        Ok(())
    }
}

fn insert_indexes<T: Record>(tx: &Transaction<'_>, record: &T) -> Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO record_indexes (collection, id, field, value) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (field, value) in record.indexed_fields() {
        stmt.execute(params![T::collection_name(), record.id(), field, sql_value(&value)])?;
    }
    Ok(())
}

fn sql_value(value: &IndexValue) -> SqlValue {
    match value {
        IndexValue::String(s) => SqlValue::Text(s.clone()),
        IndexValue::Int(i) => SqlValue::Integer(*i),
        IndexValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
    }
}
