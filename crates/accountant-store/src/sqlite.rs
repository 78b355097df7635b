//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for the accountant. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use accountant_core::{
    EntryId, EntryPayload, LedgerEntry, ModelRef, Properties, RequestContext, Signature,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::Store;

const SELECT_COLUMNS: &str = "id, recordable_type, recordable_id, user_type, user_id, event, \
     properties, modified, ciphers, extra, url, ip_address, user_agent, signature, \
     created_at, updated_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the locked connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            f(&mut conn)
        })
        .await?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::Lock(format!("connection mutex poisoned: {}", e)))
}

/// A `ledgers` row as stored, before JSON columns are decoded.
struct LedgerRow {
    id: i64,
    recordable_type: String,
    recordable_id: String,
    user_type: Option<String>,
    user_id: Option<String>,
    event: String,
    properties: String,
    modified: String,
    ciphers: String,
    extra: String,
    url: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    signature: String,
    created_at: i64,
    updated_at: i64,
}

impl LedgerRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            recordable_type: row.get("recordable_type")?,
            recordable_id: row.get("recordable_id")?,
            user_type: row.get("user_type")?,
            user_id: row.get("user_id")?,
            event: row.get("event")?,
            properties: row.get("properties")?,
            modified: row.get("modified")?,
            ciphers: row.get("ciphers")?,
            extra: row.get("extra")?,
            url: row.get("url")?,
            ip_address: row.get("ip_address")?,
            user_agent: row.get("user_agent")?,
            signature: row.get("signature")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_entry(self) -> Result<LedgerEntry> {
        let id = u64::try_from(self.id)
            .map_err(|_| StoreError::InvalidData(format!("negative ledger id {}", self.id)))?;
        let signature = Signature::from_hex(&self.signature)
            .map_err(|e| StoreError::InvalidData(format!("signature of entry {}: {}", id, e)))?;

        let user = match (self.user_type, self.user_id) {
            (Some(kind), Some(user_id)) => Some(ModelRef { kind, id: user_id }),
            _ => None,
        };

        let properties: Properties = serde_json::from_str(&self.properties)?;
        let payload = EntryPayload {
            event: self.event,
            recordable: ModelRef {
                kind: self.recordable_type,
                id: self.recordable_id,
            },
            user,
            properties,
            modified: serde_json::from_str(&self.modified)?,
            ciphers: serde_json::from_str(&self.ciphers)?,
            extra: serde_json::from_str(&self.extra)?,
            context: RequestContext {
                url: self.url,
                ip_address: self.ip_address,
                user_agent: self.user_agent,
            },
        };

        Ok(LedgerEntry {
            id: EntryId::new(id),
            payload,
            signature,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn query_entries(conn: &Connection, sql: &str, recordable: &ModelRef) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![recordable.kind, recordable.id], LedgerRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(LedgerRow::into_entry).collect()
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_entry(
        &self,
        payload: &EntryPayload,
        signature: &Signature,
        at: i64,
    ) -> Result<LedgerEntry> {
        let payload = payload.clone();
        let signature = *signature;

        self.blocking(move |conn| {
            let properties = serde_json::to_string(&payload.properties)?;
            let modified = serde_json::to_string(&payload.modified)?;
            let ciphers = serde_json::to_string(&payload.ciphers)?;
            let extra = serde_json::to_string(&payload.extra)?;
            let (user_type, user_id) = match &payload.user {
                Some(user) => (Some(user.kind.as_str()), Some(user.id.as_str())),
                None => (None, None),
            };

            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO ledgers (
                    recordable_type, recordable_id, user_type, user_id, event,
                    properties, modified, ciphers, extra,
                    url, ip_address, user_agent, signature, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
                params![
                    payload.recordable.kind,
                    payload.recordable.id,
                    user_type,
                    user_id,
                    payload.event,
                    properties,
                    modified,
                    ciphers,
                    extra,
                    payload.context.url,
                    payload.context.ip_address,
                    payload.context.user_agent,
                    signature.to_hex(),
                    at,
                ],
            )?;
            let rowid = tx.last_insert_rowid();
            tx.commit()?;

            let id = EntryId::new(rowid as u64);
            debug!(entry = %id, recordable = %payload.recordable, "inserted ledger entry");
            Ok(LedgerEntry::new(id, payload, signature, at))
        })
        .await
    }

    async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        self.blocking(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM ledgers WHERE id = ?1"),
                    params![id.get() as i64],
                    LedgerRow::from_row,
                )
                .optional()?;
            row.map(LedgerRow::into_entry).transpose()
        })
        .await
    }

    async fn entries_oldest_first(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>> {
        let recordable = recordable.clone();
        self.blocking(move |conn| {
            query_entries(
                conn,
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM ledgers
                     WHERE recordable_type = ?1 AND recordable_id = ?2
                     ORDER BY id ASC"
                ),
                &recordable,
            )
        })
        .await
    }

    async fn entries_newest_first(&self, recordable: &ModelRef) -> Result<Vec<LedgerEntry>> {
        let recordable = recordable.clone();
        self.blocking(move |conn| {
            query_entries(
                conn,
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM ledgers
                     WHERE recordable_type = ?1 AND recordable_id = ?2
                     ORDER BY id DESC"
                ),
                &recordable,
            )
        })
        .await
    }

    async fn count(&self, recordable: &ModelRef) -> Result<usize> {
        let recordable = recordable.clone();
        self.blocking(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM ledgers WHERE recordable_type = ?1 AND recordable_id = ?2",
                params![recordable.kind, recordable.id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    async fn prune(&self, recordable: &ModelRef, threshold: usize) -> Result<usize> {
        if threshold == 0 {
            return Ok(0);
        }

        let recordable = recordable.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM ledgers
                 WHERE recordable_type = ?1 AND recordable_id = ?2
                   AND id NOT IN (
                       SELECT id FROM ledgers
                       WHERE recordable_type = ?1 AND recordable_id = ?2
                       ORDER BY id DESC
                       LIMIT ?3
                   )",
                params![recordable.kind, recordable.id, threshold as i64],
            )?;
            tx.commit()?;

            if removed > 0 {
                debug!(recordable = %recordable, removed, threshold, "pruned ledger");
            }
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accountant_core::{CipherRegistry, Notary, Sha512Notary, Signable};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn article(id: u64) -> ModelRef {
        ModelRef::new("article", id)
    }

    fn payload(recordable: ModelRef, title: &str) -> EntryPayload {
        let mut properties = Properties::new();
        properties.insert("title".into(), json!(title));
        properties.insert("content".into(), json!("N/A"));
        properties.insert("views".into(), json!(3));

        let mut ciphers = BTreeMap::new();
        ciphers.insert("content".to_string(), "bleach".to_string());

        EntryPayload::builder("created", recordable)
            .user(Some(ModelRef::new("user", 9)))
            .properties(properties)
            .modified(["title", "content", "views"])
            .ciphers(ciphers)
            .pivot("users", json!({"liked": true}))
            .context(RequestContext {
                url: Some("console".into()),
                ip_address: Some("127.0.0.1".into()),
                user_agent: Some("Symfony".into()),
            })
            .build(&CipherRegistry::new())
            .unwrap()
    }

    async fn insert_signed(store: &SqliteStore, payload: &EntryPayload) -> LedgerEntry {
        let signature = Sha512Notary.sign(&payload.signable());
        store.insert_entry(payload, &signature, 1_339_686_183_000).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_entry() {
        let store = SqliteStore::open_memory().unwrap();
        let payload = payload(article(1), "Keeping Track");
        let entry = insert_signed(&store, &payload).await;

        assert_eq!(entry.id, EntryId::new(1));
        let fetched = store.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(fetched, entry);
        assert_eq!(fetched.payload.pivot(), Some(&json!({"relation": "users", "properties": {"liked": true}})));
        assert!(!fetched.is_tainted(&Sha512Notary));

        assert!(store.get_entry(EntryId::new(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_without_user() {
        let store = SqliteStore::open_memory().unwrap();
        let payload = EntryPayload::builder("retrieved", article(1))
            .build(&CipherRegistry::new())
            .unwrap();
        let entry = insert_signed(&store, &payload).await;

        let fetched = store.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(fetched.payload.user, None);
        assert!(fetched.payload.modified.is_empty());
        assert!(!fetched.is_tainted(&Sha512Notary));
    }

    #[tokio::test]
    async fn test_ordering_and_count() {
        let store = SqliteStore::open_memory().unwrap();
        for title in ["a", "b", "c"] {
            insert_signed(&store, &payload(article(1), title)).await;
            insert_signed(&store, &payload(article(2), title)).await;
        }

        let oldest = store.entries_oldest_first(&article(1)).await.unwrap();
        let titles: Vec<_> = oldest.iter().map(|e| e.payload.properties["title"].clone()).collect();
        assert_eq!(titles, vec![json!("a"), json!("b"), json!("c")]);

        let newest = store.entries_newest_first(&article(2)).await.unwrap();
        let ids: Vec<u64> = newest.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![6, 4, 2]);

        assert_eq!(store.count(&article(1)).await.unwrap(), 3);
        assert_eq!(store.count(&article(7)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prune_keeps_most_recent() {
        let store = SqliteStore::open_memory().unwrap();
        for n in 0..100 {
            insert_signed(&store, &payload(article(1), &n.to_string())).await;
            store.prune(&article(1), 10).await.unwrap();
        }

        let ids: Vec<u64> = store
            .entries_oldest_first(&article(1))
            .await
            .unwrap()
            .iter()
            .map(|e| e.id.get())
            .collect();
        assert_eq!(ids, (91..=100).collect::<Vec<_>>());

        // AUTOINCREMENT never reuses pruned ids.
        let next = insert_signed(&store, &payload(article(1), "next")).await;
        assert_eq!(next.id, EntryId::new(101));
    }

    #[tokio::test]
    async fn test_prune_threshold_zero_and_other_recordables() {
        let store = SqliteStore::open_memory().unwrap();
        for title in ["a", "b", "c"] {
            insert_signed(&store, &payload(article(1), title)).await;
        }
        insert_signed(&store, &payload(article(2), "x")).await;

        assert_eq!(store.prune(&article(1), 0).await.unwrap(), 0);
        assert_eq!(store.prune(&article(1), 1).await.unwrap(), 2);
        assert_eq!(store.count(&article(1)).await.unwrap(), 1);
        assert_eq!(store.count(&article(2)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_tampering_is_detected() {
        let store = SqliteStore::open_memory().unwrap();
        let entry = insert_signed(&store, &payload(article(1), "Keeping Track")).await;

        {
            let conn = lock(&store.conn).unwrap();
            conn.execute(
                "UPDATE ledgers SET properties = ?1 WHERE id = ?2",
                params![r#"{"title":"Forged","content":"--A","views":3}"#, entry.id.get() as i64],
            )
            .unwrap();
        }
        let forged = store.get_entry(entry.id).await.unwrap().unwrap();
        assert!(forged.is_tainted(&Sha512Notary));

        let entry = insert_signed(&store, &payload(article(1), "Untouched")).await;
        {
            let conn = lock(&store.conn).unwrap();
            conn.execute(
                "UPDATE ledgers SET updated_at = updated_at + 1 WHERE id = ?1",
                params![entry.id.get() as i64],
            )
            .unwrap();
        }
        let touched = store.get_entry(entry.id).await.unwrap().unwrap();
        assert!(touched.is_tainted(&Sha512Notary));
    }

    #[tokio::test]
    async fn test_numeric_text_round_trip_keeps_signature() {
        let store = SqliteStore::open_memory().unwrap();
        let entry = insert_signed(&store, &payload(article(1), "Keeping Track")).await;

        {
            let conn = lock(&store.conn).unwrap();
            conn.execute(
                "UPDATE ledgers SET properties = ?1 WHERE id = ?2",
                params![
                    r#"{"title":"Keeping Track","content":"--A","views":"3"}"#,
                    entry.id.get() as i64
                ],
            )
            .unwrap();
        }
        let fetched = store.get_entry(entry.id).await.unwrap().unwrap();
        assert!(!fetched.is_tainted(&Sha512Notary));
    }

    #[tokio::test]
    async fn test_corrupt_signature_column() {
        let store = SqliteStore::open_memory().unwrap();
        let entry = insert_signed(&store, &payload(article(1), "x")).await;
        {
            let conn = lock(&store.conn).unwrap();
            conn.execute("UPDATE ledgers SET signature = 'zz'", []).unwrap();
        }

        assert!(matches!(
            store.get_entry(entry.id).await,
            Err(StoreError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let entry = {
            let store = SqliteStore::open(&path).unwrap();
            insert_signed(&store, &payload(article(1), "Keeping Track")).await
        };

        let store = SqliteStore::open(&path).unwrap();
        let fetched = store.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(fetched, entry);
    }
}
