//! SQLite-backed ordered store.
//!
//! Every namespace lives in the single `records` table, keyed by the 12-byte
//! version. SQLite compares BLOBs bytewise, which matches version order.
//! Versions are generated inside an `IMMEDIATE` transaction after reading the
//! current maximum, so several processes can share one database file.

use std::time::Duration;

use diesel::{
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Pool},
    sqlite::SqliteConnection,
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::debug;

use crate::{
    store::{Document, OrderedStore, RecordFilter, StoreError, StoredRecord},
    version::{Version, VersionGenerator},
};

mod models;
pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub type PooledConnection = diesel::r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
            self.busy_timeout.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

fn run_migrations(conn: &mut PooledConnection) -> Result<(), StoreError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))?;
    Ok(())
}

/// Durable [`OrderedStore`] on a SQLite database file.
#[derive(Debug)]
pub struct SqliteStore {
    pool: DbPool,
    generator: VersionGenerator,
}

impl SqliteStore {
    /// Open (or create) the database at `database_url` and run pending migrations.
    ///
    /// `:memory:` is not supported: every pooled connection would see its own
    /// empty database.
    pub fn open(database_url: &str) -> Result<Self, StoreError> {
        debug!("Establishing connection to database at {}", database_url);
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout: BUSY_TIMEOUT,
            }))
            .build(manager)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut conn = pool
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        debug!("Running database migrations...");
        run_migrations(&mut conn)?;

        Ok(Self {
            pool,
            generator: VersionGenerator::new(),
        })
    }

    fn connection(&self) -> Result<PooledConnection, StoreError> {
        self.pool
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl OrderedStore for SqliteStore {
    fn insert(&self, namespace: &str, document: Document) -> Result<Version, StoreError> {
        let value_json = serde_json::to_string(&document.value)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        let mut conn = self.connection()?;

        let version = conn
            .immediate_transaction::<_, TransactionError, _>(|conn| {
                if let Some(latest) = models::latest_version(conn)? {
                    self.generator
                        .observe(Version::try_from(latest.as_slice()).map_err(StoreError::from)?);
                }
                let version = self.generator.generate().map_err(StoreError::from)?;

                models::NewRecord::new(&version, namespace, &document.key, value_json)
                    .insert(conn)?;
                Ok(version)
            })
            .map_err(|e| match e {
                TransactionError::Store(e) => e,
                TransactionError::Diesel(e) => StoreError::Rejected(e.to_string()),
            })?;

        debug!(namespace = %namespace, "Inserted record");
        Ok(version)
    }

    fn find(
        &self,
        namespace: &str,
        filter: &RecordFilter<'_>,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let mut conn = self.connection()?;
        models::find_after(&mut conn, namespace, filter.key, filter.after.as_ref())
            .map_err(|e| StoreError::Query(e.to_string()))?
            .into_iter()
            .map(StoredRecord::try_from)
            .collect()
    }

    fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        conn.batch_execute("SELECT 1")
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

/// Errors raised inside an insert transaction.
#[derive(Debug, thiserror::Error)]
enum TransactionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use diesel::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::{json::nested_document, store::JsonObject};

    fn object(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    fn database_url(dir: &tempfile::TempDir) -> String {
        dir.path().join("relay.db").to_string_lossy().into_owned()
    }

    #[test]
    fn test_insert_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&database_url(&dir)).unwrap();

        let v1 = store
            .insert("orders", Document::new("o1", object(json!({"status": "new"}))))
            .unwrap();
        store
            .insert("orders", Document::new("o2", object(json!({"status": "other"}))))
            .unwrap();
        let v3 = store
            .insert(
                "orders",
                Document::new("o1", object(json!({"status": "shipped", "items": [1, 2]}))),
            )
            .unwrap();
        assert!(v1 < v3);

        let all = store.find("orders", &RecordFilter::new("o1", None)).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].version, v1);
        assert_eq!(all[1].value, object(json!({"status": "shipped", "items": [1, 2]})));

        let after = store
            .find("orders", &RecordFilter::new("o1", Some(v1)))
            .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].version, v3);

        assert!(
            store
                .find("invoices", &RecordFilter::new("o1", None))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_versions_keep_increasing_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = database_url(&dir);

        let first = {
            let store = SqliteStore::open(&url).unwrap();
            store
                .insert("ns", Document::new("k", object(json!({"n": 1}))))
                .unwrap()
        };

        let store = SqliteStore::open(&url).unwrap();
        let second = store
            .insert("ns", Document::new("k", object(json!({"n": 2}))))
            .unwrap();
        assert!(second > first);

        let records = store.find("ns", &RecordFilter::new("k", None)).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_two_handles_on_one_file_stay_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let url = database_url(&dir);
        let a = SqliteStore::open(&url).unwrap();
        let b = SqliteStore::open(&url).unwrap();

        let mut last = Version::MIN;
        for n in 0..20 {
            let store = if n % 2 == 0 { &a } else { &b };
            let version = store
                .insert("ns", Document::new("k", object(json!({"n": n}))))
                .unwrap();
            assert!(version > last);
            last = version;
        }
    }

    #[test]
    fn test_concurrent_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(&database_url(&dir)).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = store.clone();
                thread::spawn(move || {
                    for n in 0..25 {
                        store
                            .insert(
                                "load",
                                Document::new("k", object(json!({"w": worker, "n": n}))),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = store.find("load", &RecordFilter::new("k", None)).unwrap();
        assert_eq!(records.len(), 100);
        assert!(records.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[test]
    fn test_insert_records_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&database_url(&dir)).unwrap();
        let before = chrono::Utc::now().timestamp_millis();
        store
            .insert("ns", Document::new("k", object(json!({"n": 1}))))
            .unwrap();

        let mut conn = store.connection().unwrap();
        let created: Vec<i64> = schema::records::table
            .select(schema::records::created_at)
            .load(&mut conn)
            .unwrap();
        assert_eq!(created.len(), 1);
        assert!(created[0] >= before);
    }

    #[test]
    fn test_deeply_nested_value_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&database_url(&dir)).unwrap();
        let value: JsonObject = crate::json::from_slice(nested_document(300).as_bytes()).unwrap();

        store
            .insert("ns", Document::new("deep", value.clone()))
            .unwrap();
        let records = store.find("ns", &RecordFilter::new("deep", None)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, value);
    }

    #[test]
    fn test_ping() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&database_url(&dir)).unwrap();
        assert!(store.ping().is_ok());
    }
}
