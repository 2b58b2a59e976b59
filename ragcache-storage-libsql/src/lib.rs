//! # Ragcache Storage - libSQL
//!
//! libSQL persistent store backend for the multi-tier semantic cache.
//!
//! A single local database file holds one table per cache layer plus the
//! daily-stats and metadata tables. Every mutation is committed before the
//! call returns, so the orchestrator can mirror the change into its vector
//! index knowing the row is durable.
//!
//! ## Example
//!
//! ```no_run
//! use ragcache_storage_libsql::LibsqlStore;
//!
//! # async fn example() -> ragcache_core::Result<()> {
//! let store = LibsqlStore::open("cache.db").await?;
//! # Ok(())
//! # }
//! ```

use libsql::{Builder, Connection, Database};
use ragcache_core::error::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info};

mod rows;
mod schema;
mod store_impl;

pub use rows::{blob_to_embedding, embedding_to_blob};

/// libSQL-backed persistent cache store
///
/// Holds one connection for its lifetime; the orchestrator serializes
/// writers, so a single connection is sufficient and keeps in-memory
/// databases (which are per-connection) usable.
pub struct LibsqlStore {
    _db: Arc<Database>,
    conn: Connection,
}

impl LibsqlStore {
    /// Open (or create) a local database file and initialize the schema.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` when the file cannot be opened or the
    /// schema statements fail.
    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening libsql store");

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| Error::Storage(format!("Failed to open database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "libsql store ready");
        Ok(store)
    }

    /// Open an in-memory database (tests and throwaway runs).
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` when initialization fails.
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| Error::Storage(format!("Failed to open in-memory database: {e}")))?;

        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| Error::Storage(format!("Failed to connect: {e}")))?;
        let store = Self {
            _db: Arc::new(db),
            conn,
        };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Create all tables and indexes if they do not exist.
    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        for statement in schema::ALL_STATEMENTS {
            conn.execute(statement, ())
                .await
                .map_err(|e| Error::Storage(format!("Failed to initialize schema: {e}")))?;
        }
        Ok(())
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        Ok(self.conn.clone())
    }
}
