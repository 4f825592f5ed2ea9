//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;
use tokio::sync::Mutex;

use super::migrations;

/// Milliseconds a connection waits on a locked database before failing
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Database wrapper for libSQL connections
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    in_memory: bool,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            in_memory: false,
        };
        configure(&database.conn).await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self {
            db,
            conn,
            in_memory: true,
        };
        configure(&database.conn).await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the primary connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Open an additional configured connection to the same database file.
    ///
    /// Collection passes that run concurrently each use their own connection
    /// so their transactions never interleave. In-memory databases are private
    /// to a connection, so they hand out the primary connection instead; batch
    /// transactions on it are serialised by `execute_in_transaction`.
    pub async fn connect(&self) -> Result<Connection> {
        if self.in_memory {
            return Ok(self.conn.clone());
        }
        let conn = self.db.connect()?;
        configure(&conn).await?;
        Ok(conn)
    }
}

/// Configure `SQLite` pragmas for a connection
async fn configure(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, so it goes through query
    conn.query("PRAGMA journal_mode = WAL;", ()).await.ok();
    conn.execute("PRAGMA synchronous = NORMAL;", ()).await.ok();
    conn.query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"), ())
        .await
        .ok();
    conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
    Ok(())
}

/// Held for the whole of every batch transaction. In-memory databases share
/// one connection between passes, and a connection has one transaction.
static TRANSACTION_LOCK: Mutex<()> = Mutex::const_new(());

/// Run `statements` inside one transaction, rolling back on the first error
pub(crate) async fn execute_in_transaction(
    conn: &Connection,
    statements: &[(&str, Vec<libsql::Value>)],
) -> Result<()> {
    let _guard = TRANSACTION_LOCK.lock().await;
    conn.execute("BEGIN IMMEDIATE TRANSACTION", ()).await?;

    for (sql, params) in statements {
        let params = libsql::params::Params::Positional(params.clone());
        if let Err(e) = conn.execute(sql, params).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }
    Ok(())
}
