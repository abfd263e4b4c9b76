use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::debug;

use crate::db;
use crate::error::{Result, StoreError};

/// Connections kept idle in the pool. Anything beyond this is closed on
/// check-in.
const MAX_IDLE_CONNS: usize = 8;

/// Persistence gateway over a SQLite file.
///
/// Hands out [`UnitOfWork`] handles, each backed by its own connection so
/// independent transactions don't contend on a single shared handle (the
/// same reason the scheduler-style subsystems each get their own
/// connection). WAL mode keeps readers unblocked while an agent iteration
/// holds its write transaction.
pub struct Store {
    path: PathBuf,
    pool: Mutex<Vec<Connection>>,
}

impl Store {
    /// Open (or create) the database, initialise the schema, and apply
    /// runtime patches.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let conn = open_conn(&path)?;
        db::init_db(&conn)?;
        let applied = db::apply_runtime_patches(&conn)?;
        debug!(?applied, "schema ready");
        Ok(Arc::new(Self {
            path,
            pool: Mutex::new(vec![conn]),
        }))
    }

    /// Begin a transaction. `BEGIN IMMEDIATE` takes the write intent up
    /// front so conflicts surface at begin, not at commit.
    pub fn unit_of_work(self: &Arc<Self>) -> Result<UnitOfWork> {
        let conn = self.checkout()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(UnitOfWork {
            store: Arc::clone(self),
            conn: Some(conn),
            open: true,
        })
    }

    fn checkout(&self) -> Result<Connection> {
        if let Some(conn) = self.pool.lock().unwrap().pop() {
            return Ok(conn);
        }
        open_conn(&self.path)
    }

    fn checkin(&self, conn: Connection) {
        let mut pool = self.pool.lock().unwrap();
        if pool.len() < MAX_IDLE_CONNS {
            pool.push(conn);
        }
    }
}

fn open_conn(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 30000;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(conn)
}

/// One open transaction.
///
/// Every data helper takes `&UnitOfWork`, so reads made after a write in the
/// same unit-of-work observe the uncommitted state; the task agent relies
/// on this when it rebuilds its context mid-iteration. Dropping an
/// uncommitted unit-of-work rolls back.
pub struct UnitOfWork {
    store: Arc<Store>,
    conn: Option<Connection>,
    open: bool,
}

impl UnitOfWork {
    pub(crate) fn conn(&self) -> &Connection {
        self.conn.as_ref().expect("unit of work already closed")
    }

    pub fn commit(mut self) -> Result<()> {
        self.conn().execute_batch("COMMIT")?;
        self.open = false;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.conn().execute_batch("ROLLBACK")?;
        self.open = false;
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.open {
                let _ = conn.execute_batch("ROLLBACK");
            }
            self.store.checkin(conn);
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork").field("open", &self.open).finish()
    }
}

/// Map `QueryReturnedNoRows` to `Ok(None)`, everything else to an error.
pub(crate) fn optional<T>(r: rusqlite::Result<T>) -> Result<Option<T>> {
    match r {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Database(e)),
    }
}
