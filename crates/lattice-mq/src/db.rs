use rusqlite::Connection;

use crate::Result;

/// Initialise the queue table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS mq_messages (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            topic        TEXT    NOT NULL,
            body         TEXT    NOT NULL,              -- JSON
            attempts     INTEGER NOT NULL DEFAULT 0,
            available_at INTEGER NOT NULL,              -- unix millis
            claimed_at   INTEGER,                       -- unix millis, NULL = unclaimed
            created_at   INTEGER NOT NULL
        );

        -- Polling query: due, unclaimed (or claim expired), oldest first.
        CREATE INDEX IF NOT EXISTS idx_mq_due ON mq_messages (available_at, claimed_at);
        ",
    )?;
    Ok(())
}
