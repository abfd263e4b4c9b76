use rusqlite::Connection;

use crate::error::Result;

/// Initialise the full schema. Safe to call on every startup; uses
/// `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS projects (
            id           TEXT NOT NULL PRIMARY KEY,
            secret_hmac  TEXT NOT NULL UNIQUE,
            configs      TEXT NOT NULL DEFAULT '{}',   -- JSON ProjectConfig
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id                    TEXT NOT NULL PRIMARY KEY,
            project_id            TEXT NOT NULL REFERENCES projects(id),
            disable_task_tracking INTEGER NOT NULL DEFAULT 0,
            created_at            TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_project
            ON sessions(project_id, created_at);

        CREATE TABLE IF NOT EXISTS messages (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,  -- insertion tiebreaker
            id          TEXT NOT NULL UNIQUE,
            session_id  TEXT NOT NULL REFERENCES sessions(id),
            role        TEXT NOT NULL,
            parts       TEXT NOT NULL,                      -- JSON list of parts
            session_task_process_status TEXT NOT NULL DEFAULT 'pending',
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_id, seq);
        CREATE INDEX IF NOT EXISTS idx_messages_pending
            ON messages(session_id, session_task_process_status, seq);

        CREATE TABLE IF NOT EXISTS tasks (
            id              TEXT NOT NULL PRIMARY KEY,
            session_id      TEXT NOT NULL REFERENCES sessions(id),
            task_order      INTEGER NOT NULL,               -- dense 1..n per session
            status          TEXT NOT NULL DEFAULT 'pending',
            data            TEXT NOT NULL DEFAULT '{}',     -- JSON TaskData
            raw_message_ids TEXT NOT NULL DEFAULT '[]',     -- JSON ordered id list
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_session
            ON tasks(session_id, task_order);

        CREATE TABLE IF NOT EXISTS disks (
            id          TEXT NOT NULL PRIMARY KEY,
            project_id  TEXT NOT NULL REFERENCES projects(id),
            user_id     TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS artifacts (
            id          TEXT NOT NULL PRIMARY KEY,
            disk_id     TEXT NOT NULL REFERENCES disks(id),
            path        TEXT NOT NULL,
            filename    TEXT NOT NULL,
            asset_meta  TEXT NOT NULL DEFAULT '{}',         -- JSON AssetMeta
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            UNIQUE(disk_id, path, filename)
        );

        CREATE TABLE IF NOT EXISTS agent_skills (
            id          TEXT NOT NULL PRIMARY KEY,
            project_id  TEXT NOT NULL REFERENCES projects(id),
            name        TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            disk_id     TEXT NOT NULL REFERENCES disks(id),
            created_at  TEXT NOT NULL,
            UNIQUE(project_id, name)
        );

        CREATE TABLE IF NOT EXISTS learning_spaces (
            id          TEXT NOT NULL PRIMARY KEY,
            project_id  TEXT NOT NULL REFERENCES projects(id),
            created_at  TEXT NOT NULL
        );

        -- One session belongs to at most one learning space at a time.
        CREATE TABLE IF NOT EXISTS learning_space_sessions (
            session_id        TEXT NOT NULL PRIMARY KEY,
            learning_space_id TEXT NOT NULL REFERENCES learning_spaces(id)
        );

        CREATE TABLE IF NOT EXISTS learning_space_skills (
            learning_space_id TEXT NOT NULL REFERENCES learning_spaces(id),
            skill_id          TEXT NOT NULL REFERENCES agent_skills(id),
            UNIQUE(learning_space_id, skill_id)
        );

        CREATE TABLE IF NOT EXISTS sandbox_logs (
            id               TEXT NOT NULL PRIMARY KEY,
            project_id       TEXT NOT NULL REFERENCES projects(id),
            sandbox_id       TEXT NOT NULL UNIQUE,   -- unified API-boundary UUID
            backend_id       TEXT NOT NULL,
            history_commands TEXT NOT NULL DEFAULT '[]',
            generated_files  TEXT NOT NULL DEFAULT '[]',
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Idempotent runtime patches for deployments created before a column
/// existed. SQLite has no ADD COLUMN IF NOT EXISTS, so presence is checked
/// via PRAGMA table_info.
pub fn apply_runtime_patches(conn: &Connection) -> Result<Vec<&'static str>> {
    let mut applied = Vec::new();

    if !column_exists(conn, "sessions", "display_title")? {
        conn.execute_batch("ALTER TABLE sessions ADD COLUMN display_title TEXT;")?;
    }
    applied.push("sessions.display_title");

    Ok(applied)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
