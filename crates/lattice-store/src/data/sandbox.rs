//! Sandbox log records: the mapping from the unified sandbox UUID used at
//! the API boundary to the backend-specific id, plus the command history
//! and exfiltrated files. Rows outlive the sandbox backend itself.

use rusqlite::params;
use uuid::Uuid;

use super::{now, parse_uuid};
use crate::error::{Result, StoreError};
use crate::store::optional;
use crate::types::SandboxLog;
use crate::UnitOfWork;

pub fn create_sandbox_log(
    uow: &UnitOfWork,
    project_id: Uuid,
    sandbox_id: Uuid,
    backend_id: &str,
) -> Result<SandboxLog> {
    let id = Uuid::new_v4();
    uow.conn().execute(
        "INSERT INTO sandbox_logs
         (id, project_id, sandbox_id, backend_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            id.to_string(),
            project_id.to_string(),
            sandbox_id.to_string(),
            backend_id,
            now()
        ],
    )?;
    Ok(SandboxLog {
        id,
        project_id,
        sandbox_id,
        backend_id: backend_id.to_string(),
        history_commands: Vec::new(),
        generated_files: Vec::new(),
    })
}

pub fn get_sandbox_log(uow: &UnitOfWork, sandbox_id: Uuid) -> Result<Option<SandboxLog>> {
    let row = optional(uow.conn().query_row(
        "SELECT id, project_id, sandbox_id, backend_id, history_commands, generated_files
         FROM sandbox_logs WHERE sandbox_id = ?1",
        params![sandbox_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    ))?;
    row.map(|(id, project_id, sandbox_id, backend_id, commands, files)| {
        Ok(SandboxLog {
            id: parse_uuid(&id)?,
            project_id: parse_uuid(&project_id)?,
            sandbox_id: parse_uuid(&sandbox_id)?,
            backend_id,
            history_commands: serde_json::from_str(&commands)?,
            generated_files: serde_json::from_str(&files)?,
        })
    })
    .transpose()
}

pub fn append_history_command(uow: &UnitOfWork, sandbox_id: Uuid, command: &str) -> Result<()> {
    let log = get_sandbox_log(uow, sandbox_id)?
        .ok_or_else(|| StoreError::NotFound(format!("sandbox {sandbox_id}")))?;
    let mut commands = log.history_commands;
    commands.push(command.to_string());
    uow.conn().execute(
        "UPDATE sandbox_logs SET history_commands = ?1, updated_at = ?2 WHERE sandbox_id = ?3",
        params![serde_json::to_string(&commands)?, now(), sandbox_id.to_string()],
    )?;
    Ok(())
}

pub fn add_generated_file(uow: &UnitOfWork, sandbox_id: Uuid, file: &str) -> Result<()> {
    let log = get_sandbox_log(uow, sandbox_id)?
        .ok_or_else(|| StoreError::NotFound(format!("sandbox {sandbox_id}")))?;
    let mut files = log.generated_files;
    files.push(file.to_string());
    uow.conn().execute(
        "UPDATE sandbox_logs SET generated_files = ?1, updated_at = ?2 WHERE sandbox_id = ?3",
        params![serde_json::to_string(&files)?, now(), sandbox_id.to_string()],
    )?;
    Ok(())
}
