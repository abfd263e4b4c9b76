use rusqlite::params;
use uuid::Uuid;

use lattice_core::types::{TaskData, TaskStatus};

use super::{now, parse_uuid};
use crate::error::{Result, StoreError};
use crate::store::optional;
use crate::types::Task;
use crate::UnitOfWork;

/// All tasks of a session ordered by `task_order`.
pub fn fetch_current_tasks(uow: &UnitOfWork, session_id: Uuid) -> Result<Vec<Task>> {
    let mut stmt = uow.conn().prepare(
        "SELECT id, session_id, task_order, status, data, raw_message_ids
         FROM tasks WHERE session_id = ?1 ORDER BY task_order",
    )?;
    let rows = stmt.query_map(params![session_id.to_string()], row_tuple)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(tuple_to_task(row?)?);
    }
    Ok(out)
}

pub fn get_task(uow: &UnitOfWork, task_id: Uuid) -> Result<Option<Task>> {
    let row = optional(uow.conn().query_row(
        "SELECT id, session_id, task_order, status, data, raw_message_ids
         FROM tasks WHERE id = ?1",
        params![task_id.to_string()],
        row_tuple,
    ))?;
    row.map(tuple_to_task).transpose()
}

pub fn get_task_by_order(uow: &UnitOfWork, session_id: Uuid, order: i64) -> Result<Option<Task>> {
    let row = optional(uow.conn().query_row(
        "SELECT id, session_id, task_order, status, data, raw_message_ids
         FROM tasks WHERE session_id = ?1 AND task_order = ?2",
        params![session_id.to_string(), order],
        row_tuple,
    ))?;
    row.map(tuple_to_task).transpose()
}

/// Insert a new pending task immediately after `after_order` (0 inserts at
/// the front). Trailing tasks are renumbered by +1 in a single statement,
/// which keeps the 1..n sequence dense.
pub fn insert_task_after(
    uow: &UnitOfWork,
    session_id: Uuid,
    after_order: i64,
    description: &str,
) -> Result<Task> {
    let max_order: i64 = uow.conn().query_row(
        "SELECT COALESCE(MAX(task_order), 0) FROM tasks WHERE session_id = ?1",
        params![session_id.to_string()],
        |row| row.get(0),
    )?;
    if after_order < 0 || after_order > max_order {
        return Err(StoreError::Conflict(format!(
            "after_task_order {after_order} out of range (0..={max_order})"
        )));
    }
    let new_order = after_order + 1;

    uow.conn().execute(
        "UPDATE tasks SET task_order = task_order + 1
         WHERE session_id = ?1 AND task_order >= ?2",
        params![session_id.to_string(), new_order],
    )?;

    let id = Uuid::new_v4();
    let ts = now();
    let data = TaskData {
        task_description: description.to_string(),
        ..Default::default()
    };
    uow.conn().execute(
        "INSERT INTO tasks (id, session_id, task_order, status, data, raw_message_ids, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', ?4, '[]', ?5, ?5)",
        params![
            id.to_string(),
            session_id.to_string(),
            new_order,
            serde_json::to_string(&data)?,
            ts
        ],
    )?;

    Ok(Task {
        id,
        session_id,
        order: new_order,
        status: TaskStatus::Pending,
        data,
        raw_message_ids: Vec::new(),
    })
}

pub fn update_task_status(uow: &UnitOfWork, task_id: Uuid, status: TaskStatus) -> Result<()> {
    let n = uow.conn().execute(
        "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now(), task_id.to_string()],
    )?;
    if n == 0 {
        return Err(StoreError::NotFound(format!("task {task_id}")));
    }
    Ok(())
}

pub fn update_task_data(uow: &UnitOfWork, task_id: Uuid, data: &TaskData) -> Result<()> {
    let n = uow.conn().execute(
        "UPDATE tasks SET data = ?1, updated_at = ?2 WHERE id = ?3",
        params![serde_json::to_string(data)?, now(), task_id.to_string()],
    )?;
    if n == 0 {
        return Err(StoreError::NotFound(format!("task {task_id}")));
    }
    Ok(())
}

/// Append message ids to the task's ordered member list.
pub fn append_raw_message_ids(uow: &UnitOfWork, task_id: Uuid, message_ids: &[Uuid]) -> Result<()> {
    let task = get_task(uow, task_id)?
        .ok_or_else(|| StoreError::NotFound(format!("task {task_id}")))?;
    let mut all = task.raw_message_ids;
    all.extend_from_slice(message_ids);
    let encoded: Vec<String> = all.iter().map(|id| id.to_string()).collect();
    uow.conn().execute(
        "UPDATE tasks SET raw_message_ids = ?1, updated_at = ?2 WHERE id = ?3",
        params![serde_json::to_string(&encoded)?, now(), task_id.to_string()],
    )?;
    Ok(())
}

type TaskRow = (String, String, i64, String, String, String);

fn row_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn tuple_to_task(
    (id, session_id, order, status, data, raw_ids): TaskRow,
) -> Result<Task> {
    let raw: Vec<String> = serde_json::from_str(&raw_ids)?;
    let mut raw_message_ids = Vec::with_capacity(raw.len());
    for id in &raw {
        raw_message_ids.push(parse_uuid(id)?);
    }
    Ok(Task {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        order,
        status: status
            .parse()
            .map_err(|_| StoreError::Invalid(format!("bad task status {status:?}")))?,
        data: serde_json::from_str(&data)?,
        raw_message_ids,
    })
}
