use rusqlite::params;
use uuid::Uuid;

use lattice_core::types::{MessageBlob, ProcessStatus};

use super::{now, parse_uuid};
use crate::error::{Result, StoreError};
use crate::store::optional;
use crate::types::StoredMessage;
use crate::UnitOfWork;

pub fn insert_message(
    uow: &UnitOfWork,
    session_id: Uuid,
    blob: &MessageBlob,
) -> Result<StoredMessage> {
    let id = Uuid::new_v4();
    let created_at = now();
    uow.conn().execute(
        "INSERT INTO messages (id, session_id, role, parts, session_task_process_status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        params![
            id.to_string(),
            session_id.to_string(),
            blob.role.as_str(),
            serde_json::to_string(&blob.parts)?,
            created_at
        ],
    )?;
    let seq = uow.conn().last_insert_rowid();
    Ok(StoredMessage {
        seq,
        id,
        session_id,
        blob: blob.clone(),
        process_status: ProcessStatus::Pending,
        created_at,
    })
}

/// Pending (unprocessed) message ids in insertion order. The monotonic
/// `seq` is the ordering key, so same-millisecond inserts stay stable.
pub fn get_pending_message_ids(uow: &UnitOfWork, session_id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = uow.conn().prepare(
        "SELECT id FROM messages
         WHERE session_id = ?1 AND session_task_process_status = 'pending'
         ORDER BY seq",
    )?;
    let rows = stmt.query_map(params![session_id.to_string()], |row| {
        row.get::<_, String>(0)
    })?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}

pub fn get_message(uow: &UnitOfWork, message_id: Uuid) -> Result<Option<StoredMessage>> {
    let row = optional(uow.conn().query_row(
        "SELECT seq, id, session_id, role, parts, session_task_process_status, created_at
         FROM messages WHERE id = ?1",
        params![message_id.to_string()],
        row_tuple,
    ))?;
    row.map(tuple_to_message).transpose()
}

/// Fetch messages preserving the order of `ids`.
pub fn get_messages_by_ids(uow: &UnitOfWork, ids: &[Uuid]) -> Result<Vec<StoredMessage>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(message) = get_message(uow, *id)? {
            out.push(message);
        }
    }
    Ok(out)
}

/// Paginated listing in insertion order. `cursor` is the last seen `seq`;
/// pass `None` for the first page.
pub fn list_messages(
    uow: &UnitOfWork,
    session_id: Uuid,
    limit: u32,
    cursor: Option<i64>,
) -> Result<Vec<StoredMessage>> {
    let mut stmt = uow.conn().prepare(
        "SELECT seq, id, session_id, role, parts, session_task_process_status, created_at
         FROM messages
         WHERE session_id = ?1 AND seq > ?2
         ORDER BY seq
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(
        params![session_id.to_string(), cursor.unwrap_or(0), limit as i64],
        row_tuple,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(tuple_to_message(row?)?);
    }
    Ok(out)
}

/// Transition messages out of `pending`. Rows already terminal are left
/// untouched; the status field never moves backwards.
pub fn set_process_status(
    uow: &UnitOfWork,
    message_ids: &[Uuid],
    status: ProcessStatus,
) -> Result<usize> {
    if status == ProcessStatus::Pending {
        return Err(StoreError::Conflict(
            "cannot transition a message back to pending".to_string(),
        ));
    }
    let mut updated = 0;
    for id in message_ids {
        updated += uow.conn().execute(
            "UPDATE messages SET session_task_process_status = ?1
             WHERE id = ?2 AND session_task_process_status = 'pending'",
            params![status.as_str(), id.to_string()],
        )?;
    }
    Ok(updated)
}

type MessageRow = (i64, String, String, String, String, String, String);

fn row_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn tuple_to_message(
    (seq, id, session_id, role, parts, status, created_at): MessageRow,
) -> Result<StoredMessage> {
    Ok(StoredMessage {
        seq,
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        blob: MessageBlob {
            role: role
                .parse()
                .map_err(|_| StoreError::Invalid(format!("bad role {role:?}")))?,
            parts: serde_json::from_str(&parts)?,
        },
        process_status: status
            .parse()
            .map_err(|_| StoreError::Invalid(format!("bad process status {status:?}")))?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{projects, sessions};
    use crate::Store;
    use lattice_core::config::ProjectConfig;
    use lattice_core::types::Role;

    fn setup() -> (tempfile::TempDir, std::sync::Arc<Store>, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();
        let project = projects::create_project(&uow, "h", &ProjectConfig::default()).unwrap();
        let session = sessions::create_session(&uow, project.id, false).unwrap();
        uow.commit().unwrap();
        (dir, store, session.id)
    }

    #[test]
    fn pending_ids_follow_insertion_order() {
        let (_dir, store, session_id) = setup();
        let uow = store.unit_of_work().unwrap();
        let m1 = insert_message(&uow, session_id, &MessageBlob::text(Role::User, "a")).unwrap();
        let m2 = insert_message(&uow, session_id, &MessageBlob::text(Role::User, "b")).unwrap();
        let m3 = insert_message(&uow, session_id, &MessageBlob::text(Role::User, "c")).unwrap();

        assert_eq!(
            get_pending_message_ids(&uow, session_id).unwrap(),
            vec![m1.id, m2.id, m3.id]
        );

        set_process_status(&uow, &[m1.id, m2.id], ProcessStatus::Success).unwrap();
        assert_eq!(get_pending_message_ids(&uow, session_id).unwrap(), vec![m3.id]);
        uow.commit().unwrap();
    }

    #[test]
    fn status_never_moves_backwards() {
        let (_dir, store, session_id) = setup();
        let uow = store.unit_of_work().unwrap();
        let m = insert_message(&uow, session_id, &MessageBlob::text(Role::User, "a")).unwrap();
        set_process_status(&uow, &[m.id], ProcessStatus::Success).unwrap();
        // A later failed sweep must not clobber the terminal state.
        let n = set_process_status(&uow, &[m.id], ProcessStatus::Failed).unwrap();
        assert_eq!(n, 0);
        let fetched = get_message(&uow, m.id).unwrap().unwrap();
        assert_eq!(fetched.process_status, ProcessStatus::Success);
        assert!(set_process_status(&uow, &[m.id], ProcessStatus::Pending).is_err());
    }

    #[test]
    fn pagination_by_seq_cursor() {
        let (_dir, store, session_id) = setup();
        let uow = store.unit_of_work().unwrap();
        for i in 0..5 {
            insert_message(&uow, session_id, &MessageBlob::text(Role::User, format!("m{i}")))
                .unwrap();
        }
        let first = list_messages(&uow, session_id, 2, None).unwrap();
        assert_eq!(first.len(), 2);
        let second = list_messages(&uow, session_id, 10, Some(first[1].seq)).unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(second[0].blob.joined_text(), "m2");
    }
}
