use rusqlite::params;
use uuid::Uuid;

use super::{now, parse_uuid};
use crate::error::{Result, StoreError};
use crate::store::optional;
use crate::types::Session;
use crate::UnitOfWork;

pub fn create_session(
    uow: &UnitOfWork,
    project_id: Uuid,
    disable_task_tracking: bool,
) -> Result<Session> {
    let id = Uuid::new_v4();
    let created_at = now();
    uow.conn().execute(
        "INSERT INTO sessions (id, project_id, disable_task_tracking, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            id.to_string(),
            project_id.to_string(),
            disable_task_tracking as i64,
            created_at
        ],
    )?;
    Ok(Session {
        id,
        project_id,
        display_title: None,
        disable_task_tracking,
        created_at,
    })
}

pub fn get_session(uow: &UnitOfWork, session_id: Uuid) -> Result<Option<Session>> {
    let row = optional(uow.conn().query_row(
        "SELECT id, project_id, display_title, disable_task_tracking, created_at
         FROM sessions WHERE id = ?1",
        params![session_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    ))?;
    row.map(|(id, project_id, display_title, disabled, created_at)| {
        Ok(Session {
            id: parse_uuid(&id)?,
            project_id: parse_uuid(&project_id)?,
            display_title,
            disable_task_tracking: disabled != 0,
            created_at,
        })
    })
    .transpose()
}

/// Fetch a session scoped to a project; the tenant boundary check used by
/// the HTTP layer.
pub fn get_project_session(
    uow: &UnitOfWork,
    project_id: Uuid,
    session_id: Uuid,
) -> Result<Option<Session>> {
    Ok(get_session(uow, session_id)?.filter(|s| s.project_id == project_id))
}

pub fn set_display_title(uow: &UnitOfWork, session_id: Uuid, title: &str) -> Result<()> {
    let n = uow.conn().execute(
        "UPDATE sessions SET display_title = ?1 WHERE id = ?2",
        params![title, session_id.to_string()],
    )?;
    if n == 0 {
        return Err(StoreError::NotFound(format!("session {session_id}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::projects;
    use crate::Store;
    use lattice_core::config::ProjectConfig;

    #[test]
    fn session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();
        let project = projects::create_project(&uow, "h", &ProjectConfig::default()).unwrap();

        let session = create_session(&uow, project.id, false).unwrap();
        assert!(get_session(&uow, session.id).unwrap().is_some());
        assert!(get_project_session(&uow, Uuid::new_v4(), session.id)
            .unwrap()
            .is_none());

        set_display_title(&uow, session.id, "support thread").unwrap();
        let fetched = get_session(&uow, session.id).unwrap().unwrap();
        assert_eq!(fetched.display_title.as_deref(), Some("support thread"));
        uow.commit().unwrap();
    }
}
