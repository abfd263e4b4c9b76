use rusqlite::params;
use uuid::Uuid;

use super::{now, parse_uuid};
use crate::data::disks;
use crate::error::{Result, StoreError};
use crate::store::optional;
use crate::types::{LearningSpace, SkillInfo};
use crate::UnitOfWork;

pub fn create_learning_space(uow: &UnitOfWork, project_id: Uuid) -> Result<LearningSpace> {
    let id = Uuid::new_v4();
    let created_at = now();
    uow.conn().execute(
        "INSERT INTO learning_spaces (id, project_id, created_at) VALUES (?1, ?2, ?3)",
        params![id.to_string(), project_id.to_string(), created_at],
    )?;
    Ok(LearningSpace {
        id,
        project_id,
        created_at,
    })
}

pub fn get_learning_space(uow: &UnitOfWork, space_id: Uuid) -> Result<Option<LearningSpace>> {
    let row = optional(uow.conn().query_row(
        "SELECT id, project_id, created_at FROM learning_spaces WHERE id = ?1",
        params![space_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    ))?;
    row.map(|(id, project_id, created_at)| {
        Ok(LearningSpace {
            id: parse_uuid(&id)?,
            project_id: parse_uuid(&project_id)?,
            created_at,
        })
    })
    .transpose()
}

/// Attach a session to a learning space. A session learns into at most one
/// space, so re-linking replaces the previous junction row.
pub fn link_session(uow: &UnitOfWork, space_id: Uuid, session_id: Uuid) -> Result<()> {
    uow.conn().execute(
        "INSERT INTO learning_space_sessions (session_id, learning_space_id) VALUES (?1, ?2)
         ON CONFLICT(session_id) DO UPDATE SET learning_space_id = excluded.learning_space_id",
        params![session_id.to_string(), space_id.to_string()],
    )?;
    Ok(())
}

/// The learning space a session feeds, if any.
pub fn space_for_session(uow: &UnitOfWork, session_id: Uuid) -> Result<Option<Uuid>> {
    let row = optional(uow.conn().query_row(
        "SELECT learning_space_id FROM learning_space_sessions WHERE session_id = ?1",
        params![session_id.to_string()],
        |row| row.get::<_, String>(0),
    ))?;
    row.map(|id| parse_uuid(&id)).transpose()
}

pub fn link_skill(uow: &UnitOfWork, space_id: Uuid, skill_id: Uuid) -> Result<()> {
    uow.conn().execute(
        "INSERT OR IGNORE INTO learning_space_skills (learning_space_id, skill_id) VALUES (?1, ?2)",
        params![space_id.to_string(), skill_id.to_string()],
    )?;
    Ok(())
}

/// Skills of a learning space with their file listings, for seeding the
/// skill-learn agent.
pub fn list_space_skills(uow: &UnitOfWork, space_id: Uuid) -> Result<Vec<SkillInfo>> {
    let mut stmt = uow.conn().prepare(
        "SELECT s.id, s.disk_id, s.name, s.description
         FROM agent_skills s
         JOIN learning_space_skills j ON j.skill_id = s.id
         WHERE j.learning_space_id = ?1
         ORDER BY s.name",
    )?;
    let rows = stmt.query_map(params![space_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, disk_id, name, description) = row?;
        let disk_id = parse_uuid(&disk_id)?;
        let file_paths = disks::list_artifacts(uow, disk_id)?
            .iter()
            .map(|a| a.full_path())
            .collect();
        out.push(SkillInfo {
            id: parse_uuid(&id)?,
            disk_id,
            name,
            description,
            file_paths,
        });
    }
    Ok(out)
}

/// Tenant check used by the learner before touching a space.
pub fn get_project_space(
    uow: &UnitOfWork,
    project_id: Uuid,
    space_id: Uuid,
) -> Result<LearningSpace> {
    get_learning_space(uow, space_id)?
        .filter(|s| s.project_id == project_id)
        .ok_or_else(|| StoreError::NotFound(format!("learning space {space_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{disks, projects, sessions, skills};
    use crate::Store;
    use lattice_core::config::ProjectConfig;

    #[test]
    fn session_links_to_one_space_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();
        let project = projects::create_project(&uow, "h", &ProjectConfig::default()).unwrap();
        let session = sessions::create_session(&uow, project.id, false).unwrap();
        let space_a = create_learning_space(&uow, project.id).unwrap();
        let space_b = create_learning_space(&uow, project.id).unwrap();

        assert!(space_for_session(&uow, session.id).unwrap().is_none());
        link_session(&uow, space_a.id, session.id).unwrap();
        assert_eq!(space_for_session(&uow, session.id).unwrap(), Some(space_a.id));
        link_session(&uow, space_b.id, session.id).unwrap();
        assert_eq!(space_for_session(&uow, session.id).unwrap(), Some(space_b.id));
    }

    #[test]
    fn space_skill_listing_includes_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();
        let project = projects::create_project(&uow, "h", &ProjectConfig::default()).unwrap();
        let space = create_learning_space(&uow, project.id).unwrap();
        let disk = disks::create_disk(&uow, project.id, None).unwrap();
        let skill = skills::create_skill(&uow, project.id, "auth", "authn notes", disk.id).unwrap();
        disks::put_artifact(
            &uow,
            disk.id,
            "/",
            "SKILL.md",
            &disks::text_asset_meta("---\nname: auth\n---", "text/markdown"),
        )
        .unwrap();
        link_skill(&uow, space.id, skill.id).unwrap();
        link_skill(&uow, space.id, skill.id).unwrap(); // idempotent

        let infos = list_space_skills(&uow, space.id).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "auth");
        assert_eq!(infos[0].file_paths, vec!["/SKILL.md".to_string()]);
    }
}
