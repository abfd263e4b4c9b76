use rusqlite::params;
use uuid::Uuid;

use super::{now, parse_uuid};
use crate::error::{Result, StoreError};
use crate::store::optional;
use crate::types::Skill;
use crate::UnitOfWork;

/// Sanitize a skill name: lowercase, non-alphanumerics to `-`, runs
/// collapsed, leading/trailing dashes trimmed.
pub fn sanitize_skill_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true; // swallow leading dashes
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

pub fn create_skill(
    uow: &UnitOfWork,
    project_id: Uuid,
    name: &str,
    description: &str,
    disk_id: Uuid,
) -> Result<Skill> {
    let name = sanitize_skill_name(name);
    if name.is_empty() {
        return Err(StoreError::Conflict("skill name sanitizes to empty".to_string()));
    }
    let id = Uuid::new_v4();
    let created = uow.conn().execute(
        "INSERT OR IGNORE INTO agent_skills (id, project_id, name, description, disk_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            project_id.to_string(),
            name,
            description,
            disk_id.to_string(),
            now()
        ],
    )?;
    if created == 0 {
        return Err(StoreError::Conflict(format!(
            "skill {name:?} already exists in this project"
        )));
    }
    Ok(Skill {
        id,
        project_id,
        name,
        description: description.to_string(),
        disk_id,
    })
}

pub fn get_skill_by_name(uow: &UnitOfWork, project_id: Uuid, name: &str) -> Result<Option<Skill>> {
    let row = optional(uow.conn().query_row(
        "SELECT id, project_id, name, description, disk_id FROM agent_skills
         WHERE project_id = ?1 AND name = ?2",
        params![project_id.to_string(), sanitize_skill_name(name)],
        row_tuple,
    ))?;
    row.map(tuple_to_skill).transpose()
}

/// Re-sync a skill row from its authoritative `/SKILL.md` front matter.
pub fn update_skill_meta(
    uow: &UnitOfWork,
    skill_id: Uuid,
    name: &str,
    description: &str,
) -> Result<()> {
    let name = sanitize_skill_name(name);
    let n = uow.conn().execute(
        "UPDATE agent_skills SET name = ?1, description = ?2 WHERE id = ?3",
        params![name, description, skill_id.to_string()],
    )?;
    if n == 0 {
        return Err(StoreError::NotFound(format!("skill {skill_id}")));
    }
    Ok(())
}

type SkillRow = (String, String, String, String, String);

fn row_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<SkillRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn tuple_to_skill((id, project_id, name, description, disk_id): SkillRow) -> Result<Skill> {
    Ok(Skill {
        id: parse_uuid(&id)?,
        project_id: parse_uuid(&project_id)?,
        name,
        description,
        disk_id: parse_uuid(&disk_id)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{disks, projects};
    use crate::Store;
    use lattice_core::config::ProjectConfig;

    #[test]
    fn sanitize_rules() {
        assert_eq!(sanitize_skill_name("Auth Patterns"), "auth-patterns");
        assert_eq!(sanitize_skill_name("API -- design!!"), "api-design");
        assert_eq!(sanitize_skill_name("--edge--"), "edge");
        assert_eq!(sanitize_skill_name("***"), "");
    }

    #[test]
    fn duplicate_name_per_project_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();
        let project = projects::create_project(&uow, "h", &ProjectConfig::default()).unwrap();
        let disk = disks::create_disk(&uow, project.id, None).unwrap();

        create_skill(&uow, project.id, "Auth Patterns", "d", disk.id).unwrap();
        let err = create_skill(&uow, project.id, "auth patterns", "d2", disk.id).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let fetched = get_skill_by_name(&uow, project.id, "AUTH PATTERNS")
            .unwrap()
            .unwrap();
        assert_eq!(fetched.name, "auth-patterns");
    }
}
