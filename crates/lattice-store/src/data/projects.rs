use rusqlite::params;
use uuid::Uuid;

use lattice_core::config::ProjectConfig;

use super::{now, parse_uuid};
use crate::error::{Result, StoreError};
use crate::store::optional;
use crate::types::Project;
use crate::UnitOfWork;

pub fn create_project(uow: &UnitOfWork, secret_hmac: &str, configs: &ProjectConfig) -> Result<Project> {
    let id = Uuid::new_v4();
    let created_at = now();
    uow.conn().execute(
        "INSERT INTO projects (id, secret_hmac, configs, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            id.to_string(),
            secret_hmac,
            serde_json::to_string(configs)?,
            created_at
        ],
    )?;
    Ok(Project {
        id,
        configs: configs.clone(),
        created_at,
    })
}

pub fn get_project(uow: &UnitOfWork, project_id: Uuid) -> Result<Option<Project>> {
    let row = optional(uow.conn().query_row(
        "SELECT id, configs, created_at FROM projects WHERE id = ?1",
        params![project_id.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    ))?;
    row.map(|(id, configs, created_at)| {
        Ok(Project {
            id: parse_uuid(&id)?,
            configs: serde_json::from_str(&configs)?,
            created_at,
        })
    })
    .transpose()
}

pub fn get_project_by_hmac(uow: &UnitOfWork, secret_hmac: &str) -> Result<Option<Project>> {
    let row = optional(uow.conn().query_row(
        "SELECT id, configs, created_at FROM projects WHERE secret_hmac = ?1",
        params![secret_hmac],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    ))?;
    row.map(|(id, configs, created_at)| {
        Ok(Project {
            id: parse_uuid(&id)?,
            configs: serde_json::from_str(&configs)?,
            created_at,
        })
    })
    .transpose()
}

/// Project config is required wherever the pipeline needs buffer thresholds;
/// a missing project is a fatal error, not a default.
pub fn get_project_config(uow: &UnitOfWork, project_id: Uuid) -> Result<ProjectConfig> {
    get_project(uow, project_id)?
        .map(|p| p.configs)
        .ok_or_else(|| StoreError::NotFound(format!("project {project_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    #[test]
    fn create_and_fetch_by_hmac() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();

        let mut cfg = ProjectConfig::default();
        cfg.max_turns = 1;
        cfg.llm_backend = Some("mock".to_string());
        let created = create_project(&uow, "deadbeef", &cfg).unwrap();

        let fetched = get_project_by_hmac(&uow, "deadbeef").unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.configs, cfg);
        assert!(get_project_by_hmac(&uow, "other").unwrap().is_none());
        uow.commit().unwrap();
    }

    #[test]
    fn missing_project_config_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();
        let err = get_project_config(&uow, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
