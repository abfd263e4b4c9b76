use rusqlite::params;
use uuid::Uuid;

use super::{now, parse_uuid};
use crate::error::{Result, StoreError};
use crate::store::optional;
use crate::types::{Artifact, AssetMeta, Disk};
use crate::UnitOfWork;

pub fn create_disk(uow: &UnitOfWork, project_id: Uuid, user_id: Option<Uuid>) -> Result<Disk> {
    let id = Uuid::new_v4();
    let created_at = now();
    uow.conn().execute(
        "INSERT INTO disks (id, project_id, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            id.to_string(),
            project_id.to_string(),
            user_id.map(|u| u.to_string()),
            created_at
        ],
    )?;
    Ok(Disk {
        id,
        project_id,
        user_id,
        created_at,
    })
}

/// Create or replace the artifact at (disk, path, filename).
pub fn put_artifact(
    uow: &UnitOfWork,
    disk_id: Uuid,
    path: &str,
    filename: &str,
    asset_meta: &AssetMeta,
) -> Result<Artifact> {
    let id = Uuid::new_v4();
    let ts = now();
    uow.conn().execute(
        "INSERT INTO artifacts (id, disk_id, path, filename, asset_meta, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(disk_id, path, filename)
         DO UPDATE SET asset_meta = excluded.asset_meta, updated_at = excluded.updated_at",
        params![
            id.to_string(),
            disk_id.to_string(),
            path,
            filename,
            serde_json::to_string(asset_meta)?,
            ts
        ],
    )?;
    // Read back: on conflict the original row id survives.
    get_artifact(uow, disk_id, path, filename)?
        .ok_or_else(|| StoreError::NotFound(format!("artifact {path}/{filename}")))
}

pub fn get_artifact(
    uow: &UnitOfWork,
    disk_id: Uuid,
    path: &str,
    filename: &str,
) -> Result<Option<Artifact>> {
    let row = optional(uow.conn().query_row(
        "SELECT id, disk_id, path, filename, asset_meta FROM artifacts
         WHERE disk_id = ?1 AND path = ?2 AND filename = ?3",
        params![disk_id.to_string(), path, filename],
        row_tuple,
    ))?;
    row.map(tuple_to_artifact).transpose()
}

pub fn list_artifacts(uow: &UnitOfWork, disk_id: Uuid) -> Result<Vec<Artifact>> {
    let mut stmt = uow.conn().prepare(
        "SELECT id, disk_id, path, filename, asset_meta FROM artifacts
         WHERE disk_id = ?1 ORDER BY path, filename",
    )?;
    let rows = stmt.query_map(params![disk_id.to_string()], row_tuple)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(tuple_to_artifact(row?)?);
    }
    Ok(out)
}

pub fn delete_artifact(uow: &UnitOfWork, disk_id: Uuid, path: &str, filename: &str) -> Result<()> {
    let n = uow.conn().execute(
        "DELETE FROM artifacts WHERE disk_id = ?1 AND path = ?2 AND filename = ?3",
        params![disk_id.to_string(), path, filename],
    )?;
    if n == 0 {
        return Err(StoreError::NotFound(format!("artifact {path}/{filename}")));
    }
    Ok(())
}

type ArtifactRow = (String, String, String, String, String);

fn row_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArtifactRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn tuple_to_artifact((id, disk_id, path, filename, meta): ArtifactRow) -> Result<Artifact> {
    Ok(Artifact {
        id: parse_uuid(&id)?,
        disk_id: parse_uuid(&disk_id)?,
        path,
        filename,
        asset_meta: serde_json::from_str(&meta)?,
    })
}

/// Build an [`AssetMeta`] for inline text content, hashing with SHA-256.
pub fn text_asset_meta(text: &str, mime: &str) -> AssetMeta {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    AssetMeta {
        sha256: hex::encode(hasher.finalize()),
        mime: mime.to_string(),
        size: text.len() as u64,
        text: Some(text.to_string()),
        s3_key: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::projects;
    use crate::Store;
    use lattice_core::config::ProjectConfig;

    fn setup() -> (tempfile::TempDir, std::sync::Arc<Store>, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();
        let project = projects::create_project(&uow, "h", &ProjectConfig::default()).unwrap();
        uow.commit().unwrap();
        (dir, store, project.id)
    }

    #[test]
    fn artifact_put_get_replace_delete() {
        let (_dir, store, project_id) = setup();
        let uow = store.unit_of_work().unwrap();
        let disk = create_disk(&uow, project_id, None).unwrap();

        let first = put_artifact(
            &uow,
            disk.id,
            "/",
            "SKILL.md",
            &text_asset_meta("v1", "text/markdown"),
        )
        .unwrap();
        assert_eq!(first.asset_meta.text.as_deref(), Some("v1"));
        assert_eq!(first.full_path(), "/SKILL.md");

        // Replacing keeps the identity, swaps the content.
        let second = put_artifact(
            &uow,
            disk.id,
            "/",
            "SKILL.md",
            &text_asset_meta("v2", "text/markdown"),
        )
        .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.asset_meta.text.as_deref(), Some("v2"));
        assert_ne!(second.asset_meta.sha256, first.asset_meta.sha256);

        assert_eq!(list_artifacts(&uow, disk.id).unwrap().len(), 1);
        delete_artifact(&uow, disk.id, "/", "SKILL.md").unwrap();
        assert!(get_artifact(&uow, disk.id, "/", "SKILL.md").unwrap().is_none());
    }
}
