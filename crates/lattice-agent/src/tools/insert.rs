use serde::Deserialize;
use serde_json::Value;

use lattice_core::{LatticeError, Result};
use lattice_store::data::tasks;
use lattice_store::UnitOfWork;

use crate::ctx::TaskCtx;

use super::parse_args;

#[derive(Debug, Deserialize)]
struct InsertTaskArgs {
    after_task_order: i64,
    task_description: String,
}

/// Insert a new pending task after `after_task_order`, renumbering the
/// tail. Refuses while another task is still open; at most one task per
/// session may be non-terminal.
pub fn insert_task(ctx: &mut TaskCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: InsertTaskArgs = parse_args("insert_task", args)?;
    if args.task_description.trim().is_empty() {
        return Err(LatticeError::Rejected(
            "insert_task: task_description must not be empty".to_string(),
        ));
    }

    let open = tasks::fetch_current_tasks(uow, ctx.session_id)
        .map_err(lattice_core::LatticeError::from)?
        .into_iter()
        .find(|t| !t.status.is_terminal());
    if let Some(open) = open {
        return Err(LatticeError::Rejected(format!(
            "insert_task: task #{} is still {}; close it before opening a new task",
            open.order, open.status
        )));
    }

    let task = tasks::insert_task_after(
        uow,
        ctx.session_id,
        args.after_task_order,
        args.task_description.trim(),
    )
    .map_err(lattice_core::LatticeError::from)?;

    ctx.stale = true;
    Ok(format!("inserted task #{}", task.order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::build_task_ctx;
    use lattice_core::config::ProjectConfig;
    use lattice_core::types::TaskStatus;
    use lattice_store::data::{projects, sessions};
    use lattice_store::Store;
    use serde_json::json;

    fn setup() -> (tempfile::TempDir, std::sync::Arc<Store>, uuid::Uuid, uuid::Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();
        let project = projects::create_project(&uow, "h", &ProjectConfig::default()).unwrap();
        let session = sessions::create_session(&uow, project.id, false).unwrap();
        uow.commit().unwrap();
        (dir, store, project.id, session.id)
    }

    #[test]
    fn insert_creates_pending_task_and_marks_ctx_stale() {
        let (_dir, store, project_id, session_id) = setup();
        let uow = store.unit_of_work().unwrap();
        let mut ctx = build_task_ctx(&uow, project_id, session_id, &[], None).unwrap();

        let out = insert_task(
            &mut ctx,
            &uow,
            json!({"after_task_order": 0, "task_description": "do the thing"}),
        )
        .unwrap();
        assert_eq!(out, "inserted task #1");
        assert!(ctx.stale);

        let created = tasks::get_task_by_order(&uow, session_id, 1).unwrap().unwrap();
        assert_eq!(created.status, TaskStatus::Pending);
        uow.commit().unwrap();
    }

    #[test]
    fn insert_rejected_while_a_task_is_open() {
        let (_dir, store, project_id, session_id) = setup();
        let uow = store.unit_of_work().unwrap();
        tasks::insert_task_after(&uow, session_id, 0, "open task").unwrap();

        let mut ctx = build_task_ctx(&uow, project_id, session_id, &[], None).unwrap();
        let err = insert_task(
            &mut ctx,
            &uow,
            json!({"after_task_order": 1, "task_description": "another"}),
        )
        .unwrap_err();
        assert!(matches!(err, LatticeError::Rejected(_)));
    }

    #[test]
    fn malformed_arguments_rejected() {
        let (_dir, store, project_id, session_id) = setup();
        let uow = store.unit_of_work().unwrap();
        let mut ctx = build_task_ctx(&uow, project_id, session_id, &[], None).unwrap();
        let err = insert_task(&mut ctx, &uow, json!({"after_task_order": "zero"})).unwrap_err();
        assert!(matches!(err, LatticeError::Rejected(_)));
    }
}
