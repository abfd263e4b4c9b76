use serde::Deserialize;
use serde_json::Value;

use lattice_core::{LatticeError, Result};
use lattice_store::data::tasks;
use lattice_store::UnitOfWork;

use crate::ctx::TaskCtx;

use super::parse_args;

#[derive(Debug, Deserialize)]
struct ProgressArgs {
    task_order: i64,
    progress_text: String,
}

pub fn append_task_progress(ctx: &mut TaskCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: ProgressArgs = parse_args("append_task_progress", args)?;
    if args.progress_text.trim().is_empty() {
        return Err(LatticeError::Rejected(
            "append_task_progress: progress_text must not be empty".to_string(),
        ));
    }

    let task = tasks::get_task_by_order(uow, ctx.session_id, args.task_order)
        .map_err(LatticeError::from)?
        .ok_or_else(|| {
            LatticeError::Rejected(format!(
                "append_task_progress: no task with order {}",
                args.task_order
            ))
        })?;

    let mut data = task.data;
    data.progresses.push(args.progress_text.trim().to_string());
    tasks::update_task_data(uow, task.id, &data).map_err(LatticeError::from)?;
    Ok(format!("recorded progress on task #{}", task.order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx::build_task_ctx;
    use lattice_core::config::ProjectConfig;
    use lattice_store::data::{projects, sessions};
    use lattice_store::Store;
    use serde_json::json;

    #[test]
    fn two_appends_in_one_transaction_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db")).unwrap();
        let uow = store.unit_of_work().unwrap();
        let project = projects::create_project(&uow, "h", &ProjectConfig::default()).unwrap();
        let session = sessions::create_session(&uow, project.id, false).unwrap();
        tasks::insert_task_after(&uow, session.id, 0, "t").unwrap();
        let mut ctx = build_task_ctx(&uow, project.id, session.id, &[], None).unwrap();

        append_task_progress(&mut ctx, &uow, json!({"task_order": 1, "progress_text": "a"}))
            .unwrap();
        append_task_progress(&mut ctx, &uow, json!({"task_order": 1, "progress_text": "b"}))
            .unwrap();

        let task = tasks::get_task_by_order(&uow, session.id, 1).unwrap().unwrap();
        assert_eq!(task.data.progresses, vec!["a", "b"]);
    }
}
