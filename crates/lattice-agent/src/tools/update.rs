use serde::Deserialize;
use serde_json::Value;

use lattice_core::types::TaskStatus;
use lattice_core::{LatticeError, Result};
use lattice_store::data::tasks;
use lattice_store::UnitOfWork;

use crate::ctx::TaskCtx;

use super::parse_args;

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    task_order: i64,
    status: TaskStatus,
    #[serde(default)]
    task_description: Option<String>,
}

/// Transition a task's status. Terminal transitions (success, failed) add
/// the task to the run's learning list; running and pending never do.
pub fn update_task(ctx: &mut TaskCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: UpdateArgs = parse_args("update_task", args)?;

    let task = tasks::get_task_by_order(uow, ctx.session_id, args.task_order)
        .map_err(LatticeError::from)?
        .ok_or_else(|| {
            LatticeError::Rejected(format!(
                "update_task: no task with order {}",
                args.task_order
            ))
        })?;

    if !task.status.can_transition_to(args.status) {
        return Err(LatticeError::Rejected(format!(
            "update_task: illegal transition {} -> {} on task #{}",
            task.status, args.status, task.order
        )));
    }

    tasks::update_task_status(uow, task.id, args.status).map_err(LatticeError::from)?;
    if let Some(description) = args
        .task_description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        let mut data = task.data.clone();
        data.task_description = description.to_string();
        tasks::update_task_data(uow, task.id, &data).map_err(LatticeError::from)?;
    }

    if args.status.is_terminal() {
        ctx.learning_task_ids.push(task.id);
    }
    Ok(format!("task #{} is now {}", task.order, args.status))
}
