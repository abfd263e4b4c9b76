use serde::Deserialize;
use serde_json::Value;

use lattice_core::types::ProcessStatus;
use lattice_core::{LatticeError, Result};
use lattice_store::data::{messages, tasks};
use lattice_store::UnitOfWork;

use crate::ctx::TaskCtx;

use super::parse_args;

#[derive(Debug, Deserialize)]
struct AppendArgs {
    task_order: i64,
    /// Zero-based indexes into the run's frozen pending list. `null` and
    /// absent both mean "no messages" per the provider convention.
    #[serde(default)]
    message_ids: Option<Vec<usize>>,
}

/// Bind pending messages to a task: mark them processed and append their
/// ids to the task's ordered member list.
pub fn append_messages_to_task(ctx: &mut TaskCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: AppendArgs = parse_args("append_messages_to_task", args)?;
    let indexes = args.message_ids.unwrap_or_default();
    if indexes.is_empty() {
        return Err(LatticeError::Rejected(
            "append_messages_to_task: message_ids is empty".to_string(),
        ));
    }

    let task = tasks::get_task_by_order(uow, ctx.session_id, args.task_order)
        .map_err(LatticeError::from)?
        .ok_or_else(|| {
            LatticeError::Rejected(format!(
                "append_messages_to_task: no task with order {}",
                args.task_order
            ))
        })?;

    let mut ids = Vec::with_capacity(indexes.len());
    for idx in &indexes {
        let Some(id) = ctx.pending_message_ids.get(*idx) else {
            return Err(LatticeError::Rejected(format!(
                "append_messages_to_task: message index {idx} out of range (0..{})",
                ctx.pending_message_ids.len()
            )));
        };
        if ctx.bound_indexes.contains(idx) {
            return Err(LatticeError::Rejected(format!(
                "append_messages_to_task: message index {idx} already bound"
            )));
        }
        ids.push(*id);
    }

    tasks::append_raw_message_ids(uow, task.id, &ids).map_err(LatticeError::from)?;
    messages::set_process_status(uow, &ids, ProcessStatus::Success).map_err(LatticeError::from)?;
    ctx.bound_indexes.extend(indexes.iter().copied());

    ctx.stale = true;
    Ok(format!(
        "bound {} message(s) to task #{}",
        ids.len(),
        task.order
    ))
}
