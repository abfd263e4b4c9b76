use serde::Deserialize;
use serde_json::Value;

use lattice_core::{LatticeError, Result};
use lattice_store::data::tasks;
use lattice_store::UnitOfWork;

use crate::ctx::TaskCtx;

use super::parse_args;

#[derive(Debug, Deserialize)]
struct PreferenceArgs {
    task_order: i64,
    preference_text: String,
}

pub fn submit_user_preference(ctx: &mut TaskCtx, uow: &UnitOfWork, args: Value) -> Result<String> {
    let args: PreferenceArgs = parse_args("submit_user_preference", args)?;
    if args.preference_text.trim().is_empty() {
        return Err(LatticeError::Rejected(
            "submit_user_preference: preference_text must not be empty".to_string(),
        ));
    }

    let task = tasks::get_task_by_order(uow, ctx.session_id, args.task_order)
        .map_err(LatticeError::from)?
        .ok_or_else(|| {
            LatticeError::Rejected(format!(
                "submit_user_preference: no task with order {}",
                args.task_order
            ))
        })?;

    let mut data = task.data;
    data.user_preferences
        .push(args.preference_text.trim().to_string());
    tasks::update_task_data(uow, task.id, &data).map_err(LatticeError::from)?;
    Ok(format!("recorded preference on task #{}", task.order))
}
