//! The task agent: an LLM-driven loop that reconciles a burst of pending
//! messages with the session's task list.
//!
//! Each iteration runs inside a single unit-of-work: build (or rebuild) the
//! context, call the model, dispatch its tool calls in order, commit. Any
//! tool rejection aborts the iteration; the transaction rolls back and the
//! run fails fatally, leaving no partial writes. Terminal `update_task`
//! transitions are drained into `skill-learn-task` publishes after the
//! loop, outside any transaction, so a publish failure cannot undo agent
//! work.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lattice_core::{topics, Result};
use lattice_llm::{CompletionRequest, LlmProvider, LlmResponse};
use lattice_store::data::{projects, spaces};
use lattice_store::types::StoredMessage;

use crate::ctx::{build_task_ctx, TaskCtx};
use crate::deps::Deps;
use crate::prompt::{pack_task_input, TASK_AGENT_SYSTEM};
use crate::tools;

/// Absorb `pending` (the session's unprocessed burst, in insertion order)
/// into the task list.
pub async fn run_task_agent(
    deps: &Deps,
    provider: Arc<dyn LlmProvider>,
    project_id: Uuid,
    session_id: Uuid,
    pending: &[StoredMessage],
) -> Result<()> {
    let pending_ids: Vec<Uuid> = pending.iter().map(|m| m.id).collect();

    // Initial read for the packed prompt; the loop opens its own
    // transactions.
    let initial_tasks = {
        let uow = deps.store.unit_of_work()?;
        let tasks = lattice_store::data::tasks::fetch_current_tasks(&uow, session_id)?;
        uow.commit()?;
        tasks
    };

    let mut history: Vec<serde_json::Value> = vec![
        json!({"role": "system", "content": TASK_AGENT_SYSTEM}),
        json!({"role": "user", "content": pack_task_input(&initial_tasks, pending)}),
    ];
    let tool_schemas = tools::schemas();

    let mut carried: Option<TaskCtx> = None;
    let max_iterations = deps.config.agent.max_iterations;

    for iteration in 0..max_iterations {
        let uow = deps.store.unit_of_work()?;
        let mut ctx = build_task_ctx(&uow, project_id, session_id, &pending_ids, carried.take())?;

        let request = CompletionRequest {
            model: deps.llm.model.clone(),
            messages: history.clone(),
            tools: tool_schemas.clone(),
            max_tokens: deps.llm.max_tokens,
        };
        debug!(iteration, session_id = %session_id, "task agent iteration");

        let response = match provider.complete(&request).await {
            Ok(r) => r,
            Err(e) => {
                uow.rollback()?;
                return Err(e.into());
            }
        };

        if !response.has_tool_calls() {
            uow.commit()?;
            info!(iteration, session_id = %session_id, "task agent done, no more tool calls");
            carried = Some(ctx);
            break;
        }

        history.push(assistant_turn(&response));

        for call in &response.tool_calls {
            // A structural tool invalidated the view: rebuild from the same
            // open unit-of-work so flushed writes are visible.
            if ctx.stale {
                ctx = build_task_ctx(&uow, project_id, session_id, &pending_ids, Some(ctx))?;
            }
            let name = call.function.name.as_str();
            match tools::dispatch(name, call.function.arguments.clone(), &mut ctx, &uow) {
                Ok(result) => {
                    debug!(tool = name, "tool ok: {result}");
                    history.push(json!({
                        "role": "tool",
                        "tool_call_id": call.id,
                        "content": result,
                    }));
                }
                Err(e) => {
                    warn!(tool = name, session_id = %session_id, "tool rejected; rolling back iteration: {e}");
                    uow.rollback()?;
                    return Err(e);
                }
            }
        }

        let finished = ctx.finished;
        uow.commit()?;
        carried = Some(ctx);

        if finished {
            info!(iteration, session_id = %session_id, "task agent finished");
            break;
        }
        if iteration + 1 == max_iterations {
            warn!(max_iterations, session_id = %session_id, "task agent hit iteration cap");
        }
    }

    let learning_task_ids = carried.map(|c| c.learning_task_ids).unwrap_or_default();
    drain_learning_tasks(deps, project_id, session_id, &learning_task_ids)?;
    Ok(())
}

/// Publish `skill-learn-task` for every terminal transition of this run,
/// but only when the session feeds a learning space and the project has
/// skill learning enabled.
fn drain_learning_tasks(
    deps: &Deps,
    project_id: Uuid,
    session_id: Uuid,
    learning_task_ids: &[Uuid],
) -> Result<()> {
    if learning_task_ids.is_empty() {
        return Ok(());
    }
    let (space, learning_enabled) = {
        let uow = deps.store.unit_of_work()?;
        let space = spaces::space_for_session(&uow, session_id)?;
        let config = projects::get_project_config(&uow, project_id)?;
        uow.commit()?;
        (space, config.enable_skill_learning)
    };
    if space.is_none() || !learning_enabled {
        debug!(session_id = %session_id, "skill learning not configured; skipping drain");
        return Ok(());
    }

    for task_id in learning_task_ids {
        let body = topics::SkillLearnTask {
            project_id,
            session_id,
            task_id: *task_id,
        };
        if let Err(e) = deps.broker.publish(topics::SKILL_LEARN_TASK, &body) {
            // Committed agent work stands; the learning task is lost and
            // logged, never retried through a rollback.
            error!(task_id = %task_id, "failed to publish skill-learn-task: {e}");
        }
    }
    Ok(())
}

fn assistant_turn(response: &LlmResponse) -> serde_json::Value {
    let tool_calls: Vec<serde_json::Value> = response
        .tool_calls
        .iter()
        .map(|call| {
            json!({
                "id": call.id,
                "type": "function",
                "function": {
                    "name": call.function.name,
                    "arguments": call.function.arguments.to_string(),
                },
            })
        })
        .collect();
    json!({
        "role": response.role,
        "content": response.content,
        "tool_calls": tool_calls,
    })
}
