//! The skill-learn agent loop: the same iteration contract as the task
//! agent. One transaction per iteration, tool calls dispatched in order,
//! any rejection rolls the iteration back.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use lattice_agent::deps::Deps;
use lattice_core::topics::SkillLearnDistilled;
use lattice_core::Result;
use lattice_llm::{CompletionRequest, LlmProvider, LlmResponse};

use crate::ctx::{build_skill_ctx, SkillCtx};
use crate::prompt::{pack_skill_learner_input, render_available_skills, SKILL_LEARNER_SYSTEM};
use crate::tools;

/// Mutate the learning space's skill library guided by the distilled
/// context. The caller holds `learn-lock:{learning_space_id}`.
pub async fn run_skill_agent(
    deps: &Deps,
    provider: Arc<dyn LlmProvider>,
    body: &SkillLearnDistilled,
) -> Result<()> {
    // Seed the prompt with the library as it stands.
    let seeded_skills = {
        let uow = deps.store.unit_of_work()?;
        let skills = lattice_store::data::spaces::list_space_skills(&uow, body.learning_space_id)?;
        uow.commit()?;
        skills
    };

    let mut history: Vec<serde_json::Value> = vec![
        json!({"role": "system", "content": SKILL_LEARNER_SYSTEM}),
        json!({"role": "user", "content": pack_skill_learner_input(
            &body.distilled_context,
            &render_available_skills(&seeded_skills),
        )}),
    ];
    let tool_schemas = tools::schemas();

    let mut carried: Option<SkillCtx> = None;
    let max_iterations = deps.config.learner.max_iterations;

    for iteration in 0..max_iterations {
        let uow = deps.store.unit_of_work()?;
        let mut ctx = build_skill_ctx(
            &uow,
            body.project_id,
            body.learning_space_id,
            carried.take(),
        )?;

        let request = CompletionRequest {
            model: deps.llm.model.clone(),
            messages: history.clone(),
            tools: tool_schemas.clone(),
            max_tokens: deps.llm.max_tokens,
        };
        debug!(iteration, learning_space_id = %body.learning_space_id, "skill agent iteration");

        let response = match provider.complete(&request).await {
            Ok(r) => r,
            Err(e) => {
                uow.rollback()?;
                return Err(e.into());
            }
        };

        if !response.has_tool_calls() {
            uow.commit()?;
            info!(iteration, "skill agent done, no more tool calls");
            break;
        }

        history.push(assistant_turn(&response));

        for call in &response.tool_calls {
            // After create_skill (or any library edit) the listing is
            // refreshed from the same open transaction.
            if ctx.stale {
                ctx = build_skill_ctx(
                    &uow,
                    body.project_id,
                    body.learning_space_id,
                    Some(ctx),
                )?;
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
                    warn!(tool = name, "tool rejected; rolling back iteration: {e}");
                    uow.rollback()?;
                    return Err(e);
                }
            }
        }

        let finished = ctx.finished;
        uow.commit()?;
        carried = Some(ctx);

        if finished {
            info!(iteration, learning_space_id = %body.learning_space_id, "skill agent finished");
            break;
        }
        if iteration + 1 == max_iterations {
            warn!(max_iterations, "skill agent hit iteration cap");
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
