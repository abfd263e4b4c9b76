//! The two learning consumers: distillation (`skill-learn-task`) and the
//! skill agent (`skill-learn-distilled`).

use std::time::Duration;

use tracing::{debug, info, warn};

use lattice_agent::deps::Deps;
use lattice_core::topics::{self, SkillLearnDistilled, SkillLearnTask};
use lattice_core::{LatticeError, Result};
use lattice_coord::{acquire_learn_lock, release_learn_lock};
use lattice_llm::CompletionRequest;
use lattice_mq::Broker;
use lattice_store::data::{messages, projects, spaces, tasks};

use crate::agent::run_skill_agent;
use crate::distill::{
    extract_distillation_result, format_distilled, pack_distillation_input, tool_schemas,
    DistillationOutcome, DISTILL_SYSTEM,
};

/// Consumer of `skill-learn-task`: distill the terminal task and hand the
/// result to the skill agent's topic.
pub async fn process_skill_distillation(deps: &Deps, body: SkillLearnTask) -> Result<()> {
    let (learning_space_id, task, transcript, backend_override) = {
        let uow = deps.store.unit_of_work()?;
        let Some(space_id) = spaces::space_for_session(&uow, body.session_id)? else {
            // No learning configured for this session.
            debug!(session_id = %body.session_id, "no learning space; dropping");
            return Ok(());
        };
        let Some(task) = tasks::get_task(&uow, body.task_id)? else {
            warn!(task_id = %body.task_id, "learning task vanished; dropping");
            return Ok(());
        };
        let transcript = messages::get_messages_by_ids(&uow, &task.raw_message_ids)?;
        let config = projects::get_project_config(&uow, body.project_id)?;
        uow.commit()?;
        (space_id, task, transcript, config.llm_backend)
    };

    let provider = deps.llm.select(backend_override.as_deref());
    let request = CompletionRequest {
        model: deps.llm.model.clone(),
        messages: vec![
            serde_json::json!({"role": "system", "content": DISTILL_SYSTEM}),
            serde_json::json!({"role": "user", "content": pack_distillation_input(&task, &transcript)}),
        ],
        tools: tool_schemas(),
        max_tokens: deps.llm.max_tokens,
    };

    let response = provider.complete(&request).await.map_err(LatticeError::from)?;
    let outcome = match extract_distillation_result(&response) {
        Ok(outcome) => outcome,
        Err(e) => {
            // Malformed analysis: log and drop, nothing downstream.
            warn!(task_id = %body.task_id, "distillation unusable: {e}");
            return Ok(());
        }
    };

    let Some(distilled_context) = format_distilled(&outcome) else {
        if let DistillationOutcome::Skip { reason } = &outcome {
            info!(task_id = %body.task_id, "task not worth learning: {reason}");
        }
        return Ok(());
    };

    deps.broker.publish(
        topics::SKILL_LEARN_DISTILLED,
        &SkillLearnDistilled {
            project_id: body.project_id,
            session_id: body.session_id,
            task_id: body.task_id,
            learning_space_id,
            distilled_context,
        },
    )?;
    info!(task_id = %body.task_id, learning_space_id = %learning_space_id, "distilled context published");
    Ok(())
}

/// Consumer of `skill-learn-distilled`: serialize on the learning space
/// and run the skill agent.
pub async fn process_skill_agent(deps: &Deps, body: SkillLearnDistilled) -> Result<()> {
    let ttl = Duration::from_secs(deps.config.learner.lock_ttl_seconds);
    let Some(token) = acquire_learn_lock(&deps.coord, body.learning_space_id, ttl) else {
        // Another worker is mutating this space; requeue the body verbatim.
        info!(learning_space_id = %body.learning_space_id, "learn lock contended; republishing");
        deps.broker.publish(topics::SKILL_LEARN_DISTILLED, &body)?;
        return Ok(());
    };

    let backend_override = {
        let uow = deps.store.unit_of_work()?;
        let config = projects::get_project_config(&uow, body.project_id)?;
        uow.commit()?;
        config.llm_backend
    };
    let provider = deps.llm.select(backend_override.as_deref());

    let result = run_skill_agent(deps, provider, &body).await;
    release_learn_lock(&deps.coord, body.learning_space_id, token);

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_transient() => Err(e),
        Err(e) => {
            // Business rejection: the iteration rolled back; nothing to
            // retry. Log with enough context to trace the run.
            warn!(
                session_id = %body.session_id,
                task_id = %body.task_id,
                "skill agent failed fatally: {e}"
            );
            Ok(())
        }
    }
}

/// Register both learning consumers on the broker.
pub fn register(broker: &mut Broker, deps: Deps) {
    let d = deps.clone();
    broker.subscribe(topics::SKILL_LEARN_TASK, move |body| {
        let deps = d.clone();
        async move { process_skill_distillation(&deps, decode(body)?).await }
    });

    broker.subscribe(topics::SKILL_LEARN_DISTILLED, move |body| {
        let deps = deps.clone();
        async move { process_skill_agent(&deps, decode(body)?).await }
    });
}

fn decode<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| {
        warn!("undecodable learning message body: {e}");
        LatticeError::Validation(format!("bad message body: {e}"))
    })
}
