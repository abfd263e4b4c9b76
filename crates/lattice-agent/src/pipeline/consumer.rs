//! Session-message consumer: drains a session's pending messages under the
//! session lock and runs the task agent.

use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use lattice_core::topics::{self, InsertNewMessage};
use lattice_core::types::ProcessStatus;
use lattice_core::{LatticeError, Result};
use lattice_coord::{acquire_session_lock, release_session_lock};
use lattice_store::data::{messages, projects};
use lattice_store::types::StoredMessage;

use crate::deps::Deps;
use crate::task_agent::run_task_agent;

/// Consumer of `buffered-message`.
pub async fn buffer_new_message(deps: &Deps, body: InsertNewMessage) -> Result<()> {
    let pending = {
        let uow = deps.store.unit_of_work()?;
        let pending = messages::get_pending_message_ids(&uow, body.session_id)?;
        uow.commit()?;
        pending
    };
    // Another consumer may have drained the session already.
    if pending.is_empty() {
        return Ok(());
    }
    if !body.skip_latest_check && pending.last() != Some(&body.message_id) {
        debug!(message_id = %body.message_id, "superseded; dropped");
        return Ok(());
    }

    let ttl = Duration::from_secs(deps.config.agent.session_lock_ttl_seconds);
    let Some(token) = acquire_session_lock(&deps.coord, body.session_id, ttl) else {
        // Another worker holds the session. Requeue once per delivery with
        // the staleness check restored; MQ redelivery takes it from there.
        info!(session_id = %body.session_id, "session locked; republishing");
        let retry = InsertNewMessage {
            skip_latest_check: false,
            ..body
        };
        deps.broker.publish(topics::BUFFERED_MESSAGE, &retry)?;
        return Ok(());
    };

    let result = process_session_pending_messages(deps, body.project_id, body.session_id).await;
    release_session_lock(&deps.coord, body.session_id, token);
    result
}

/// Load the pending burst and run the task agent over it. Business
/// failures mark the burst's messages `failed` and are acked; a future
/// message or the timer re-drives processing; transient failures propagate
/// for redelivery.
pub async fn process_session_pending_messages(
    deps: &Deps,
    project_id: Uuid,
    session_id: Uuid,
) -> Result<()> {
    let (pending, backend_override) = {
        let uow = deps.store.unit_of_work()?;
        let ids = messages::get_pending_message_ids(&uow, session_id)?;
        let pending = messages::get_messages_by_ids(&uow, &ids)?;
        let config = projects::get_project_config(&uow, project_id)?;
        uow.commit()?;
        (pending, config.llm_backend)
    };
    if pending.is_empty() {
        return Ok(());
    }

    let provider = deps.llm.select(backend_override.as_deref());
    match run_task_agent(deps, provider.clone(), project_id, session_id, &pending).await {
        Ok(()) => {}
        Err(e) if e.is_transient() => return Err(e),
        Err(e) => {
            warn!(session_id = %session_id, "task agent failed fatally: {e}");
            mark_failed(deps, &pending)?;
            return Ok(());
        }
    }

    // The mock backend answers trigger phrases with a canned assistant
    // message; real backends return None and nothing is stored.
    if let Some(reply) = provider.canned_session_reply(&latest_user_text(&pending)) {
        let uow = deps.store.unit_of_work()?;
        messages::insert_message(&uow, session_id, &reply)?;
        uow.commit()?;
    }
    Ok(())
}

/// Manual flush with bounded retries: loop on the session lock, sleeping
/// between attempts; exhaustion returns a rejection instead of spinning.
pub async fn flush_session_message_blocking(
    deps: &Deps,
    project_id: Uuid,
    session_id: Uuid,
) -> Result<()> {
    let max_retries = deps.config.agent.flush_max_retries;
    let wait = Duration::from_millis(deps.config.agent.flush_retry_wait_ms);
    let ttl = Duration::from_secs(deps.config.agent.session_lock_ttl_seconds);

    for attempt in 0..max_retries {
        if let Some(token) = acquire_session_lock(&deps.coord, session_id, ttl) {
            let result = process_session_pending_messages(deps, project_id, session_id).await;
            release_session_lock(&deps.coord, session_id, token);
            return result;
        }
        debug!(session_id = %session_id, attempt, "flush waiting on session lock");
        if attempt + 1 < max_retries {
            tokio::time::sleep(wait).await;
        }
    }
    Err(LatticeError::LockContended(format!(
        "session {session_id} still locked after {max_retries} flush retries"
    )))
}

fn mark_failed(deps: &Deps, pending: &[StoredMessage]) -> Result<()> {
    let ids: Vec<Uuid> = pending.iter().map(|m| m.id).collect();
    let uow = deps.store.unit_of_work()?;
    messages::set_process_status(&uow, &ids, ProcessStatus::Failed)?;
    uow.commit()?;
    Ok(())
}

fn latest_user_text(pending: &[StoredMessage]) -> String {
    pending
        .iter()
        .rev()
        .find(|m| m.blob.role == lattice_core::types::Role::User)
        .map(|m| m.blob.joined_text())
        .unwrap_or_default()
}
