//! Buffer controller: decides, per accepted message, whether to flush the
//! session's pending buffer now, drop the notification as stale, or arm
//! the TTL-backed timer.

use std::time::Duration;

use tracing::{debug, error, warn};

use lattice_core::topics::{self, InsertNewMessage};
use lattice_core::Result;
use lattice_coord::check_buffer_timer_or_set;
use lattice_mq::BrokerHandle;
use lattice_store::data::{messages, projects, sessions};

use crate::deps::Deps;

/// Consumer of `new-message`.
pub async fn insert_new_message(deps: &Deps, body: InsertNewMessage) -> Result<()> {
    let (pending, config) = {
        let uow = deps.store.unit_of_work()?;
        let Some(session) =
            sessions::get_project_session(&uow, body.project_id, body.session_id)?
        else {
            warn!(session_id = %body.session_id, "message for unknown session dropped");
            return Ok(());
        };
        if session.disable_task_tracking {
            debug!(session_id = %body.session_id, "task tracking disabled; storing only");
            return Ok(());
        }
        let pending = messages::get_pending_message_ids(&uow, body.session_id)?;
        let config = projects::get_project_config(&uow, body.project_id)?;
        uow.commit()?;
        (pending, config)
    };

    if pending.is_empty() {
        return Ok(());
    }
    // Staleness dedup: a newer pending message supersedes this
    // notification and will drive processing itself.
    if !body.skip_latest_check && pending.last() != Some(&body.message_id) {
        debug!(message_id = %body.message_id, "superseded by a newer message; dropped");
        return Ok(());
    }

    let n = pending.len() as u32;
    if n >= config.max_turns + config.max_overflow {
        warn!(session_id = %body.session_id, n, "buffer overflow; flushing unconditionally");
        deps.broker.publish(topics::BUFFERED_MESSAGE, &body)?;
    } else if n >= config.max_turns {
        deps.broker.publish(topics::BUFFERED_MESSAGE, &body)?;
    } else if check_buffer_timer_or_set(
        &deps.coord,
        body.session_id,
        Duration::from_secs(config.ttl_seconds),
    ) {
        // Key was absent: this message owns the timer for the TTL window.
        // The key is never deleted on processing; it expires naturally,
        // so a fresh timer can arm once traffic resumes.
        tokio::spawn(waiting_for_message_notify(
            deps.broker.clone(),
            Duration::from_secs(config.ttl_seconds),
            body,
        ));
    }
    Ok(())
}

/// The detached buffer timer: one sleep, one publish. Fires with
/// `skip_latest_check = true` so the flush happens even though newer
/// messages arrived since arming.
pub async fn waiting_for_message_notify(
    broker: BrokerHandle,
    ttl: Duration,
    body: InsertNewMessage,
) {
    tokio::time::sleep(ttl).await;
    let body = InsertNewMessage {
        skip_latest_check: true,
        ..body
    };
    if let Err(e) = broker.publish(topics::BUFFERED_MESSAGE, &body) {
        error!(session_id = %body.session_id, "buffer timer publish failed: {e}");
    }
}
