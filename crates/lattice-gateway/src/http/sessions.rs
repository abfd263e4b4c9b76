//! Session and message endpoints. Message accept is fast: persist, publish
//! `new-message`, return the id; the agent pipeline runs behind the MQ.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use lattice_agent::pipeline::consumer::flush_session_message_blocking;
use lattice_core::codec::{self, MessageFormat};
use lattice_core::topics::{self, InsertNewMessage};
use lattice_core::trim::{apply_strategies, EditStrategy};
use lattice_core::LatticeError;
use lattice_store::data::{messages, sessions, spaces};

use crate::app::AppState;
use crate::auth::resolve_project;
use crate::error::{ok_body, ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub disable_task_tracking: bool,
    /// Optional learning space to learn from this session.
    #[serde(default)]
    pub learning_space_id: Option<Uuid>,
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = resolve_project(&state, &headers)?;

    let uow = state.deps.store.unit_of_work()?;
    let session = sessions::create_session(&uow, project.id, req.disable_task_tracking)?;
    if let Some(space_id) = req.learning_space_id {
        spaces::get_project_space(&uow, project.id, space_id)?;
        spaces::link_session(&uow, space_id, session.id)?;
    }
    uow.commit()?;

    Ok(ok_body(json!({"id": session.id})))
}

#[derive(Debug, Deserialize)]
pub struct StoreMessageRequest {
    pub format: String,
    pub blob: serde_json::Value,
}

pub async fn store_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<StoreMessageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = resolve_project(&state, &headers)?;
    let format = MessageFormat::from_str(&req.format)?;
    let blob = codec::decode(format, &req.blob)?;

    let message = {
        let uow = state.deps.store.unit_of_work()?;
        sessions::get_project_session(&uow, project.id, session_id)?
            .ok_or_else(|| LatticeError::NotFound(format!("session {session_id}")))?;
        let message = messages::insert_message(&uow, session_id, &blob)?;
        uow.commit()?;
        message
    };

    state.deps.broker.publish(
        topics::NEW_MESSAGE,
        &InsertNewMessage {
            project_id: project.id,
            session_id,
            message_id: message.id,
            skip_latest_check: false,
        },
    )?;

    Ok(ok_body(json!({"id": message.id})))
}

#[derive(Debug, Deserialize)]
pub struct GetMessagesQuery {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// `seq` of the last message of the previous page.
    #[serde(default)]
    pub cursor: Option<i64>,
    /// URL-encoded JSON list of strategies, applied in order.
    #[serde(default)]
    pub edit_strategies: Option<String>,
}

fn default_format() -> String {
    "acontext".to_string()
}
fn default_limit() -> u32 {
    100
}

pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    Query(query): Query<GetMessagesQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = resolve_project(&state, &headers)?;
    let format = MessageFormat::from_str(&query.format)?;
    let strategies: Vec<EditStrategy> = match &query.edit_strategies {
        None => Vec::new(),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| LatticeError::Validation(format!("bad edit_strategies: {e}")))?,
    };
    if query.limit == 0 || query.limit > 1000 {
        return Err(LatticeError::Validation("limit must be in 1..=1000".to_string()).into());
    }

    let stored = {
        let uow = state.deps.store.unit_of_work()?;
        sessions::get_project_session(&uow, project.id, session_id)?
            .ok_or_else(|| LatticeError::NotFound(format!("session {session_id}")))?;
        let stored = messages::list_messages(&uow, session_id, query.limit, query.cursor)?;
        uow.commit()?;
        stored
    };
    let next_cursor = stored.last().map(|m| m.seq);

    let blobs: Vec<_> = stored.into_iter().map(|m| m.blob).collect();
    let trimmed = apply_strategies(blobs, &strategies)?;
    let items: Vec<serde_json::Value> = trimmed.iter().map(|b| codec::encode(format, b)).collect();

    Ok(ok_body(json!({"items": items, "next_cursor": next_cursor})))
}

pub async fn flush_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = resolve_project(&state, &headers)?;
    {
        let uow = state.deps.store.unit_of_work()?;
        sessions::get_project_session(&uow, project.id, session_id)?
            .ok_or_else(|| LatticeError::NotFound(format!("session {session_id}")))?;
    }
    flush_session_message_blocking(&state.deps, project.id, session_id).await?;
    Ok(ok_body(json!({"flushed": true})))
}
