//! Learning-space management endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use lattice_core::LatticeError;
use lattice_store::data::{sessions, spaces};

use crate::app::AppState;
use crate::auth::resolve_project;
use crate::error::{ok_body, ApiError};

pub async fn create_space(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = resolve_project(&state, &headers)?;
    let uow = state.deps.store.unit_of_work()?;
    let space = spaces::create_learning_space(&uow, project.id)?;
    uow.commit()?;
    Ok(ok_body(json!({"id": space.id})))
}

pub async fn link_session(
    State(state): State<Arc<AppState>>,
    Path((space_id, session_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = resolve_project(&state, &headers)?;
    let uow = state.deps.store.unit_of_work()?;
    spaces::get_project_space(&uow, project.id, space_id)?;
    sessions::get_project_session(&uow, project.id, session_id)?
        .ok_or_else(|| LatticeError::NotFound(format!("session {session_id}")))?;
    spaces::link_session(&uow, space_id, session_id)?;
    uow.commit()?;
    Ok(ok_body(json!({"linked": true})))
}

pub async fn list_skills(
    State(state): State<Arc<AppState>>,
    Path(space_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = resolve_project(&state, &headers)?;
    let uow = state.deps.store.unit_of_work()?;
    spaces::get_project_space(&uow, project.id, space_id)?;
    let skills = spaces::list_space_skills(&uow, space_id)?;
    uow.commit()?;

    let items: Vec<serde_json::Value> = skills
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "description": s.description,
                "file_paths": s.file_paths,
            })
        })
        .collect();
    Ok(ok_body(json!({"items": items})))
}
