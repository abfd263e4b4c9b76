use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use lattice_core::config::TOKEN_PREFIX;
use lattice_core::LatticeError;
use lattice_store::data::projects;
use lattice_store::types::Project;

use crate::app::AppState;
use crate::error::ApiError;

/// HMAC-SHA256 of the project secret under the server pepper, hex encoded.
/// This is what `projects.secret_hmac` stores; raw secrets never land in
/// the database.
pub fn hash_secret(pepper: &str, secret: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(pepper.as_bytes()).expect("hmac accepts any key length");
    mac.update(secret.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Resolve `Authorization: Bearer sk-lt-{secret}` to a project.
pub fn resolve_project(state: &AppState, headers: &HeaderMap) -> Result<Project, ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ApiError(LatticeError::AuthFailed(
                "missing Authorization bearer token".to_string(),
            ))
        })?;
    let secret = token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
        ApiError(LatticeError::AuthFailed(format!(
            "token must start with {TOKEN_PREFIX}"
        )))
    })?;

    let digest = hash_secret(&state.deps.config.gateway.auth_pepper, secret);
    let uow = state.deps.store.unit_of_work().map_err(ApiError::from)?;
    let project = projects::get_project_by_hmac(&uow, &digest).map_err(ApiError::from)?;
    project.ok_or_else(|| ApiError(LatticeError::AuthFailed("unknown project token".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_pepper_sensitive() {
        let a = hash_secret("pepper", "secret");
        assert_eq!(a, hash_secret("pepper", "secret"));
        assert_ne!(a, hash_secret("other", "secret"));
        assert_ne!(a, hash_secret("pepper", "other"));
        assert_eq!(a.len(), 64);
    }
}
