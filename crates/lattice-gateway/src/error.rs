use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use lattice_core::LatticeError;

/// JSON error envelope: `{code, msg, error?, data?}` with the HTTP status
/// derived from the error class.
pub struct ApiError(pub LatticeError);

impl From<LatticeError> for ApiError {
    fn from(e: LatticeError) -> Self {
        ApiError(e)
    }
}

impl From<lattice_store::StoreError> for ApiError {
    fn from(e: lattice_store::StoreError) -> Self {
        ApiError(e.into())
    }
}

impl From<lattice_mq::MqError> for ApiError {
    fn from(e: lattice_mq::MqError) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("request failed: {}", self.0);
        }
        let body = json!({
            "code": self.0.code(),
            "msg": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Success envelope.
pub fn ok_body(data: serde_json::Value) -> Json<serde_json::Value> {
    Json(json!({"code": 0, "msg": "ok", "data": data}))
}
