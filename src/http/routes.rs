//! HTTP routes for code issuance and checking.

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::admission::{admit, RequestAdmission};
use crate::error::GateError;
use crate::verification::CodeService;

/// Body of `POST /code/send`.
#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    pub biz_type: String,
    pub phone: String,
}

/// Body of `POST /code/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub biz_type: String,
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
struct SendCodeResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
struct VerifyCodeResponse {
    success: bool,
    verified: bool,
}

/// Build the application router. Every route passes the IP admission check.
pub fn router(codes: CodeService, admission: RequestAdmission) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/code/send", post(send_code))
        .route("/code/verify", post(verify_code))
        .with_state(codes)
        .layer(from_fn_with_state(admission, admit))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn send_code(
    State(codes): State<CodeService>,
    Json(req): Json<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>, GateError> {
    codes.send(&req.biz_type, &req.phone).await?;
    Ok(Json(SendCodeResponse { success: true }))
}

async fn verify_code(
    State(codes): State<CodeService>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, GateError> {
    let verified = codes.verify(&req.biz_type, &req.phone, &req.code).await?;
    Ok(Json(VerifyCodeResponse {
        success: true,
        verified,
    }))
}
