use axum::{Json, response::IntoResponse};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
}

/// Service banner for the bare root path.
pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: "VoiceForge API",
        status: "running",
    })
}
