//! Registration flow handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::AppError;
use crate::flow::{FlowInput, FlowResult};
use crate::models::Integration;

#[derive(Debug, Deserialize)]
pub struct StartFlowRequest {
    pub integration: Integration,
}

#[derive(Debug, Serialize)]
pub struct FlowResponse {
    pub flow_id: String,
    pub result: FlowResult,
}

/// POST /api/flows - Start a registration flow
pub async fn start_flow(
    State(state): State<AppState>,
    Json(payload): Json<StartFlowRequest>,
) -> Result<Json<FlowResponse>, AppError> {
    let (flow_id, result) = state.flows.start(payload.integration).await?;
    Ok(Json(FlowResponse { flow_id, result }))
}

/// POST /api/flows/:flow_id - Submit the current step
pub async fn progress_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
    Json(input): Json<FlowInput>,
) -> Result<Json<FlowResponse>, AppError> {
    let result = state.flows.progress(&flow_id, input).await?;
    Ok(Json(FlowResponse { flow_id, result }))
}
