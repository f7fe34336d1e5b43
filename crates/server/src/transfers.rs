//! Transfers API endpoints.

use api_types::transfer::TransferNew;
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use engine::TransferCmd;

use crate::{ServerError, server::Caller, server::ServerState, validation};

/// Moves money from the caller's account to the recipient's.
///
/// Answers 200 with an empty body once the transfer is committed.
pub async fn transfer_new(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
    payload: Result<Json<TransferNew>, JsonRejection>,
) -> Result<StatusCode, ServerError> {
    let Json(payload) = payload.map_err(|rejection| ServerError::Generic(rejection.body_text()))?;
    let (recipient_id, amount) = validation::transfer(&payload)?;

    state
        .engine
        .transfer(TransferCmd::new(caller.user_id, recipient_id, amount))
        .await?;

    Ok(StatusCode::OK)
}
