//! Accounts API endpoints.

use api_types::account::AccountView;
use axum::{Extension, Json, extract::State};

use crate::{ServerError, server::Caller, server::ServerState};

/// Balance of the caller's own account.
pub async fn me(
    Extension(caller): Extension<Caller>,
    State(state): State<ServerState>,
) -> Result<Json<AccountView>, ServerError> {
    let account = state.engine.account(caller.user_id).await?;
    Ok(Json(AccountView {
        user_id: account.user_id,
        balance: account.balance,
        initial_balance: account.initial_balance,
    }))
}
