use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
    typed_header::TypedHeaderRejection,
};

use std::sync::Arc;

use crate::{ServerError, accounts, transfers};
use engine::Engine;

static VERIFIED_USER_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("x-verified-user-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// Identity of the authenticated caller, inserted by the auth middleware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
}

/// `TypedHeader` for the verified caller identity
///
/// Tokens are verified upstream; requests reach the server with the numeric
/// user id in the "x-verified-user-id" header.
#[derive(Debug)]
struct VerifiedUserHeader(i64);

impl Header for VerifiedUserHeader {
    fn name() -> &'static axum::http::HeaderName {
        &VERIFIED_USER_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let Ok(value) = value.trim().parse::<i64>() else {
            return Err(AxumError::invalid());
        };
        if value <= 0 {
            return Err(AxumError::invalid());
        }

        Ok(VerifiedUserHeader(value))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        values.extend(std::iter::once(axum::http::HeaderValue::from(self.0)));
    }
}

async fn auth(
    verified: Result<TypedHeader<VerifiedUserHeader>, TypedHeaderRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let TypedHeader(VerifiedUserHeader(user_id)) = verified.map_err(|rejection| {
        tracing::warn!("rejected unauthenticated request: {rejection}");
        ServerError::Unauthenticated
    })?;

    request.extensions_mut().insert(Caller { user_id });
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/v1/transfers", post(transfers::transfer_new))
        .route("/api/v1/accounts/me", get(accounts::me))
        .route_layer(middleware::from_fn(auth))
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Arc<Engine>,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState { engine };

    axum::serve(listener, router(state)).await
}
