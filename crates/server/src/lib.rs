use std::collections::BTreeMap;

use api_types::error::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

pub use server::{Caller, ServerState, router, run_with_listener};

mod accounts;
mod server;
mod transfers;
mod validation;

pub mod types {
    pub mod transfer {
        pub use api_types::transfer::TransferNew;
    }

    pub mod account {
        pub use api_types::account::AccountView;
    }

    pub mod error {
        pub use api_types::error::ErrorBody;
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    /// Field name to problem.
    Validation(BTreeMap<String, String>),
    Unauthenticated,
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidParameters(_) | EngineError::Overflow(_) => StatusCode::BAD_REQUEST,
        EngineError::SenderNotFound(_)
        | EngineError::RecipientNotFound(_)
        | EngineError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InsufficientFunds(_)
        | EngineError::RecipientCapExceeded(_)
        | EngineError::LockAcquisitionFailed(_) => StatusCode::FORBIDDEN,
        EngineError::ConcurrencyConflict(_)
        | EngineError::ExistingKey(_)
        | EngineError::AccrualInProgress => StatusCode::CONFLICT,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn body_for_engine_error(err: EngineError) -> ErrorBody {
    let retryable = err.is_retryable();
    let error = match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    };
    ErrorBody {
        error,
        retryable,
        ..ErrorBody::default()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), body_for_engine_error(err)),
            ServerError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "invalid parameters".to_string(),
                    fields,
                    ..ErrorBody::default()
                },
            ),
            ServerError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, ErrorBody::new("unauthenticated"))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, ErrorBody::new(err)),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: EngineError) -> StatusCode {
        ServerError::from(err).into_response().status()
    }

    #[test]
    fn invalid_parameters_map_to_400() {
        assert_eq!(
            status_of(EngineError::InvalidParameters("x".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn business_rejections_map_to_403() {
        assert_eq!(
            status_of(EngineError::InsufficientFunds("x".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(EngineError::RecipientCapExceeded("x".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(EngineError::LockAcquisitionFailed("account_lock:1".to_string())),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn missing_parties_map_to_404() {
        assert_eq!(
            status_of(EngineError::RecipientNotFound(2)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(EngineError::SenderNotFound(1)), StatusCode::NOT_FOUND);
    }

    #[test]
    fn concurrency_conflict_maps_to_409() {
        assert_eq!(
            status_of(EngineError::ConcurrencyConflict("database is locked".to_string())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn database_error_maps_to_500() {
        assert_eq!(
            status_of(EngineError::Database(sea_orm::DbErr::Custom(
                "boom".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthenticated_maps_to_401() {
        let res = ServerError::Unauthenticated.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn validation_maps_to_400() {
        let fields = BTreeMap::from([("amount".to_string(), "required".to_string())]);
        let res = ServerError::Validation(fields).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn retryable_flag_follows_engine() {
        let body = body_for_engine_error(EngineError::ConcurrencyConflict("x".to_string()));
        assert!(body.retryable);
        let body = body_for_engine_error(EngineError::InsufficientFunds("x".to_string()));
        assert!(!body.retryable);
    }
}
