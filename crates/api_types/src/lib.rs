use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod transfer {
    use super::*;

    /// Body of `POST /api/v1/transfers`.
    ///
    /// The sender is the verified caller and is never part of the body.
    /// Fields are optional so that a missing one is reported as a field error
    /// instead of a decoding failure.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransferNew {
        pub recipient_id: Option<i64>,
        /// Accepted as a JSON string (`"10.50"`) or number.
        pub amount: Option<Decimal>,
    }
}

pub mod account {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "camelCase")]
    pub struct AccountView {
        pub user_id: i64,
        pub balance: Decimal,
        pub initial_balance: Decimal,
    }
}

pub mod error {
    use std::collections::BTreeMap;

    use super::*;

    /// Body of every non-2xx response.
    #[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ErrorBody {
        pub error: String,
        /// Field name to problem, for rejected request bodies.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        pub fields: BTreeMap<String, String>,
        /// Set when the same request may succeed if sent again.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        pub retryable: bool,
    }

    impl ErrorBody {
        pub fn new(error: impl Into<String>) -> Self {
            Self {
                error: error.into(),
                ..Self::default()
            }
        }
    }
}
