//! Uniform result envelopes
//!
//! Every operation can be reported as a flat `{code, message[, data]}`
//! document. Code `200` means success with an empty message; code `402`
//! means failure, the message is the error's `Display` and `data` holds the
//! zero value of the expected type.

use crate::{error::Error, key::EntityKind};
use serde::{Deserialize, Serialize};

/// Success code
pub const CODE_OK: u16 = 200;

/// Failure code
pub const CODE_FAILED: u16 = 402;

/// Outcome of a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpResult {
    /// `200` or `402`
    pub code: u16,
    /// Empty on success, error text on failure
    #[serde(rename = "msg")]
    pub message: String,
}

impl OpResult {
    /// Successful mutation
    pub fn ok() -> Self {
        Self {
            code: CODE_OK,
            message: String::new(),
        }
    }

    /// Failed mutation
    pub fn failed(err: &Error) -> Self {
        Self {
            code: CODE_FAILED,
            message: err.to_string(),
        }
    }

    /// Whether the code is `200`
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

impl<T> From<crate::Result<T>> for OpResult {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(_) => OpResult::ok(),
            Err(err) => OpResult::failed(&err),
        }
    }
}

/// Outcome of a read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    /// `200` or `402`
    pub code: u16,
    /// Empty on success, error text on failure
    #[serde(rename = "msg")]
    pub message: String,
    /// Record read, or its zero value on failure
    pub data: T,
}

impl<T: Default> QueryResult<T> {
    /// Successful read
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_OK,
            message: String::new(),
            data,
        }
    }

    /// Failed read carrying the zero value
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: CODE_FAILED,
            message: message.into(),
            data: T::default(),
        }
    }

    /// Whether the code is `200`
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }
}

impl<T: Default> From<crate::Result<T>> for QueryResult<T> {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(data) => QueryResult::ok(data),
            Err(err) => QueryResult::failed(err.to_string()),
        }
    }
}

impl<T: Default> QueryResult<Vec<T>> {
    /// Envelope for a list query over `kind`
    ///
    /// Failures, including an empty kind (`no <kind>`), carry a one-element
    /// list holding the zero value.
    pub fn list(kind: EntityKind, result: crate::Result<Vec<T>>) -> Self {
        match result {
            Ok(items) if items.is_empty() => Self::list_failed(format!("no {}", kind)),
            Ok(items) => Self::ok(items),
            Err(err) => Self::list_failed(err.to_string()),
        }
    }

    fn list_failed(message: String) -> Self {
        Self {
            code: CODE_FAILED,
            message,
            data: vec![T::default()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vehicle;

    #[test]
    fn test_op_result_codes() {
        let ok: OpResult = Ok::<(), Error>(()).into();
        assert_eq!(ok, OpResult { code: 200, message: String::new() });

        let failed: OpResult = Err::<(), _>(Error::AlreadyExists {
            kind: EntityKind::Vehicle,
            id: "1".to_string(),
        })
        .into();
        assert_eq!(failed.code, 402);
        assert_eq!(failed.message, "the vehicle 1 already exists");
    }

    #[test]
    fn test_query_failure_carries_zero_value() {
        let result: QueryResult<Vehicle> = Err(Error::NotFound {
            kind: EntityKind::Vehicle,
            id: "9".to_string(),
        })
        .into();
        assert!(!result.is_ok());
        assert_eq!(result.data, Vehicle::default());
    }

    #[test]
    fn test_empty_list_is_failure_with_placeholder() {
        let result = QueryResult::<Vec<Vehicle>>::list(EntityKind::Vehicle, Ok(Vec::new()));
        assert_eq!(result.code, 402);
        assert_eq!(result.message, "no vehicle");
        assert_eq!(result.data, vec![Vehicle::default()]);
    }

    #[test]
    fn test_list_success() {
        let vehicles = vec![Vehicle { id: 1, carriage_count: 3, active: true }];
        let result = QueryResult::list(EntityKind::Vehicle, Ok(vehicles.clone()));
        assert!(result.is_ok());
        assert_eq!(result.data, vehicles);
    }

    #[test]
    fn test_envelope_json_shape() {
        let json = serde_json::to_value(OpResult::ok()).unwrap();
        assert_eq!(json, serde_json::json!({"code": 200, "msg": ""}));
    }
}
