//! The seam between the services and the managed backend.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{BackendError, Result};
use crate::models::{Session, SignUp, User};
use crate::query::Query;

/// Row storage: one call per round-trip.
pub trait Backend: Send + Sync {
    fn select(&self, table: &str, query: &Query) -> std::result::Result<Vec<Value>, BackendError>;

    /// Insert one row and return it as stored.
    fn insert(&self, table: &str, row: Value) -> std::result::Result<Value, BackendError>;

    /// Apply `changes` to every matching row and return the updated rows.
    fn update(
        &self,
        table: &str,
        query: &Query,
        changes: Value,
    ) -> std::result::Result<Vec<Value>, BackendError>;

    fn delete(&self, table: &str, query: &Query) -> std::result::Result<(), BackendError>;

    /// Act on behalf of a signed-in user (or anonymously with `None`).
    fn set_access_token(&self, _token: Option<String>) {}
}

/// Authentication provider.
pub trait AuthProvider: Send + Sync {
    fn sign_in(&self, email: &str, password: &str) -> std::result::Result<Session, BackendError>;
    fn sign_up(&self, email: &str, password: &str) -> std::result::Result<SignUp, BackendError>;
    fn refresh(&self, refresh_token: &str) -> std::result::Result<Session, BackendError>;
    fn sign_out(&self, access_token: &str) -> std::result::Result<(), BackendError>;
    fn user(&self, access_token: &str) -> std::result::Result<User, BackendError>;

    /// Send a password-reset email to `email`.
    fn recover(&self, email: &str) -> std::result::Result<(), BackendError>;

    /// Set a new password for the user behind `access_token`.
    fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> std::result::Result<User, BackendError>;
}

/// Zero rows is `None`, one row is `Some`, more is an error.
pub fn maybe_single(rows: Vec<Value>) -> std::result::Result<Option<Value>, BackendError> {
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (None, _) => Ok(None),
        (Some(row), None) => Ok(Some(row)),
        (Some(_), Some(_)) => Err(BackendError::with_code(
            406,
            "PGRST116",
            "JSON object requested, multiple (or no) rows returned",
        )),
    }
}

/// Exactly one row.
pub fn single(rows: Vec<Value>) -> std::result::Result<Value, BackendError> {
    maybe_single(rows)?.ok_or_else(|| {
        BackendError::with_code(
            406,
            "PGRST116",
            "JSON object requested, multiple (or no) rows returned",
        )
    })
}

/// Deserialize a row into a model.
pub fn decode<T: DeserializeOwned>(row: Value) -> Result<T> {
    Ok(serde_json::from_value(row)?)
}

/// Deserialize every row.
pub fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter().map(decode).collect()
}
