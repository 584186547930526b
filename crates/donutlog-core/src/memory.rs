//! In-process backend for tests and the offline demo.
//!
//! Rows live in memory as JSON objects. Only the constraints the services
//! rely on are enforced: generated ids and timestamps, unique group
//! membership, and credential checks. There is no row-level security.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::{AuthProvider, Backend};
use crate::error::BackendError;
use crate::models::{Session, SignUp, User};
use crate::query::{tables, Query};

type BackendResult<T> = std::result::Result<T, BackendError>;

const SESSION_LIFETIME_SECS: i64 = 3600;

/// Name to pass to [`MemoryBackend::set_unavailable`] to take the auth
/// endpoints down.
pub const AUTH: &str = "auth";

#[derive(Debug, Clone)]
struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    accounts: Vec<Account>,
    /// access token -> user id
    access_tokens: HashMap<String, String>,
    /// refresh token -> user id
    refresh_tokens: HashMap<String, String>,
    /// Addresses that asked for a password reset, oldest first.
    recoveries: Vec<String>,
    /// Tables answering 503.
    unavailable: HashSet<String>,
    session_lifetime: Option<i64>,
    offline: bool,
}

/// In-memory implementation of [`Backend`] and [`AuthProvider`].
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend pre-filled with a demo account, one family and a few
    /// tastings. Sign in with `demo@donutlog.test` / `donuts`.
    pub fn with_demo_data() -> Self {
        let backend = Self::new();
        let user = backend.add_account("demo@donutlog.test", "donuts");
        let cousin = backend.add_account("cousin@donutlog.test", "donuts");

        let group_id = Uuid::new_v4().to_string();
        backend.seed(
            tables::GROUPS,
            json!({
                "id": group_id,
                "name": "משפחת דמו",
                "join_code": "DMN234",
                "created_by": user.id,
            }),
        );
        backend.seed(
            tables::MEMBERS,
            json!({"group_id": group_id, "user_id": user.id, "role": "admin"}),
        );
        backend.seed(
            tables::MEMBERS,
            json!({"group_id": group_id, "user_id": cousin.id, "role": "member"}),
        );

        let now = Utc::now();
        let samples = [
            ("רולדין", "פיסטוק", Some("קרם פיסטוק"), 9, Some(16.0), "group", &user.id, 1),
            ("ביגה", "ריבה קלאסית", Some("ריבת תות"), 7, Some(8.5), "group", &cousin.id, 2),
            ("מאפיית השכונה", "דולצ'ה דה לצ'ה", None, 8, None, "private", &user.id, 5),
        ];
        for (place, donut, filling, rating, price, visibility, owner, days_ago) in samples {
            let group = (visibility == "group").then(|| group_id.clone());
            backend.seed(
                tables::ENTRIES,
                json!({
                    "date": (now - Duration::days(days_ago)).to_rfc3339(),
                    "place_name": place,
                    "donut_name": donut,
                    "filling": filling,
                    "rating": rating,
                    "price": price,
                    "notes": null,
                    "photo_url": null,
                    "visibility": visibility,
                    "created_by": owner,
                    "group_id": group,
                }),
            );
        }

        backend
    }

    /// Register an account directly, bypassing sign-up checks.
    pub fn add_account(&self, email: &str, password: &str) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        self.state.lock().accounts.push(Account {
            user: user.clone(),
            password: password.to_string(),
        });
        user
    }

    /// Insert a row without constraint checks.
    pub fn seed(&self, table: &str, row: Value) -> Value {
        let row = with_defaults(table, row);
        self.state
            .lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Number of rows currently stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.state.lock().tables.get(table).map_or(0, Vec::len)
    }

    /// Make every following call fail as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Seconds until newly issued sessions expire. Zero or less issues
    /// sessions that are already expired.
    pub fn set_session_lifetime(&self, secs: i64) {
        self.state.lock().session_lifetime = Some(secs);
    }

    /// Make one table (or [`AUTH`]) answer every request with
    /// `503 Service Unavailable`.
    pub fn set_unavailable(&self, table: &str, unavailable: bool) {
        let mut state = self.state.lock();
        if unavailable {
            state.unavailable.insert(table.to_string());
        } else {
            state.unavailable.remove(table);
        }
    }

    /// Emails passed to [`AuthProvider::recover`] so far.
    pub fn recovery_requests(&self) -> Vec<String> {
        self.state.lock().recoveries.clone()
    }

    fn check_table(state: &State, table: &str) -> BackendResult<()> {
        Self::check_online(state)?;
        if state.unavailable.contains(table) {
            return Err(BackendError::Response {
                status: Some(503),
                code: None,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn check_online(state: &State) -> BackendResult<()> {
        if state.offline {
            Err(BackendError::Transport("network unreachable".to_string()))
        } else {
            Ok(())
        }
    }

    fn issue_session(state: &mut State, user: User) -> Session {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        state
            .access_tokens
            .insert(access_token.clone(), user.id.clone());
        state
            .refresh_tokens
            .insert(refresh_token.clone(), user.id.clone());

        Session {
            access_token,
            refresh_token,
            expires_at: Some(
                Utc::now().timestamp() + state.session_lifetime.unwrap_or(SESSION_LIFETIME_SECS),
            ),
            user,
        }
    }

    fn account_by_id<'a>(state: &'a State, user_id: &str) -> Option<&'a Account> {
        state.accounts.iter().find(|a| a.user.id == user_id)
    }
}

fn with_defaults(table: &str, row: Value) -> Value {
    let Value::Object(mut map) = row else {
        return row;
    };
    if table != tables::MEMBERS && !map.contains_key("id") {
        map.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    }
    if !map.contains_key("created_at") {
        map.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
    }
    Value::Object(map)
}

fn is_duplicate_member(rows: &[Value], row: &Value) -> bool {
    rows.iter()
        .any(|r| r.get("group_id") == row.get("group_id") && r.get("user_id") == row.get("user_id"))
}

impl Backend for MemoryBackend {
    fn select(&self, table: &str, query: &Query) -> BackendResult<Vec<Value>> {
        let state = self.state.lock();
        Self::check_table(&state, table)?;

        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();

        rows.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows.iter().map(|r| query.project(r)).collect())
    }

    fn insert(&self, table: &str, row: Value) -> BackendResult<Value> {
        let mut state = self.state.lock();
        Self::check_table(&state, table)?;

        if !row.is_object() {
            return Err(BackendError::with_code(400, "PGRST102", "Invalid body"));
        }
        let row = with_defaults(table, row);
        let rows = state.tables.entry(table.to_string()).or_default();

        if table == tables::MEMBERS && is_duplicate_member(rows, &row) {
            return Err(BackendError::with_code(
                409,
                "23505",
                "duplicate key value violates unique constraint \"group_members_pkey\"",
            ));
        }

        rows.push(row.clone());
        Ok(row)
    }

    fn update(&self, table: &str, query: &Query, changes: Value) -> BackendResult<Vec<Value>> {
        let mut state = self.state.lock();
        Self::check_table(&state, table)?;

        let Value::Object(changes) = changes else {
            return Err(BackendError::with_code(400, "PGRST102", "Invalid body"));
        };

        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| query.matches(r)) {
                if let Value::Object(map) = row {
                    for (key, value) in &changes {
                        map.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    fn delete(&self, table: &str, query: &Query) -> BackendResult<()> {
        let mut state = self.state.lock();
        Self::check_table(&state, table)?;

        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|r| !query.matches(r));
        }
        Ok(())
    }
}

impl AuthProvider for MemoryBackend {
    fn sign_in(&self, email: &str, password: &str) -> BackendResult<Session> {
        let mut state = self.state.lock();
        Self::check_table(&state, AUTH)?;

        let user = state
            .accounts
            .iter()
            .find(|a| a.user.email.as_deref() == Some(email) && a.password == password)
            .map(|a| a.user.clone())
            .ok_or_else(|| {
                BackendError::with_code(400, "invalid_credentials", "Invalid login credentials")
            })?;

        Ok(Self::issue_session(&mut state, user))
    }

    fn sign_up(&self, email: &str, password: &str) -> BackendResult<SignUp> {
        let mut state = self.state.lock();
        Self::check_table(&state, AUTH)?;

        if password.chars().count() < 6 {
            return Err(BackendError::with_code(
                422,
                "weak_password",
                "Password should be at least 6 characters.",
            ));
        }
        if state
            .accounts
            .iter()
            .any(|a| a.user.email.as_deref() == Some(email))
        {
            return Err(BackendError::with_code(
                422,
                "user_already_exists",
                "User already registered",
            ));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
        };
        state.accounts.push(Account {
            user: user.clone(),
            password: password.to_string(),
        });
        Ok(SignUp::Session(Self::issue_session(&mut state, user)))
    }

    fn refresh(&self, refresh_token: &str) -> BackendResult<Session> {
        let mut state = self.state.lock();
        Self::check_table(&state, AUTH)?;

        let user_id = state.refresh_tokens.remove(refresh_token).ok_or_else(|| {
            BackendError::with_code(400, "refresh_token_not_found", "Invalid Refresh Token")
        })?;
        let user = Self::account_by_id(&state, &user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| BackendError::with_code(404, "user_not_found", "User not found"))?;

        Ok(Self::issue_session(&mut state, user))
    }

    fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        Self::check_table(&state, AUTH)?;

        if let Some(user_id) = state.access_tokens.remove(access_token) {
            state.refresh_tokens.retain(|_, owner| owner != &user_id);
        }
        Ok(())
    }

    fn user(&self, access_token: &str) -> BackendResult<User> {
        let state = self.state.lock();
        Self::check_table(&state, AUTH)?;

        state
            .access_tokens
            .get(access_token)
            .and_then(|user_id| Self::account_by_id(&state, user_id))
            .map(|a| a.user.clone())
            .ok_or_else(|| {
                BackendError::with_code(401, "bad_jwt", "invalid JWT: unable to parse or verify signature")
            })
    }

    fn recover(&self, email: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        Self::check_table(&state, AUTH)?;

        // Unknown addresses succeed too, so accounts cannot be probed.
        state.recoveries.push(email.to_string());
        Ok(())
    }

    fn update_password(&self, access_token: &str, password: &str) -> BackendResult<User> {
        let mut state = self.state.lock();
        Self::check_table(&state, AUTH)?;

        if password.chars().count() < 6 {
            return Err(BackendError::with_code(
                422,
                "weak_password",
                "Password should be at least 6 characters.",
            ));
        }
        let user_id = state.access_tokens.get(access_token).cloned().ok_or_else(|| {
            BackendError::with_code(401, "bad_jwt", "invalid JWT: unable to parse or verify signature")
        })?;
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.user.id == user_id)
            .ok_or_else(|| BackendError::with_code(404, "user_not_found", "User not found"))?;

        account.password = password.to_string();
        Ok(account.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_id_and_timestamp() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert(tables::GROUPS, json!({"name": "Levi", "join_code": "ABC234"}))
            .unwrap();
        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());
        assert_eq!(backend.row_count(tables::GROUPS), 1);
    }

    #[test]
    fn membership_is_unique() {
        let backend = MemoryBackend::new();
        let member = json!({"group_id": "g", "user_id": "u", "role": "member"});
        backend.insert(tables::MEMBERS, member.clone()).unwrap();
        let err = backend.insert(tables::MEMBERS, member).unwrap_err();
        assert_eq!(err.code(), Some("23505"));
    }

    #[test]
    fn select_filters_orders_and_limits() {
        let backend = MemoryBackend::new();
        for (date, owner) in [("2025-12-01", "a"), ("2025-12-03", "a"), ("2025-12-02", "b")] {
            backend.seed(tables::ENTRIES, json!({"date": date, "created_by": owner}));
        }

        let rows = backend
            .select(
                tables::ENTRIES,
                &Query::new().eq("created_by", "a").order("date", false).limit(1),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["date"], "2025-12-03");
    }

    #[test]
    fn update_and_delete_touch_matching_rows() {
        let backend = MemoryBackend::new();
        let row = backend.seed(tables::ENTRIES, json!({"rating": 3}));
        let id = row["id"].as_str().unwrap().to_string();

        let updated = backend
            .update(tables::ENTRIES, &Query::new().eq("id", &id), json!({"rating": 9}))
            .unwrap();
        assert_eq!(updated[0]["rating"], 9);

        backend
            .delete(tables::ENTRIES, &Query::new().eq("id", &id))
            .unwrap();
        assert_eq!(backend.row_count(tables::ENTRIES), 0);
    }

    #[test]
    fn auth_round_trip() {
        let backend = MemoryBackend::new();
        backend.add_account("a@b.co", "secret1");

        let err = backend.sign_in("a@b.co", "wrong").unwrap_err();
        assert_eq!(err.message(), "Invalid login credentials");

        let session = backend.sign_in("a@b.co", "secret1").unwrap();
        assert_eq!(backend.user(&session.access_token).unwrap(), session.user);

        let refreshed = backend.refresh(&session.refresh_token).unwrap();
        assert!(backend.refresh(&session.refresh_token).is_err());

        backend.sign_out(&refreshed.access_token).unwrap();
        assert!(backend.user(&refreshed.access_token).is_err());
    }

    #[test]
    fn offline_mode_fails_with_transport_error() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let err = backend.select(tables::GROUPS, &Query::new()).unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }

    #[test]
    fn unavailable_table_answers_503() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(tables::GROUPS, true);

        let err = backend.select(tables::GROUPS, &Query::new()).unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(backend.select(tables::ENTRIES, &Query::new()).is_ok());

        backend.set_unavailable(tables::GROUPS, false);
        assert!(backend.select(tables::GROUPS, &Query::new()).is_ok());
    }

    #[test]
    fn demo_data_is_consistent() {
        let backend = MemoryBackend::with_demo_data();
        assert_eq!(backend.row_count(tables::GROUPS), 1);
        assert_eq!(backend.row_count(tables::MEMBERS), 2);
        assert_eq!(backend.row_count(tables::ENTRIES), 3);
        assert!(backend.sign_in("demo@donutlog.test", "donuts").is_ok());
    }
}
