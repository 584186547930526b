//! HTTP client for a Supabase project (PostgREST rows + GoTrue auth).

use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::backend::{AuthProvider, Backend};
use crate::error::{BackendError, Error, Result};
use crate::models::{Session, SignUp, User};
use crate::query::Query;

type BackendResult<T> = std::result::Result<T, BackendError>;

/// Client for one Supabase project.
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct RecoverRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct PasswordChange<'a> {
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .or_else(|| token.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        }
    }
}

/// Either error shape: PostgREST (`code`, `message`) or GoTrue
/// (`error_code`, `msg`, `error_description`, ...).
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SupabaseClient {
    /// Create a client for `base_url` using the project's anon key.
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self> {
        if base_url.trim().is_empty() || anon_key.trim().is_empty() {
            return Err(Error::Config(
                "Supabase URL and anon key must both be set".to_string(),
            ));
        }

        let mut base_url = Url::parse(base_url.trim())
            .map_err(|e| Error::Config(format!("Invalid Supabase URL {base_url}: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            anon_key: anon_key.trim().to_string(),
            access_token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    fn rest(&self, table: &str) -> BackendResult<Url> {
        self.endpoint(&format!("rest/v1/{table}"))
    }

    fn auth(&self, path: &str) -> BackendResult<Url> {
        self.endpoint(&format!("auth/v1/{path}"))
    }

    /// Attach the anon key and the best available bearer token.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }

    fn execute(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request.send().map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        let err = parse_error_body(status.as_u16(), &body);
        tracing::debug!(status = status.as_u16(), code = ?err.code(), "backend request failed");
        Err(err)
    }

    fn rows(response: Response) -> BackendResult<Vec<Value>> {
        response
            .json()
            .map_err(|e| BackendError::Transport(format!("invalid response body: {e}")))
    }
}

impl Backend for SupabaseClient {
    fn select(&self, table: &str, query: &Query) -> BackendResult<Vec<Value>> {
        let mut params = query.to_params();
        if query.columns.is_none() {
            params.insert(0, ("select".to_string(), "*".to_string()));
        }
        let request = self.authorize(self.http.get(self.rest(table)?).query(&params));
        Self::rows(self.execute(request)?)
    }

    fn insert(&self, table: &str, row: Value) -> BackendResult<Value> {
        let request = self.authorize(
            self.http
                .post(self.rest(table)?)
                .header("Prefer", "return=representation")
                .json(&row),
        );
        crate::backend::single(Self::rows(self.execute(request)?)?)
    }

    fn update(&self, table: &str, query: &Query, changes: Value) -> BackendResult<Vec<Value>> {
        let request = self.authorize(
            self.http
                .patch(self.rest(table)?)
                .query(&query.to_params())
                .header("Prefer", "return=representation")
                .json(&changes),
        );
        Self::rows(self.execute(request)?)
    }

    fn delete(&self, table: &str, query: &Query) -> BackendResult<()> {
        let request = self.authorize(
            self.http
                .delete(self.rest(table)?)
                .query(&query.to_params()),
        );
        self.execute(request)?;
        Ok(())
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }
}

impl AuthProvider for SupabaseClient {
    fn sign_in(&self, email: &str, password: &str) -> BackendResult<Session> {
        let request = self
            .http
            .post(self.auth("token")?)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&Credentials { email, password });

        let token: TokenResponse = self
            .execute(request)?
            .json()
            .map_err(|e| BackendError::Transport(format!("invalid token response: {e}")))?;
        Ok(token.into())
    }

    fn sign_up(&self, email: &str, password: &str) -> BackendResult<SignUp> {
        let request = self
            .http
            .post(self.auth("signup")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&Credentials { email, password });

        let body: Value = self
            .execute(request)?
            .json()
            .map_err(|e| BackendError::Transport(format!("invalid signup response: {e}")))?;
        parse_sign_up(body)
    }

    fn refresh(&self, refresh_token: &str) -> BackendResult<Session> {
        let request = self
            .http
            .post(self.auth("token")?)
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&RefreshRequest { refresh_token });

        let token: TokenResponse = self
            .execute(request)?
            .json()
            .map_err(|e| BackendError::Transport(format!("invalid token response: {e}")))?;
        Ok(token.into())
    }

    fn sign_out(&self, access_token: &str) -> BackendResult<()> {
        let request = self
            .http
            .post(self.auth("logout")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        self.execute(request)?;
        Ok(())
    }

    fn user(&self, access_token: &str) -> BackendResult<User> {
        let request = self
            .http
            .get(self.auth("user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);
        self.execute(request)?
            .json()
            .map_err(|e| BackendError::Transport(format!("invalid user response: {e}")))
    }

    fn recover(&self, email: &str) -> BackendResult<()> {
        let request = self
            .http
            .post(self.auth("recover")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&RecoverRequest { email });
        self.execute(request)?;
        Ok(())
    }

    fn update_password(&self, access_token: &str, password: &str) -> BackendResult<User> {
        let request = self
            .http
            .put(self.auth("user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(&PasswordChange { password });
        self.execute(request)?
            .json()
            .map_err(|e| BackendError::Transport(format!("invalid user response: {e}")))
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Transport(format!("timeout: {err}"))
    } else {
        BackendError::Transport(err.to_string())
    }
}

/// Signup answers with a session when auto-confirm is on, otherwise with
/// the bare user.
fn parse_sign_up(body: Value) -> BackendResult<SignUp> {
    let invalid = |e: serde_json::Error| BackendError::Transport(format!("invalid signup response: {e}"));

    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body).map_err(invalid)?;
        return Ok(SignUp::Session(token.into()));
    }

    let user = match body.get("user") {
        Some(user) => user.clone(),
        None => body,
    };
    let user: User = serde_json::from_value(user).map_err(invalid)?;
    Ok(SignUp::PendingConfirmation(user))
}

fn parse_error_body(status: u16, body: &str) -> BackendError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let code = parsed.error_code.or_else(|| match parsed.code {
        Some(Value::String(code)) => Some(code),
        _ => None,
    });

    let message = parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("request failed with status {status}")
            } else {
                body.trim().to_string()
            }
        });

    BackendError::Response {
        status: Some(status),
        code,
        message,
    }
}
