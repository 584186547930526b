//! Application errors and their Hebrew user-facing messages.
//!
//! Backend failures arrive as [`BackendError`] and are classified into an
//! [`Error`] kind by [`Error::from_backend`]. [`Error::user_message`] turns
//! any error into the text shown on screen.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

const FALLBACK_MESSAGE: &str = "אירעה שגיאה לא צפויה. נסי שוב";
const NETWORK_MESSAGE: &str = "בעיית תקשורת. נא לבדוק את החיבור לאינטרנט";
const TIMEOUT_MESSAGE: &str = "הפעולה לקחה יותר מדי זמן. נסי שוב";

/// A failure reported by the managed backend or by the transport to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend answered with an error body.
    #[error("{message}")]
    Response {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },
    /// The request never got an answer.
    #[error("network error: {0}")]
    Transport(String),
}

impl BackendError {
    /// Build a response error with a Postgres / PostgREST code.
    pub fn with_code(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self::Response {
            status: Some(status),
            code: Some(code.to_string()),
            message: message.into(),
        }
    }

    /// The error code, if the backend sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Response { code, .. } => code.as_deref(),
            Self::Transport(_) => None,
        }
    }

    /// The raw backend message.
    pub fn message(&self) -> &str {
        match self {
            Self::Response { message, .. } => message,
            Self::Transport(message) => message,
        }
    }

    /// HTTP status of the answer, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => *status,
            Self::Transport(_) => None,
        }
    }

    /// The backend looked at the request and refused it (4xx).
    ///
    /// Server failures and unanswered requests are not rejections; retrying
    /// them later may succeed.
    pub fn is_rejection(&self) -> bool {
        self.status().is_some_and(|status| (400..500).contains(&status))
    }
}

/// Application error kinds.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Authentication {
        message: String,
        source: Option<BackendError>,
    },

    #[error("{message}")]
    Permission {
        message: String,
        source: Option<BackendError>,
    },

    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
        source: Option<BackendError>,
    },

    #[error("{0}")]
    Network(String),

    #[error("{message}")]
    NotFound {
        message: String,
        source: Option<BackendError>,
    },

    #[error("{0}")]
    Backend(BackendError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Session storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// A validation failure authored by the application.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: Some(field.into()),
            message: message.into(),
            source: None,
        }
    }

    /// A missing resource, e.g. `Error::not_found("הרשומה")`.
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound {
            message: format!("{resource} לא נמצא"),
            source: None,
        }
    }

    /// Classify a backend failure.
    pub fn from_backend(err: BackendError) -> Self {
        let (code, message) = match &err {
            BackendError::Transport(message) => return Self::Network(message.clone()),
            BackendError::Response { code, message, .. } => (code.clone(), message.clone()),
        };

        match code.as_deref() {
            Some("PGRST301") => Self::Authentication {
                message,
                source: Some(err),
            },
            _ if message.contains("auth") => Self::Authentication {
                message,
                source: Some(err),
            },
            Some("42501") => Self::Permission {
                message,
                source: Some(err),
            },
            _ if message.contains("permission") => Self::Permission {
                message,
                source: Some(err),
            },
            Some("PGRST116") => Self::NotFound {
                message: "הרשומה לא נמצא".to_string(),
                source: Some(err),
            },
            Some(c) if c.starts_with("23") => Self::Validation {
                field: None,
                message,
                source: Some(err),
            },
            _ => Self::Backend(err),
        }
    }

    /// The backend code behind this error, if any.
    pub fn code(&self) -> Option<&str> {
        self.backend_error().and_then(BackendError::code)
    }

    /// The backend failure behind this error, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Authentication { source, .. }
            | Self::Permission { source, .. }
            | Self::Validation { source, .. }
            | Self::NotFound { source, .. } => source.as_ref(),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the backend refused the request outright (see
    /// [`BackendError::is_rejection`]).
    pub fn is_rejection(&self) -> bool {
        self.backend_error().is_some_and(BackendError::is_rejection)
    }

    /// The field a validation error refers to.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Text to show the user, in Hebrew where the failure is recognised.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation {
                message,
                source: None,
                ..
            }
            | Self::NotFound {
                message,
                source: None,
            } => message.clone(),
            Self::NotFound { message, .. } => message.clone(),
            Self::Network(message) => {
                let lower = message.to_lowercase();
                if lower.contains("timeout") || lower.contains("timed out") {
                    TIMEOUT_MESSAGE.to_string()
                } else {
                    NETWORK_MESSAGE.to_string()
                }
            }
            other => friendly_message(&other.to_string()),
        }
    }

    /// Log the error with some context and return the user-facing message.
    pub fn handle(&self, context: &str) -> String {
        let message = self.user_message();
        tracing::error!(
            context,
            code = self.code().unwrap_or("-"),
            error = %self,
            user_message = %message,
            "operation failed"
        );
        message
    }

    pub fn is_network(&self) -> bool {
        if matches!(self, Self::Network(_)) {
            return true;
        }
        let lower = self.to_string().to_lowercase();
        lower.contains("network") || lower.contains("fetch")
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
            || self.to_string().to_lowercase().contains("auth")
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Self::from_backend(err)
    }
}

/// Map a technical message to a Hebrew one.
///
/// Unrecognised messages are returned unchanged; an empty message becomes
/// the generic fallback.
pub fn friendly_message(message: &str) -> String {
    let lower = message.to_lowercase();

    let known = [
        ("invalid login credentials", "אימייל או סיסמה שגויים"),
        ("email not confirmed", "נא לאמת את כתובת האימייל שלך"),
        ("user already registered", "המשתמש כבר רשום במערכת"),
        ("password", "הסיסמה חייבת להכיל לפחות 6 תווים"),
        ("duplicate key", "הרשומה כבר קיימת במערכת"),
        ("foreign key", "לא ניתן למחוק - קיימים קשרים למידע זה"),
        ("row level security", "אין לך הרשאה לבצע פעולה זו"),
        ("permission denied", "אין לך הרשאה לבצע פעולה זו"),
        ("network", NETWORK_MESSAGE),
        ("fetch", NETWORK_MESSAGE),
        ("timeout", TIMEOUT_MESSAGE),
        ("required", "נא למלא את כל השדות הנדרשים"),
        ("invalid email", "כתובת האימייל אינה תקינה"),
    ];

    for (needle, hebrew) in known {
        if lower.contains(needle) {
            return hebrew.to_string();
        }
    }

    if message.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_backend_codes() {
        let err = Error::from_backend(BackendError::with_code(401, "PGRST301", "JWT expired"));
        assert!(matches!(err, Error::Authentication { .. }));

        let err = Error::from_backend(BackendError::with_code(403, "42501", "denied"));
        assert!(matches!(err, Error::Permission { .. }));

        let err = Error::from_backend(BackendError::with_code(406, "PGRST116", "no rows"));
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(err.user_message(), "הרשומה לא נמצא");

        let err = Error::from_backend(BackendError::with_code(
            409,
            "23505",
            "duplicate key value violates unique constraint",
        ));
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.code(), Some("23505"));
        assert_eq!(err.user_message(), "הרשומה כבר קיימת במערכת");

        let err = Error::from_backend(BackendError::with_code(500, "XX000", "boom"));
        assert!(matches!(err, Error::Backend(_)));
        assert_eq!(err.user_message(), "boom");
    }

    #[test]
    fn transport_failures_are_network_errors() {
        let err = Error::from(BackendError::Transport("connection refused".into()));
        assert!(err.is_network());
        assert_eq!(err.user_message(), NETWORK_MESSAGE);

        let err = Error::from(BackendError::Transport("operation timed out".into()));
        assert_eq!(err.user_message(), TIMEOUT_MESSAGE);
    }

    #[test]
    fn translates_auth_messages() {
        let err = Error::from(BackendError::with_code(
            400,
            "invalid_credentials",
            "Invalid login credentials",
        ));
        assert_eq!(err.user_message(), "אימייל או סיסמה שגויים");

        let err = Error::from(BackendError::with_code(
            422,
            "user_already_exists",
            "User already registered",
        ));
        assert_eq!(err.user_message(), "המשתמש כבר רשום במערכת");
    }

    #[test]
    fn application_messages_pass_through() {
        let err = Error::validation("password", "password too short");
        assert_eq!(err.user_message(), "password too short");
        assert_eq!(err.field(), Some("password"));

        assert_eq!(Error::not_found("הקבוצה").user_message(), "הקבוצה לא נמצא");
    }

    #[test]
    fn friendly_message_falls_back() {
        assert_eq!(friendly_message(""), FALLBACK_MESSAGE);
        assert_eq!(friendly_message("something odd"), "something odd");
        assert_eq!(
            friendly_message("new row violates row level security policy"),
            "אין לך הרשאה לבצע פעולה זו"
        );
    }

    #[test]
    fn only_client_errors_are_rejections() {
        let rejected = BackendError::with_code(400, "refresh_token_not_found", "Invalid Refresh Token");
        assert_eq!(rejected.status(), Some(400));
        assert!(rejected.is_rejection());
        assert!(Error::from(rejected).is_rejection());

        let unavailable = BackendError::with_code(503, "", "Service Unavailable");
        assert!(!unavailable.is_rejection());
        assert!(!Error::from(unavailable).is_rejection());

        let unknown = BackendError::Response {
            status: None,
            code: None,
            message: "?".into(),
        };
        assert!(!unknown.is_rejection());
        assert!(!BackendError::Transport("down".into()).is_rejection());
        assert!(!Error::validation("email", "x").is_rejection());
    }

    #[test]
    fn auth_predicate_checks_message() {
        let err = Error::Backend(BackendError::with_code(401, "x", "bad auth header"));
        assert!(err.is_auth());
        assert!(!err.is_network());
    }
}
