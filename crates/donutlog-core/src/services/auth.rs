use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::backend::{AuthProvider, Backend};
use crate::error::{Error, Result};
use crate::models::{Session, SignUp, User};
use crate::session::SessionStore;
use crate::validation;

const NOT_SIGNED_IN_MESSAGE: &str = "נא להתחבר כדי להמשיך";

/// Sign-in state for the running app.
///
/// Holds the current [`Session`], hands its access token to the row
/// backend, and mirrors it into the [`SessionStore`] when one is set.
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    backend: Arc<dyn Backend>,
    store: Option<SessionStore>,
    session: RwLock<Option<Session>>,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        backend: Arc<dyn Backend>,
        store: Option<SessionStore>,
    ) -> Self {
        Self {
            provider,
            backend,
            store,
            session: RwLock::new(None),
        }
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        validation::email(email)?;
        validation::password(password)?;

        let session = self.provider.sign_in(email.trim(), password)?;
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.establish(session.clone());
        Ok(session)
    }

    /// Register an account. Signs in right away unless the backend asks
    /// for email confirmation first.
    pub fn sign_up(&self, email: &str, password: &str) -> Result<SignUp> {
        validation::email(email)?;
        validation::password(password)?;

        let outcome = self.provider.sign_up(email.trim(), password)?;
        match &outcome {
            SignUp::Session(session) => {
                tracing::info!(user_id = %session.user.id, "Signed up");
                self.establish(session.clone());
            }
            SignUp::PendingConfirmation(user) => {
                tracing::info!(user_id = %user.id, "Signed up, awaiting email confirmation");
            }
        }
        Ok(outcome)
    }

    /// Forget the session locally, then revoke it on the backend.
    pub fn sign_out(&self) -> Result<()> {
        let session = self.session.write().take();
        self.backend.set_access_token(None);
        self.forget_stored();

        if let Some(session) = session {
            self.provider.sign_out(&session.access_token)?;
            tracing::info!(user_id = %session.user.id, "Signed out");
        }
        Ok(())
    }

    /// Email a password-reset link. Unknown addresses are not reported.
    pub fn reset_password(&self, email: &str) -> Result<()> {
        validation::email(email)?;
        self.provider.recover(email.trim())?;
        tracing::info!("Requested password reset");
        Ok(())
    }

    /// Change the signed-in user's password.
    pub fn update_password(&self, new_password: &str) -> Result<User> {
        validation::password(new_password)?;
        let access_token = self
            .session
            .read()
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or_else(not_signed_in)?;

        let user = self.provider.update_password(&access_token, new_password)?;
        tracing::info!(user_id = %user.id, "Updated password");
        Ok(user)
    }

    /// Exchange the refresh token for a new session.
    pub fn refresh(&self) -> Result<Session> {
        let refresh_token = self
            .session
            .read()
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or_else(not_signed_in)?;

        let session = self.provider.refresh(&refresh_token)?;
        tracing::debug!(user_id = %session.user.id, "Refreshed session");
        self.establish(session.clone());
        Ok(session)
    }

    /// Refresh the session if its access token has expired.
    pub fn ensure_fresh(&self) -> Result<()> {
        let expired = self
            .session
            .read()
            .as_ref()
            .is_some_and(|s| s.is_expired(Utc::now()));
        if expired {
            self.refresh()?;
        }
        Ok(())
    }

    /// Pick up the session saved by a previous run.
    ///
    /// An expired session is refreshed. If the backend rejects the refresh
    /// token (4xx) the saved session is dropped and the user has to sign in
    /// again; any other failure is returned and the file is kept.
    pub fn restore(&self) -> Result<Option<Session>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(saved) = store.load()? else {
            return Ok(None);
        };

        if !saved.is_expired(Utc::now()) {
            tracing::info!(user_id = %saved.user.id, "Restored session");
            self.establish(saved.clone());
            return Ok(Some(saved));
        }

        match self.provider.refresh(&saved.refresh_token) {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, "Restored and refreshed session");
                self.establish(session.clone());
                Ok(Some(session))
            }
            Err(err) if err.is_rejection() => {
                tracing::warn!("Saved session could not be refreshed: {}", err);
                store.clear()?;
                Ok(None)
            }
            // Keep the file: the server may just be unavailable.
            Err(err) => Err(err.into()),
        }
    }

    /// Ask the backend who the current access token belongs to.
    pub fn current_user(&self) -> Result<Option<User>> {
        let Some(access_token) = self.session.read().as_ref().map(|s| s.access_token.clone())
        else {
            return Ok(None);
        };
        Ok(Some(self.provider.user(&access_token)?))
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.user.id.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.read().is_some()
    }

    fn establish(&self, session: Session) {
        self.backend
            .set_access_token(Some(session.access_token.clone()));
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&session) {
                tracing::warn!("Failed to persist session: {}", e);
            }
        }
        *self.session.write() = Some(session);
    }

    fn forget_stored(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                tracing::warn!("Failed to remove saved session: {}", e);
            }
        }
    }
}

fn not_signed_in() -> Error {
    Error::Authentication {
        message: NOT_SIGNED_IN_MESSAGE.to_string(),
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::memory::MemoryBackend;

    fn service(backend: Arc<MemoryBackend>, store: Option<SessionStore>) -> AuthService {
        AuthService::new(backend.clone(), backend, store)
    }

    #[test]
    fn shape_is_checked_before_the_request() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_offline(true);
        let auth = service(backend, None);

        assert_eq!(auth.sign_in("nope", "secret1").unwrap_err().field(), Some("email"));
        assert_eq!(auth.sign_up("a@b.co", "123").unwrap_err().field(), Some("password"));
    }

    #[test]
    fn refresh_requires_a_session() {
        let auth = service(Arc::new(MemoryBackend::new()), None);
        assert!(auth.refresh().unwrap_err().is_auth());
        assert_eq!(auth.current_user().unwrap(), None);
    }

    #[test]
    fn sign_out_clears_local_state() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("a@b.co", "secret1");
        let auth = service(backend, None);

        auth.sign_in("a@b.co", "secret1").unwrap();
        assert!(auth.is_signed_in());
        auth.sign_out().unwrap();
        assert!(!auth.is_signed_in());
        assert_eq!(auth.user_id(), None);
    }

    /// Answers every refresh with a fixed HTTP status.
    struct RefreshFails {
        status: u16,
    }

    impl AuthProvider for RefreshFails {
        fn sign_in(&self, _: &str, _: &str) -> std::result::Result<Session, BackendError> {
            Err(BackendError::Transport("unused".into()))
        }
        fn sign_up(&self, _: &str, _: &str) -> std::result::Result<SignUp, BackendError> {
            Err(BackendError::Transport("unused".into()))
        }
        fn refresh(&self, _: &str) -> std::result::Result<Session, BackendError> {
            Err(BackendError::Response {
                status: Some(self.status),
                code: None,
                message: "refresh failed".into(),
            })
        }
        fn sign_out(&self, _: &str) -> std::result::Result<(), BackendError> {
            Ok(())
        }
        fn user(&self, _: &str) -> std::result::Result<User, BackendError> {
            Err(BackendError::Transport("unused".into()))
        }
        fn recover(&self, _: &str) -> std::result::Result<(), BackendError> {
            Ok(())
        }
        fn update_password(&self, _: &str, _: &str) -> std::result::Result<User, BackendError> {
            Err(BackendError::Transport("unused".into()))
        }
    }

    fn expired_session_on_disk(dir: &tempfile::TempDir) -> SessionStore {
        let store = SessionStore::new(dir.path().join("session.json"));
        store
            .save(&Session {
                access_token: "old-access".into(),
                refresh_token: "old-refresh".into(),
                expires_at: Some(1),
                user: User {
                    id: "u1".into(),
                    email: None,
                },
            })
            .unwrap();
        store
    }

    fn with_provider(status: u16, store: SessionStore) -> AuthService {
        AuthService::new(
            Arc::new(RefreshFails { status }),
            Arc::new(MemoryBackend::new()),
            Some(store),
        )
    }

    #[test]
    fn server_error_during_restore_keeps_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = expired_session_on_disk(&dir);
        let auth = with_provider(503, store.clone());

        let err = auth.restore().unwrap_err();
        assert!(!err.is_rejection());
        assert!(!auth.is_signed_in());
        assert!(store.path().exists());
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn rejected_refresh_during_restore_drops_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = expired_session_on_disk(&dir);
        let auth = with_provider(400, store.clone());

        assert_eq!(auth.restore().unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn reset_password_checks_email_first() {
        let backend = Arc::new(MemoryBackend::new());
        let auth = service(backend.clone(), None);

        assert_eq!(auth.reset_password("not-an-email").unwrap_err().field(), Some("email"));
        assert!(backend.recovery_requests().is_empty());

        auth.reset_password(" a@b.co ").unwrap();
        assert_eq!(backend.recovery_requests(), vec!["a@b.co".to_string()]);
    }

    #[test]
    fn update_password_needs_session_and_valid_password() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("a@b.co", "secret1");
        let auth = service(backend.clone(), None);

        assert!(auth.update_password("secret2").unwrap_err().is_auth());

        auth.sign_in("a@b.co", "secret1").unwrap();
        assert_eq!(auth.update_password("123").unwrap_err().field(), Some("password"));

        let user = auth.update_password("secret2").unwrap();
        assert_eq!(user.email.as_deref(), Some("a@b.co"));
        assert!(backend.sign_in("a@b.co", "secret1").is_err());
        assert!(backend.sign_in("a@b.co", "secret2").is_ok());
    }
}
