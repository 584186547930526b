//! Application services over the backend seams.

mod auth;
mod entries;
mod groups;

use std::sync::Arc;

pub use auth::AuthService;
pub use entries::{EntryService, DEFAULT_FEED_LIMIT};
pub use groups::{GroupService, ALREADY_MEMBER_MESSAGE, JOIN_CODE_NOT_FOUND_MESSAGE};

use crate::backend::{AuthProvider, Backend};
use crate::session::SessionStore;

/// Every service, wired to one backend.
pub struct Services {
    pub entries: EntryService,
    pub groups: GroupService,
    pub auth: AuthService,
}

impl Services {
    /// Build the services over a backend that stores rows and authenticates.
    ///
    /// With a `store`, sign-in persists the session so [`AuthService::restore`]
    /// can pick it up on the next run.
    pub fn new<B>(backend: Arc<B>, store: Option<SessionStore>) -> Self
    where
        B: Backend + AuthProvider + 'static,
    {
        let rows: Arc<dyn Backend> = backend.clone();
        let provider: Arc<dyn AuthProvider> = backend;

        Self {
            entries: EntryService::new(rows.clone()),
            groups: GroupService::new(rows.clone()),
            auth: AuthService::new(provider, rows, store),
        }
    }
}
