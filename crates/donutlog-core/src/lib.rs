//! Core models, services and backend clients for donutlog.
//!
//! The services talk to a managed backend through the [`Backend`] and
//! [`AuthProvider`] traits. [`SupabaseClient`] implements them over HTTP;
//! [`MemoryBackend`] keeps everything in process for tests and the demo.

pub mod backend;
pub mod error;
pub mod format;
pub mod join_code;
pub mod memory;
pub mod models;
pub mod query;
pub mod services;
pub mod session;
pub mod supabase;
pub mod validation;

pub use backend::{AuthProvider, Backend};
pub use error::{BackendError, Error, Result};
pub use memory::MemoryBackend;
pub use models::{
    Entry, EntryDraft, FeedScope, Group, Membership, Role, Session, SignUp, User, Visibility,
};
pub use services::{AuthService, EntryService, GroupService, Services};
pub use session::SessionStore;
pub use supabase::SupabaseClient;
