//! Shared data types for the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who can see an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only the owner.
    #[default]
    Private,
    /// Every member of the entry's group.
    Group,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }

    /// Badge text shown on feed cards.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Private => "פרטי",
            Self::Group => "משותף",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Private => Self::Group,
            Self::Group => Self::Private,
        }
    }
}

/// One donut tasting, as stored in `donut_entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub date: String,
    pub place_name: String,
    pub donut_name: String,
    #[serde(default)]
    pub filling: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    pub created_by: String,
    #[serde(default)]
    pub group_id: Option<String>,
}

/// The user-editable part of an entry.
///
/// Sent as-is for updates; wrapped in [`NewEntry`] for inserts. Empty
/// optional fields serialize as `null` so an edit can clear them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub date: String,
    pub place_name: String,
    pub donut_name: String,
    pub filling: Option<String>,
    pub rating: u8,
    pub price: Option<f64>,
    pub notes: Option<String>,
    pub photo_url: Option<String>,
    pub visibility: Visibility,
    pub group_id: Option<String>,
}

impl Default for EntryDraft {
    fn default() -> Self {
        Self {
            date: Utc::now().to_rfc3339(),
            place_name: String::new(),
            donut_name: String::new(),
            filling: None,
            rating: 8,
            price: None,
            notes: None,
            photo_url: None,
            visibility: Visibility::Private,
            group_id: None,
        }
    }
}

impl From<&Entry> for EntryDraft {
    fn from(entry: &Entry) -> Self {
        Self {
            date: entry.date.clone(),
            place_name: entry.place_name.clone(),
            donut_name: entry.donut_name.clone(),
            filling: entry.filling.clone(),
            rating: entry.rating,
            price: entry.price,
            notes: entry.notes.clone(),
            photo_url: entry.photo_url.clone(),
            visibility: entry.visibility,
            group_id: entry.group_id.clone(),
        }
    }
}

/// Insert payload for `donut_entries`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEntry {
    #[serde(flatten)]
    pub draft: EntryDraft,
    pub created_by: String,
}

/// Which entries the feed shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    /// Everything the user created.
    Mine,
    /// Shared entries of the active family, if one is selected.
    Family(Option<String>),
}

/// A family group, as stored in `groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub join_code: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Insert payload for `groups`.
#[derive(Debug, Clone, Serialize)]
pub struct NewGroup<'a> {
    pub name: &'a str,
    pub created_by: &'a str,
    pub join_code: &'a str,
}

/// Membership role inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

/// A row of `group_members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: String,
    pub user_id: String,
    pub role: Role,
}

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An auth session issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) after which the access token is invalid.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Whether the access token has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now.timestamp())
    }
}

/// Outcome of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUp {
    /// The account is active and signed in.
    Session(Session),
    /// The account exists but the email must be confirmed first.
    PendingConfirmation(User),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_deserializes_backend_row() {
        let row = json!({
            "id": "e1",
            "created_at": "2025-12-17T12:00:00+00:00",
            "date": "2025-12-17T12:00:00+00:00",
            "place_name": "Roladin",
            "donut_name": "Pistachio",
            "filling": null,
            "rating": 9,
            "price": 14.5,
            "visibility": "group",
            "created_by": "u1",
            "group_id": "g1"
        });

        let entry: Entry = serde_json::from_value(row).unwrap();
        assert_eq!(entry.visibility, Visibility::Group);
        assert_eq!(entry.price, Some(14.5));
        assert!(entry.notes.is_none());
        assert_eq!(entry.group_id.as_deref(), Some("g1"));
    }

    #[test]
    fn new_entry_flattens_draft() {
        let draft = EntryDraft {
            place_name: "Roladin".into(),
            donut_name: "Dulce".into(),
            ..EntryDraft::default()
        };
        let value = serde_json::to_value(NewEntry {
            draft,
            created_by: "u1".into(),
        })
        .unwrap();

        assert_eq!(value["created_by"], "u1");
        assert_eq!(value["place_name"], "Roladin");
        assert_eq!(value["visibility"], "private");
        assert!(value["filling"].is_null());
    }

    #[test]
    fn session_expiry() {
        let session = Session {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Some(1_000),
            user: User {
                id: "u".into(),
                email: None,
            },
        };
        let before = DateTime::from_timestamp(999, 0).unwrap();
        let after = DateTime::from_timestamp(1_000, 0).unwrap();
        assert!(!session.is_expired(before));
        assert!(session.is_expired(after));
    }
}
