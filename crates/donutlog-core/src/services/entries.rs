use std::sync::Arc;

use crate::backend::{decode, decode_all, maybe_single, single, Backend};
use crate::error::{Error, Result};
use crate::models::{Entry, EntryDraft, FeedScope, NewEntry, Visibility};
use crate::query::{tables, Query};
use crate::validation;

/// Rows fetched for one feed page.
pub const DEFAULT_FEED_LIMIT: usize = 200;

/// CRUD over `donut_entries`.
#[derive(Clone)]
pub struct EntryService {
    backend: Arc<dyn Backend>,
}

impl EntryService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Entries for a feed, newest tasting first.
    ///
    /// A family feed without an active family is empty and costs no request.
    pub fn list(&self, user_id: &str, scope: &FeedScope, limit: usize) -> Result<Vec<Entry>> {
        let query = Query::new().order("date", false).limit(limit);
        let query = match scope {
            FeedScope::Mine => query.eq("created_by", user_id),
            FeedScope::Family(Some(group_id)) => query
                .eq("visibility", Visibility::Group.as_str())
                .eq("group_id", group_id),
            FeedScope::Family(None) => return Ok(Vec::new()),
        };

        let rows = self.backend.select(tables::ENTRIES, &query)?;
        tracing::debug!(?scope, count = rows.len(), "Loaded feed");
        decode_all(rows)
    }

    pub fn get(&self, id: &str) -> Result<Option<Entry>> {
        let rows = self
            .backend
            .select(tables::ENTRIES, &Query::new().eq("id", id))?;
        maybe_single(rows)?.map(decode).transpose()
    }

    /// Insert a tasting owned by `user_id`.
    pub fn create(&self, draft: EntryDraft, user_id: &str) -> Result<Entry> {
        let draft = prepare(draft)?;
        let row = serde_json::to_value(NewEntry {
            draft,
            created_by: user_id.to_string(),
        })?;

        let entry: Entry = decode(self.backend.insert(tables::ENTRIES, row)?)?;
        tracing::info!(entry_id = %entry.id, "Created entry");
        Ok(entry)
    }

    /// Replace the editable fields of an entry.
    pub fn update(&self, id: &str, draft: EntryDraft) -> Result<Entry> {
        let changes = serde_json::to_value(prepare(draft)?)?;
        let rows = self
            .backend
            .update(tables::ENTRIES, &Query::new().eq("id", id), changes)?;

        let entry: Entry = decode(single(rows)?)?;
        tracing::info!(entry_id = %entry.id, "Updated entry");
        Ok(entry)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.backend
            .delete(tables::ENTRIES, &Query::new().eq("id", id))?;
        tracing::info!(entry_id = id, "Deleted entry");
        Ok(())
    }
}

/// Validate a draft and bring it into its stored shape.
fn prepare(mut draft: EntryDraft) -> Result<EntryDraft> {
    let errors = validation::validate_entry(&draft);
    if let Some((field, message)) = errors.into_iter().next() {
        return Err(Error::validation(field, message));
    }

    draft.place_name = draft.place_name.trim().to_string();
    draft.donut_name = draft.donut_name.trim().to_string();
    draft.filling = non_blank(draft.filling);
    draft.notes = non_blank(draft.notes);
    draft.photo_url = non_blank(draft.photo_url);
    if draft.visibility == Visibility::Private {
        draft.group_id = None;
    }
    Ok(draft)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    fn draft() -> EntryDraft {
        EntryDraft {
            place_name: "  רולדין ".into(),
            donut_name: "פיסטוק".into(),
            filling: Some("  ".into()),
            rating: 9,
            ..EntryDraft::default()
        }
    }

    #[test]
    fn create_trims_fields_and_drops_blanks() {
        let service = EntryService::new(Arc::new(MemoryBackend::new()));
        let entry = service.create(draft(), "u1").unwrap();

        assert_eq!(entry.place_name, "רולדין");
        assert_eq!(entry.filling, None);
        assert_eq!(entry.created_by, "u1");
        assert_eq!(service.get(&entry.id).unwrap(), Some(entry));
    }

    #[test]
    fn private_entries_lose_their_group() {
        let service = EntryService::new(Arc::new(MemoryBackend::new()));
        let entry = service
            .create(
                EntryDraft {
                    group_id: Some("g1".into()),
                    ..draft()
                },
                "u1",
            )
            .unwrap();
        assert_eq!(entry.group_id, None);
    }

    #[test]
    fn invalid_drafts_are_rejected_before_the_request() {
        let backend = Arc::new(MemoryBackend::new());
        let service = EntryService::new(backend.clone());
        let err = service
            .create(
                EntryDraft {
                    rating: 0,
                    ..draft()
                },
                "u1",
            )
            .unwrap_err();

        assert_eq!(err.field(), Some("rating"));
        assert_eq!(backend.row_count(tables::ENTRIES), 0);
    }

    #[test]
    fn family_feed_without_group_is_empty() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_offline(true);
        let service = EntryService::new(backend);

        let entries = service
            .list("u1", &FeedScope::Family(None), DEFAULT_FEED_LIMIT)
            .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn missing_entry_is_none() {
        let service = EntryService::new(Arc::new(MemoryBackend::new()));
        assert_eq!(service.get("nope").unwrap(), None);
        assert!(matches!(
            service.update("nope", draft()).unwrap_err(),
            Error::NotFound { .. }
        ));
    }
}
