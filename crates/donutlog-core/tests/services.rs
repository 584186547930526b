//! Service flows against the in-memory backend.

use std::sync::Arc;

use donutlog_core::join_code;
use donutlog_core::query::tables;
use donutlog_core::services::{ALREADY_MEMBER_MESSAGE, DEFAULT_FEED_LIMIT, JOIN_CODE_NOT_FOUND_MESSAGE};
use donutlog_core::{
    EntryDraft, Error, FeedScope, MemoryBackend, Services, SessionStore, SignUp, Visibility,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;

fn signed_in(backend: &Arc<MemoryBackend>, email: &str) -> (Services, String) {
    backend.add_account(email, "secret1");
    let services = Services::new(backend.clone(), None);
    let session = services.auth.sign_in(email, "secret1").unwrap();
    (services, session.user.id)
}

fn tasting(date: &str, donut: &str) -> EntryDraft {
    EntryDraft {
        date: date.to_string(),
        place_name: "רולדין".into(),
        donut_name: donut.into(),
        rating: 8,
        ..EntryDraft::default()
    }
}

#[test]
fn family_feed_shows_shared_entries_of_the_group() {
    let backend = Arc::new(MemoryBackend::new());
    let (noa, noa_id) = signed_in(&backend, "noa@example.com");
    let (dan, dan_id) = signed_in(&backend, "dan@example.com");

    let group = noa.groups.create_group("משפחת לוי", &noa_id).unwrap();
    dan.groups.join_group(&group.join_code, &dan_id).unwrap();

    let shared = EntryDraft {
        visibility: Visibility::Group,
        group_id: Some(group.id.clone()),
        ..tasting("2025-12-03T10:00:00+00:00", "ריבה")
    };
    dan.entries.create(shared, &dan_id).unwrap();
    dan.entries
        .create(tasting("2025-12-04T10:00:00+00:00", "סודי"), &dan_id)
        .unwrap();
    let older_shared = EntryDraft {
        visibility: Visibility::Group,
        group_id: Some(group.id.clone()),
        ..tasting("2025-12-01T10:00:00+00:00", "פיסטוק")
    };
    noa.entries.create(older_shared, &noa_id).unwrap();

    let family = noa
        .entries
        .list(&noa_id, &FeedScope::Family(Some(group.id.clone())), DEFAULT_FEED_LIMIT)
        .unwrap();
    let names: Vec<_> = family.iter().map(|e| e.donut_name.as_str()).collect();
    assert_eq!(names, ["ריבה", "פיסטוק"]);

    let mine = dan
        .entries
        .list(&dan_id, &FeedScope::Mine, DEFAULT_FEED_LIMIT)
        .unwrap();
    let names: Vec<_> = mine.iter().map(|e| e.donut_name.as_str()).collect();
    assert_eq!(names, ["סודי", "ריבה"]);

    let limited = dan.entries.list(&dan_id, &FeedScope::Mine, 1).unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn edit_and_delete_an_entry() {
    let backend = Arc::new(MemoryBackend::new());
    let (noa, noa_id) = signed_in(&backend, "noa@example.com");

    let entry = noa
        .entries
        .create(tasting("2025-12-01T10:00:00+00:00", "פיסטוק"), &noa_id)
        .unwrap();

    let mut draft = EntryDraft::from(&entry);
    draft.rating = 10;
    draft.notes = Some("הכי טובה".into());
    let updated = noa.entries.update(&entry.id, draft).unwrap();
    assert_eq!(updated.rating, 10);
    assert_eq!(updated.notes.as_deref(), Some("הכי טובה"));
    assert_eq!(updated.created_by, noa_id);

    noa.entries.delete(&entry.id).unwrap();
    assert_eq!(noa.entries.get(&entry.id).unwrap(), None);
}

#[test]
fn create_group_makes_creator_admin() {
    let backend = Arc::new(MemoryBackend::new());
    let (noa, noa_id) = signed_in(&backend, "noa@example.com");

    let group = noa.groups.create_group("  משפחת לוי ", &noa_id).unwrap();
    assert_eq!(group.name, "משפחת לוי");
    assert!(join_code::is_valid(&group.join_code));
    assert_eq!(group.created_by.as_deref(), Some(noa_id.as_str()));

    assert!(noa.groups.is_member(&group.id, &noa_id).unwrap());
    assert_eq!(noa.groups.user_groups(&noa_id).unwrap(), vec![group.clone()]);
    assert_eq!(noa.groups.get_group(&group.id).unwrap(), Some(group));
}

#[test]
fn create_group_rejects_bad_names() {
    let backend = Arc::new(MemoryBackend::new());
    let (noa, noa_id) = signed_in(&backend, "noa@example.com");

    let err = noa.groups.create_group("   ", &noa_id).unwrap_err();
    assert_eq!(err.field(), Some("name"));
    assert_eq!(backend.row_count(tables::GROUPS), 0);
}

#[test]
fn join_code_allocation_skips_taken_codes() {
    let mut preview = StdRng::seed_from_u64(11);
    let codes: Vec<String> = (0..6).map(|_| join_code::generate(&mut preview)).collect();

    let backend = Arc::new(MemoryBackend::new());
    let (noa, noa_id) = signed_in(&backend, "noa@example.com");
    for code in &codes[..2] {
        backend.seed(tables::GROUPS, json!({"name": "x", "join_code": code}));
    }

    let group = noa
        .groups
        .create_group_with_rng("לוי", &noa_id, &mut StdRng::seed_from_u64(11))
        .unwrap();
    assert_eq!(group.join_code, codes[2]);
}

#[test]
fn join_code_allocation_gives_up_after_five_probes() {
    let mut preview = StdRng::seed_from_u64(5);
    let codes: Vec<String> = (0..6).map(|_| join_code::generate(&mut preview)).collect();

    let backend = Arc::new(MemoryBackend::new());
    let (noa, noa_id) = signed_in(&backend, "noa@example.com");
    for code in &codes[..5] {
        backend.seed(tables::GROUPS, json!({"name": "x", "join_code": code}));
    }

    let group = noa
        .groups
        .create_group_with_rng("לוי", &noa_id, &mut StdRng::seed_from_u64(5))
        .unwrap();
    assert_eq!(group.join_code, codes[5]);
}

#[test]
fn join_group_by_typed_code() {
    let backend = Arc::new(MemoryBackend::new());
    let (noa, noa_id) = signed_in(&backend, "noa@example.com");
    let (dan, dan_id) = signed_in(&backend, "dan@example.com");
    let group = noa.groups.create_group("לוי", &noa_id).unwrap();

    let typed = format!("  {} ", group.join_code.to_lowercase());
    let joined = dan.groups.join_group(&typed, &dan_id).unwrap();
    assert_eq!(joined.id, group.id);
    assert!(dan.groups.is_member(&group.id, &dan_id).unwrap());

    let err = dan.groups.join_group(&group.join_code, &dan_id).unwrap_err();
    assert_eq!(err.user_message(), ALREADY_MEMBER_MESSAGE);
    assert_eq!(err.code(), Some("23505"));

    dan.groups.leave_group(&group.id, &dan_id).unwrap();
    assert!(!dan.groups.is_member(&group.id, &dan_id).unwrap());
    assert!(dan.groups.user_groups(&dan_id).unwrap().is_empty());
}

#[test]
fn join_group_with_unknown_code() {
    let backend = Arc::new(MemoryBackend::new());
    let (dan, dan_id) = signed_in(&backend, "dan@example.com");

    let err = dan.groups.join_group("ZZZ999", &dan_id).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.user_message(), JOIN_CODE_NOT_FOUND_MESSAGE);

    let err = dan.groups.join_group("abc", &dan_id).unwrap_err();
    assert_eq!(err.field(), Some("join_code"));
}

#[test]
fn user_groups_skips_memberships_without_a_group() {
    let backend = Arc::new(MemoryBackend::new());
    let (noa, noa_id) = signed_in(&backend, "noa@example.com");
    let group = noa.groups.create_group("לוי", &noa_id).unwrap();
    backend.seed(
        tables::MEMBERS,
        json!({"group_id": "gone", "user_id": noa_id, "role": "member"}),
    );

    let groups = noa.groups.user_groups(&noa_id).unwrap();
    assert_eq!(groups, vec![group]);
}

#[test]
fn sign_in_errors_are_translated() {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_account("noa@example.com", "secret1");
    let services = Services::new(backend.clone(), None);

    let err = services.auth.sign_in("noa@example.com", "wrong-1").unwrap_err();
    assert_eq!(err.user_message(), "אימייל או סיסמה שגויים");

    let err = services.auth.sign_up("noa@example.com", "secret1").unwrap_err();
    assert_eq!(err.user_message(), "המשתמש כבר רשום במערכת");

    backend.set_offline(true);
    let err = services.auth.sign_in("noa@example.com", "secret1").unwrap_err();
    assert!(err.is_network());
    assert_eq!(err.user_message(), "בעיית תקשורת. נא לבדוק את החיבור לאינטרנט");
}

#[test]
fn sign_up_signs_in() {
    let backend = Arc::new(MemoryBackend::new());
    let services = Services::new(backend, None);

    let outcome = services.auth.sign_up("new@example.com", "secret1").unwrap();
    let SignUp::Session(session) = outcome else {
        panic!("expected a session");
    };
    assert_eq!(services.auth.user_id(), Some(session.user.id.clone()));
    assert_eq!(services.auth.current_user().unwrap(), Some(session.user));
}

#[test]
fn saved_session_is_restored_on_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    let backend = Arc::new(MemoryBackend::new());
    backend.add_account("noa@example.com", "secret1");

    let first = Services::new(backend.clone(), Some(store.clone()));
    let session = first.auth.sign_in("noa@example.com", "secret1").unwrap();

    let second = Services::new(backend.clone(), Some(store.clone()));
    assert_eq!(second.auth.restore().unwrap(), Some(session.clone()));

    second.auth.sign_out().unwrap();
    assert_eq!(store.load().unwrap(), None);
    let third = Services::new(backend, Some(store));
    assert_eq!(third.auth.restore().unwrap(), None);
}

#[test]
fn expired_session_is_refreshed_or_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));
    let backend = Arc::new(MemoryBackend::new());
    backend.add_account("noa@example.com", "secret1");

    let first = Services::new(backend.clone(), Some(store.clone()));
    let mut session = first.auth.sign_in("noa@example.com", "secret1").unwrap();
    session.expires_at = Some(1);
    store.save(&session).unwrap();

    let second = Services::new(backend.clone(), Some(store.clone()));
    let restored = second.auth.restore().unwrap().unwrap();
    assert_ne!(restored.access_token, session.access_token);
    assert_eq!(restored.user, session.user);

    // The old refresh token was consumed by the refresh above.
    store.save(&session).unwrap();
    let third = Services::new(backend, Some(store.clone()));
    assert_eq!(third.auth.restore().unwrap(), None);
    assert_eq!(store.load().unwrap(), None);
}
