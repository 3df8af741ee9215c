use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::DateTime;
use pretty_assertions::assert_eq;

use super::{reconcile, Collection, SyncEngine};
use crate::auth::{AuthIdentity, AuthState, AuthUser};
use crate::error::{Error, Result};
use crate::models::{Note, Reconcilable, Tag};
use crate::remote::RemoteCollection;
use crate::store::{load_collection, save_collection, LocalStore, MemoryStore, NOTES_KEY};

fn note(id: &str, title: &str, synced: bool, updated_at: Option<&str>) -> Note {
    let mut n = Note::new(title, format!("{title} body"), vec![]);
    n.id = id.to_string();
    n.synced = synced;
    n.updated_at = updated_at.map(|raw| DateTime::parse_from_rfc3339(raw).unwrap());
    if synced {
        n.server_id = Some(format!("srv-{id}"));
    }
    n
}

fn server_note(id: &str, title: &str, updated_at: Option<&str>) -> Note {
    let mut n = note(id, title, true, updated_at);
    n.server_id = Some(format!("srv-{id}"));
    n.created_by = Some("u1".to_string());
    n
}

fn tag(id: &str, label: &str, synced: bool) -> Tag {
    let mut t = Tag::new(label);
    t.id = id.to_string();
    t.synced = synced;
    if synced {
        t.server_id = Some(format!("srv-{id}"));
    }
    t
}

fn ids<R: Reconcilable>(records: &[R]) -> Vec<&str> {
    records.iter().map(Reconcilable::record_id).collect()
}

// ---------------------------------------------------------------------------
// Pure merge
// ---------------------------------------------------------------------------

#[test]
fn server_newer_wins_for_diverged_record() {
    let local = vec![note("1", "local", false, Some("2024-05-01T10:00:00Z"))];
    let remote = vec![server_note("1", "remote", Some("2024-05-01T11:00:00Z"))];

    let merged = reconcile(&local, &remote);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].title, "remote");
    assert_eq!(
        merged[0].updated_at,
        Some(DateTime::parse_from_rfc3339("2024-05-01T11:00:00Z").unwrap())
    );
}

#[test]
fn local_newer_wins_but_keeps_server_id() {
    let local = vec![note("1", "local", false, Some("2024-05-01T12:00:00Z"))];
    let remote = vec![server_note("1", "remote", Some("2024-05-01T11:00:00Z"))];

    let merged = reconcile(&local, &remote);
    assert_eq!(merged[0].title, "local");
    assert!(!merged[0].synced);
    // Server-only fields still present as a base.
    assert_eq!(merged[0].server_id.as_deref(), Some("srv-1"));
}

#[test]
fn local_only_record_survives_empty_remote() {
    let local = vec![note("1", "mine", false, None)];
    let merged = reconcile(&local, &[]);
    assert_eq!(merged, local);
}

#[test]
fn every_local_id_missing_from_remote_survives_unmodified() {
    let local = vec![
        note("1", "shared", true, Some("2024-05-01T10:00:00Z")),
        note("2", "only-local-a", false, None),
        note("3", "only-local-b", false, Some("2024-05-01T09:00:00Z")),
    ];
    let remote = vec![server_note("1", "shared", Some("2024-05-01T10:00:00Z"))];

    let merged = reconcile(&local, &remote);
    assert_eq!(ids(&merged), vec!["1", "2", "3"]);
    assert_eq!(merged[1], local[1]);
    assert_eq!(merged[2], local[2]);
}

#[test]
fn synced_local_copy_is_replaced_verbatim() {
    let local = vec![note("1", "stale local", true, Some("2024-06-01T00:00:00Z"))];
    let remote = vec![server_note("1", "server copy", Some("2024-05-01T00:00:00Z"))];

    let merged = reconcile(&local, &remote);
    // No timestamp comparison: last known state was synced, so the server is
    // authoritative even with an older timestamp.
    assert_eq!(merged[0], remote[0]);
}

#[test]
fn timestamp_tie_goes_to_the_server() {
    let at = "2024-05-01T10:00:00Z";
    let local = vec![note("1", "local", false, Some(at))];
    let remote = vec![server_note("1", "remote", Some(at))];

    let merged = reconcile(&local, &remote);
    assert_eq!(merged[0].title, "remote");
}

#[test]
fn comparison_uses_offset_adjusted_timestamps() {
    // Same instant written at +02:00 adjusts two hours earlier than its UTC
    // twin, so the remote copy wins even though the raw instants are equal.
    let local = vec![note("1", "local", false, Some("2024-05-01T12:00:00+02:00"))];
    let remote = vec![server_note("1", "remote", Some("2024-05-01T10:00:00Z"))];

    let merged = reconcile(&local, &remote);
    assert_eq!(merged[0].title, "remote");
}

#[test]
fn missing_timestamp_falls_back_to_remote_overlay() {
    let local = vec![note("1", "local", false, None)];
    let remote = vec![server_note("1", "remote", Some("2024-05-01T10:00:00Z"))];
    assert_eq!(reconcile(&local, &remote)[0].title, "remote");

    let local = vec![note("1", "local", false, Some("2024-05-01T10:00:00Z"))];
    let remote = vec![server_note("1", "remote", None)];
    let merged = reconcile(&local, &remote);
    assert_eq!(merged[0].title, "remote");
    // The overlay's missing timestamp falls back to the local one.
    assert_eq!(
        merged[0].updated_at,
        Some(DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap())
    );
}

#[test]
fn unknown_remote_record_is_kept_as_is() {
    let remote = vec![server_note("9", "new on server", Some("2024-05-01T10:00:00Z"))];
    let merged = reconcile(&Vec::<Note>::new(), &remote);
    assert_eq!(merged, remote);
}

#[test]
fn remote_order_is_preserved_and_locals_append_after() {
    let local = vec![note("a", "a", false, None), note("b", "b", false, None)];
    let remote = vec![
        server_note("2", "two", None),
        server_note("1", "one", None),
    ];

    let merged = reconcile(&local, &remote);
    assert_eq!(ids(&merged), vec!["2", "1", "a", "b"]);
}

#[test]
fn tags_coalesce_by_label_without_duplicates() {
    // A tag created locally before sign-in, and the same tag synced from
    // another device under a different client id.
    let local = vec![tag("local-id", "work", false)];
    let mut remote_tag = tag("remote-id", "work", true);
    remote_tag.server_id = Some("srv-w".to_string());
    let remote = vec![remote_tag.clone()];

    let merged = reconcile(&local, &remote);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].id, "remote-id");
    assert_eq!(merged[0].label, "work");
    assert_eq!(merged[0].server_id.as_deref(), Some("srv-w"));

    // No two records share an id afterwards.
    let mut seen = ids(&merged);
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), merged.len());
}

#[test]
fn synced_local_tag_is_not_coalesced_by_label() {
    // Coalescing exists for tags created before sign-in; a tag that already
    // went through a sync keeps its own identity even when a remote twin
    // shares the label.
    let local = vec![tag("local-id", "work", true)];
    let remote = vec![tag("remote-id", "work", true)];

    let merged = reconcile(&local, &remote);
    assert_eq!(ids(&merged), vec!["remote-id", "local-id"]);
    assert_eq!(merged[1].server_id.as_deref(), Some("srv-local-id"));
}

#[test]
fn tag_with_different_label_is_not_coalesced() {
    let local = vec![tag("local-id", "home", false)];
    let remote = vec![tag("remote-id", "work", true)];

    let merged = reconcile(&local, &remote);
    assert_eq!(ids(&merged), vec!["remote-id", "local-id"]);
}

#[test]
fn reconcile_does_not_mutate_inputs() {
    let local = vec![note("1", "local", false, Some("2024-05-01T10:00:00Z"))];
    let remote = vec![server_note("1", "remote", Some("2024-05-01T11:00:00Z"))];
    let local_before = local.clone();
    let remote_before = remote.clone();

    let _ = reconcile(&local, &remote);
    assert_eq!(local, local_before);
    assert_eq!(remote, remote_before);
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct FakeRemote {
    notes: Arc<Mutex<Vec<Note>>>,
    calls: Arc<Mutex<Vec<String>>>,
    fail_fetch: Arc<AtomicBool>,
    fail_share: Arc<AtomicBool>,
    sign_out_during_fetch: Arc<Mutex<Option<Arc<AuthState>>>>,
}

impl FakeRemote {
    fn with_notes(notes: Vec<Note>) -> Self {
        let remote = Self::default();
        *remote.notes.lock().unwrap() = notes;
        remote
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

impl RemoteCollection<Note> for FakeRemote {
    async fn fetch_all(&self, _user_id: &str) -> Result<Vec<Note>> {
        self.record_call("fetch_all");
        if let Some(auth) = self.sign_out_during_fetch.lock().unwrap().take() {
            auth.set_identity(AuthIdentity::Anonymous);
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 500,
                message: "boom".to_string(),
            });
        }
        Ok(self.notes.lock().unwrap().clone())
    }

    async fn sync_one(&self, record: &Note, user_id: &str) -> Result<Note> {
        self.record_call("sync_one");
        let mut stored = record.clone();
        stored.server_id = Some(format!("srv-{}", record.id));
        stored.created_by = Some(user_id.to_string());
        stored.synced = true;
        Ok(stored)
    }

    async fn sync_all(&self, _records: &[Note], _user_id: &str) -> Result<()> {
        self.record_call("sync_all");
        Ok(())
    }

    async fn delete_one(&self, _id: &str, _user_id: &str) -> Result<()> {
        self.record_call("delete_one");
        Ok(())
    }

    async fn share(&self, id: &str, _user_id: &str) -> Result<String> {
        self.record_call("share");
        if self.fail_share.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 500,
                message: "share failed".to_string(),
            });
        }
        Ok(format!("link-{id}"))
    }

    async fn revoke_share(&self, _id: &str, _user_id: &str) -> Result<()> {
        self.record_call("revoke_share");
        Ok(())
    }
}

struct Setup {
    engine: SyncEngine<Note, FakeRemote>,
    remote: FakeRemote,
    auth: Arc<AuthState>,
    store: Arc<MemoryStore>,
}

fn signed_in_user() -> AuthUser {
    AuthUser {
        id: "u1".to_string(),
        name: "User One".to_string(),
        username: "user1".to_string(),
        email: "u1@example.com".to_string(),
    }
}

fn setup(local: Vec<Note>, remote: FakeRemote, signed_in: bool) -> Setup {
    let store = Arc::new(MemoryStore::new());
    save_collection(store.as_ref(), NOTES_KEY, &local).unwrap();

    let auth = Arc::new(AuthState::new());
    if signed_in {
        auth.set_identity(AuthIdentity::Authenticated(signed_in_user()));
    }

    let collection = Collection::load(NOTES_KEY, store.clone() as Arc<dyn LocalStore>).unwrap();
    let engine = SyncEngine::new(collection, remote.clone(), auth.clone());
    Setup {
        engine,
        remote,
        auth,
        store,
    }
}

fn persisted_notes(store: &MemoryStore) -> Vec<Note> {
    load_collection(store, NOTES_KEY).unwrap()
}

#[tokio::test]
async fn reconcile_merges_remote_into_local_and_persists() {
    let local = vec![
        note("1", "local", false, Some("2024-05-01T10:00:00Z")),
        note("2", "only local", false, None),
    ];
    let remote = FakeRemote::with_notes(vec![server_note(
        "1",
        "remote",
        Some("2024-05-01T11:00:00Z"),
    )]);
    let s = setup(local, remote, true);

    let merged = s.engine.reconcile_from_server().await;
    assert_eq!(ids(&merged), vec!["1", "2"]);
    assert_eq!(merged[0].title, "remote");
    assert_eq!(persisted_notes(&s.store), merged);
    assert!(!s.engine.is_loading());
}

#[tokio::test]
async fn signed_out_reconcile_sweeps_without_network() {
    let mut n = note("1", "mine", true, None);
    n.server_id = Some("s1".to_string());
    n.permalink = Some("x".to_string());
    n.created_by = Some("u1".to_string());

    let remote = FakeRemote::default();
    let s = setup(vec![n], remote, false);

    let swept = s.engine.reconcile_from_server().await;
    assert!(swept[0].server_id.is_none());
    assert!(swept[0].permalink.is_none());
    assert!(swept[0].created_by.is_none());
    assert!(!swept[0].synced);
    assert_eq!(s.remote.calls(), Vec::<String>::new());
}

#[tokio::test]
async fn unsync_sweep_is_idempotent() {
    let mut n = note("1", "mine", true, None);
    n.server_id = Some("s1".to_string());
    let s = setup(vec![n], FakeRemote::default(), false);

    let once = s.engine.unsync_sweep().unwrap();
    let twice = s.engine.unsync_sweep().unwrap();
    assert_eq!(once, twice);
}

#[tokio::test]
async fn failed_fetch_leaves_local_state_untouched() {
    let local = vec![note("1", "local", false, Some("2024-05-01T10:00:00Z"))];
    let remote = FakeRemote::with_notes(vec![server_note("1", "remote", None)]);
    remote.fail_fetch.store(true, Ordering::SeqCst);
    let s = setup(local.clone(), remote, true);

    let result = s.engine.reconcile_from_server().await;
    assert_eq!(result, local);
    assert_eq!(persisted_notes(&s.store), local);
    assert!(!s.engine.is_loading());
}

#[tokio::test]
async fn stale_fetch_is_discarded_when_identity_changes_mid_flight() {
    let local = vec![note("1", "local", false, Some("2024-05-01T10:00:00Z"))];
    let remote = FakeRemote::with_notes(vec![server_note(
        "1",
        "remote",
        Some("2024-05-01T11:00:00Z"),
    )]);
    let s = setup(local.clone(), remote, true);
    *s.remote.sign_out_during_fetch.lock().unwrap() = Some(s.auth.clone());

    let result = s.engine.reconcile_from_server().await;
    // The fetched data never reaches the local collection.
    assert_eq!(result, local);
    assert_eq!(persisted_notes(&s.store), local);
}

#[tokio::test]
async fn sync_one_splices_server_response_by_id() {
    let local = vec![note("1", "draft", false, None), note("2", "other", false, None)];
    let s = setup(local, FakeRemote::default(), true);

    let synced = s.engine.sync_one("1").await.unwrap();
    assert!(synced.synced);
    assert_eq!(synced.server_id.as_deref(), Some("srv-1"));
    assert_eq!(synced.created_by.as_deref(), Some("u1"));

    let records = s.engine.records();
    assert_eq!(records[0], synced);
    assert_eq!(records[1].title, "other");
    assert!(!records[1].synced);
    assert_eq!(persisted_notes(&s.store), records);
}

#[tokio::test]
async fn sync_one_requires_authentication() {
    let s = setup(vec![note("1", "draft", false, None)], FakeRemote::default(), false);
    let err = s.engine.sync_one("1").await.unwrap_err();
    assert!(matches!(err, Error::AuthRequired));
    assert_eq!(s.remote.calls(), Vec::<String>::new());
}

#[tokio::test]
async fn sync_all_pushes_then_reconciles() {
    let local = vec![note("1", "local", true, Some("2024-05-01T10:00:00Z"))];
    let remote = FakeRemote::with_notes(vec![server_note(
        "1",
        "server copy",
        Some("2024-05-01T10:00:00Z"),
    )]);
    let s = setup(local, remote, true);

    let merged = s.engine.sync_all().await.unwrap();
    assert_eq!(s.remote.calls(), vec!["sync_all", "fetch_all"]);
    assert_eq!(merged[0].title, "server copy");
}

#[tokio::test]
async fn delete_synced_keeps_local_copy_without_server_identity() {
    let mut n = note("1", "keep me", true, None);
    n.server_id = Some("s1".to_string());
    n.created_by = Some("u1".to_string());
    n.permalink = Some("p1".to_string());
    let s = setup(vec![n], FakeRemote::default(), true);

    let kept = s.engine.delete_synced("1").await.unwrap();
    assert_eq!(s.remote.calls(), vec!["delete_one"]);
    assert_eq!(kept.title, "keep me");
    assert!(kept.server_id.is_none());
    assert!(kept.created_by.is_none());
    assert!(!kept.synced);
    // Unlike the sign-out sweep, the share link survives.
    assert_eq!(kept.permalink.as_deref(), Some("p1"));
}

#[tokio::test]
async fn delete_synced_rejects_never_synced_records() {
    let s = setup(vec![note("1", "local only", false, None)], FakeRemote::default(), true);
    let err = s.engine.delete_synced("1").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn share_syncs_never_synced_note_before_requesting_link() {
    let s = setup(vec![note("1", "draft", false, None)], FakeRemote::default(), true);

    let permalink = s.engine.share("1").await.unwrap();
    assert_eq!(permalink, "link-1");
    // Sync completes before the link request is issued.
    assert_eq!(s.remote.calls(), vec!["sync_one", "share"]);

    let shared = s.engine.get("1").unwrap();
    assert_eq!(shared.permalink.as_deref(), Some("link-1"));
    assert_eq!(shared.server_id.as_deref(), Some("srv-1"));
    assert!(shared.updated_at.is_some());
}

#[tokio::test]
async fn share_skips_sync_for_records_already_on_server() {
    let mut n = note("1", "synced", true, None);
    n.server_id = Some("s1".to_string());
    let s = setup(vec![n], FakeRemote::default(), true);

    s.engine.share("1").await.unwrap();
    assert_eq!(s.remote.calls(), vec!["share"]);
}

#[tokio::test]
async fn failed_link_request_leaves_note_as_the_sync_left_it() {
    let remote = FakeRemote::default();
    remote.fail_share.store(true, Ordering::SeqCst);
    let s = setup(vec![note("1", "draft", false, None)], remote, true);

    let err = s.engine.share("1").await.unwrap_err();
    assert!(matches!(err, Error::Api { .. }));

    let record = s.engine.get("1").unwrap();
    // The implicit sync stuck; the failed link request changed nothing else.
    assert_eq!(record.server_id.as_deref(), Some("srv-1"));
    assert!(record.synced);
    assert!(record.permalink.is_none());
}

#[tokio::test]
async fn revoke_share_clears_the_link() {
    let mut n = note("1", "shared", true, None);
    n.server_id = Some("s1".to_string());
    n.permalink = Some("link-1".to_string());
    let s = setup(vec![n], FakeRemote::default(), true);

    s.engine.revoke_share("1").await.unwrap();
    assert_eq!(s.remote.calls(), vec!["revoke_share"]);
    assert!(s.engine.get("1").unwrap().permalink.is_none());
}

#[tokio::test]
async fn insert_rejects_duplicate_ids() {
    let s = setup(vec![note("1", "first", false, None)], FakeRemote::default(), false);
    let mut dup = Note::new("second", "", vec![]);
    dup.id = "1".to_string();

    let err = s.engine.insert(dup).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(s.engine.records().len(), 1);
}

#[tokio::test]
async fn local_edit_marks_record_diverged() {
    let mut n = note("1", "before", true, None);
    n.server_id = Some("s1".to_string());
    let s = setup(vec![n], FakeRemote::default(), false);

    let edited = s
        .engine
        .update_with("1", |current| current.with_edit("after", "body", vec![]))
        .unwrap();
    assert_eq!(edited.title, "after");
    assert!(!edited.synced);
    assert_eq!(persisted_notes(&s.store)[0], edited);
}

#[tokio::test]
async fn remove_deletes_locally_without_server_round_trip() {
    let mut n = note("1", "synced", true, None);
    n.server_id = Some("s1".to_string());
    let s = setup(vec![n], FakeRemote::default(), true);

    assert!(s.engine.remove("1").unwrap());
    assert!(s.engine.records().is_empty());
    assert_eq!(s.remote.calls(), Vec::<String>::new());
    assert!(!s.engine.remove("1").unwrap());
}
