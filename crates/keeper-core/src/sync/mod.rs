//! The sync engine: reconciles a local collection with its remote
//! counterpart and tracks per-record sync status.
//!
//! Exactly two replicas exist per record (the local store and the remote
//! collection). Conflicts are resolved by whole-record comparison and a
//! last-writer timestamp heuristic; there is no field-level merge protocol.
//!
//! Concurrency model: cooperative. Operations suspend only at network
//! boundaries, and every local mutation is applied as a pure transform of the
//! latest collection value, never against a snapshot taken before an await
//! point. One reconciliation may be in flight per collection at a time, and a
//! fetch whose result went stale (identity changed mid-flight) is discarded.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::{AuthIdentity, AuthState, AuthUser};
use crate::error::{Error, Result};
use crate::models::{adjusted_epoch_millis, Note, Reconcilable};
use crate::remote::RemoteCollection;
use crate::store::{load_collection, save_collection, LocalStore};

/// One local collection: the in-memory mirror plus its store key.
///
/// All mutations funnel through [`Collection::apply`], which transforms the
/// latest value under the lock and persists before publishing. This is the
/// sole-writer discipline that prevents lost updates when a user edit lands
/// while a fetch is in flight.
pub struct Collection<R> {
    key: &'static str,
    store: Arc<dyn LocalStore>,
    records: Mutex<Vec<R>>,
}

impl<R> Collection<R>
where
    R: Reconcilable + Serialize + DeserializeOwned,
{
    /// Load the collection for `key` from the store, or start empty.
    pub fn load(key: &'static str, store: Arc<dyn LocalStore>) -> Result<Self> {
        let records = load_collection(store.as_ref(), key)?;
        Ok(Self {
            key,
            store,
            records: Mutex::new(records),
        })
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Snapshot of the current records.
    pub fn records(&self) -> Vec<R> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.lock().iter().find(|r| r.record_id() == id).cloned()
    }

    /// Apply `transform` to the latest value, persist, then publish.
    ///
    /// Persisting before updating the in-memory mirror keeps the two in step:
    /// a failed write leaves both at the previous value.
    pub fn apply<F>(&self, transform: F) -> Result<Vec<R>>
    where
        F: FnOnce(Vec<R>) -> Vec<R>,
    {
        let mut guard = self.lock();
        let next = transform(guard.clone());
        save_collection(self.store.as_ref(), self.key, &next)?;
        *guard = next.clone();
        Ok(next)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<R>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Merge a local and a remote collection into one authoritative sequence.
///
/// Order-preserving over the remote sequence, per remote record:
/// - id match with a synced local copy: the server is authoritative, the
///   remote record replaces the local one verbatim;
/// - id match with a diverged local copy: adjusted-timestamp comparison,
///   where the server wins ties and the losing side still contributes the
///   fields the winner lacks;
/// - id match with a missing timestamp on either side: the remote copy plays
///   overlay (deterministic fallback);
/// - no id match but an unconsumed, never-synced local record shares the
///   label: the two are coalesced under the remote id;
/// - otherwise the remote record is new to this client and kept as-is.
///
/// Local records the remote never mentioned survive unconditionally, in their
/// original order, after the remote-derived sequence. Neither input is
/// mutated.
pub fn reconcile<R: Reconcilable>(local: &[R], remote: &[R]) -> Vec<R> {
    let mut consumed: HashSet<&str> = HashSet::new();
    let mut merged: Vec<R> = Vec::with_capacity(remote.len() + local.len());

    for incoming in remote {
        let entry = if let Some(existing) = local
            .iter()
            .find(|candidate| candidate.record_id() == incoming.record_id())
        {
            consumed.insert(existing.record_id());
            if existing.is_synced() {
                incoming.clone()
            } else {
                match (
                    existing.updated_at().map(adjusted_epoch_millis),
                    incoming.updated_at().map(adjusted_epoch_millis),
                ) {
                    (Some(local_at), Some(remote_at)) if remote_at >= local_at => {
                        R::merged(existing, incoming)
                    }
                    (Some(_), Some(_)) => R::merged(incoming, existing),
                    _ => R::merged(existing, incoming),
                }
            }
        } else if let Some(twin) = local.iter().find(|candidate| {
            !candidate.is_synced()
                && !consumed.contains(candidate.record_id())
                && matches!(
                    (candidate.coalesce_label(), incoming.coalesce_label()),
                    (Some(a), Some(b)) if a == b
                )
        }) {
            consumed.insert(twin.record_id());
            R::merged(twin, incoming)
        } else {
            incoming.clone()
        };
        merged.push(entry);
    }

    for leftover in local {
        if !consumed.contains(leftover.record_id()) {
            merged.push(leftover.clone());
        }
    }

    merged
}

/// Sync engine for one collection kind.
pub struct SyncEngine<R, C> {
    collection: Collection<R>,
    remote: C,
    auth: Arc<AuthState>,
    loading: AtomicBool,
    reconcile_gate: tokio::sync::Mutex<()>,
}

impl<R, C> SyncEngine<R, C>
where
    R: Reconcilable + Serialize + DeserializeOwned,
    C: RemoteCollection<R>,
{
    pub fn new(collection: Collection<R>, remote: C, auth: Arc<AuthState>) -> Self {
        Self {
            collection,
            remote,
            auth,
            loading: AtomicBool::new(false),
            reconcile_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Snapshot of the current local collection.
    pub fn records(&self) -> Vec<R> {
        self.collection.records()
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.collection.get(id)
    }

    /// Whether a remote fetch is in flight. Presentation polls this; retries
    /// stay the caller's responsibility.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Run the reconciliation routine. Called on startup and whenever the
    /// authentication identity changes.
    ///
    /// Signed out: performs the unsync sweep with no network call. Signed in:
    /// fetches the remote collection, discards the result if the identity
    /// changed mid-flight, and folds it into local state. Failures are
    /// absorbed here (logged, loading flag cleared, local state untouched);
    /// this never returns an error past the engine boundary.
    pub async fn reconcile_from_server(&self) -> Vec<R> {
        let _gate = self.reconcile_gate.lock().await;

        let (identity, generation) = self.auth.identity_and_generation();
        let AuthIdentity::Authenticated(user) = identity else {
            return self.sweep_absorbing_errors();
        };

        self.loading.store(true, Ordering::SeqCst);
        let outcome = self.remote.fetch_all(&user.id).await;
        self.loading.store(false, Ordering::SeqCst);

        let fetched = match outcome {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(
                    collection = self.collection.key(),
                    %error,
                    "remote fetch failed; keeping local state"
                );
                return self.collection.records();
            }
        };

        if self.auth.generation() != generation {
            tracing::debug!(
                collection = self.collection.key(),
                "identity changed during fetch; discarding stale result"
            );
            return self.collection.records();
        }

        match self.collection.apply(|local| reconcile(&local, &fetched)) {
            Ok(merged) => merged,
            Err(error) => {
                tracing::warn!(
                    collection = self.collection.key(),
                    %error,
                    "failed to persist reconciled collection"
                );
                self.collection.records()
            }
        }
    }

    /// Clear server linkage from every record and mark all of them diverged.
    /// Runs when authentication is lost; idempotent.
    pub fn unsync_sweep(&self) -> Result<Vec<R>> {
        self.collection
            .apply(|records| records.iter().map(Reconcilable::unsynced).collect())
    }

    fn sweep_absorbing_errors(&self) -> Vec<R> {
        match self.unsync_sweep() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(
                    collection = self.collection.key(),
                    %error,
                    "unsync sweep failed to persist"
                );
                self.collection.records()
            }
        }
    }

    /// Append a locally created record.
    pub fn insert(&self, record: R) -> Result<R> {
        if self.get(record.record_id()).is_some() {
            return Err(Error::InvalidInput(format!(
                "duplicate record id {}",
                record.record_id()
            )));
        }
        self.collection.apply(|mut records| {
            records.push(record.clone());
            records
        })?;
        Ok(record)
    }

    /// Replace the record with `id` by `transform(record)`. The new value
    /// keeps the same client id.
    pub fn update_with<F>(&self, id: &str, transform: F) -> Result<R>
    where
        F: FnOnce(&R) -> R,
    {
        let current = self
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let updated = transform(&current);
        if updated.record_id() != id {
            return Err(Error::InvalidInput(
                "record id must not change on update".to_string(),
            ));
        }
        self.splice(updated.clone())?;
        Ok(updated)
    }

    /// Remove the record locally. Unconditional; no server round-trip even
    /// for synced records.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut removed = false;
        self.collection.apply(|records| {
            let kept: Vec<R> = records
                .into_iter()
                .filter(|record| {
                    let matches = record.record_id() == id;
                    removed |= matches;
                    !matches
                })
                .collect();
            kept
        })?;
        Ok(removed)
    }

    /// Push one record to the server and fold the response back in by id.
    /// The response includes server-assigned fields, which is what flips the
    /// record to synced. On failure local state is untouched and the error
    /// surfaces to the caller.
    pub async fn sync_one(&self, id: &str) -> Result<R> {
        let user = self.require_auth()?;
        let record = self
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let response = self.remote.sync_one(&record, &user.id).await?;

        // Re-read the latest copy under apply: an edit may have landed while
        // the request was in flight.
        let mut folded: Option<R> = None;
        self.collection.apply(|records| {
            records
                .into_iter()
                .map(|existing| {
                    if existing.record_id() == id {
                        let merged_record = R::merged(&existing, &response);
                        folded = Some(merged_record.clone());
                        merged_record
                    } else {
                        existing
                    }
                })
                .collect()
        })?;

        folded.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Bulk-push the whole local collection, then reconcile against a fresh
    /// fetch.
    pub async fn sync_all(&self) -> Result<Vec<R>> {
        let user = self.require_auth()?;
        let records = self.collection.records();
        self.remote.sync_all(&records, &user.id).await?;
        Ok(self.reconcile_from_server().await)
    }

    /// Delete the record on the server but keep the local copy, stripped of
    /// its server identity and marked diverged.
    pub async fn delete_synced(&self, id: &str) -> Result<R> {
        let user = self.require_auth()?;
        let record = self
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if record.server_id().is_none() {
            return Err(Error::InvalidInput(
                "record has never been synced to the server".to_string(),
            ));
        }

        self.remote.delete_one(id, &user.id).await?;
        self.update_with(id, Reconcilable::detached)
    }

    fn splice(&self, updated: R) -> Result<Vec<R>> {
        self.collection.apply(|records| {
            records
                .into_iter()
                .map(|existing| {
                    if existing.record_id() == updated.record_id() {
                        updated.clone()
                    } else {
                        existing
                    }
                })
                .collect()
        })
    }

    fn require_auth(&self) -> Result<AuthUser> {
        match self.auth.identity() {
            AuthIdentity::Authenticated(user) => Ok(user),
            AuthIdentity::Anonymous => Err(Error::AuthRequired),
        }
    }
}

/// Share operations are note-specific: only notes carry a permalink.
impl<C> SyncEngine<Note, C>
where
    C: RemoteCollection<Note>,
{
    /// Request a public share link. A never-synced note is pushed first so
    /// the server knows the record before it mints the link; if the link
    /// request then fails, the note stays exactly as the sync left it.
    pub async fn share(&self, id: &str) -> Result<String> {
        let user = self.require_auth()?;
        let note = self
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if !note.is_on_server() {
            self.sync_one(id).await?;
        }

        let permalink = self.remote.share(id, &user.id).await?;
        self.update_with(id, |current| {
            current.with_share_link(Some(permalink.clone()))
        })?;
        Ok(permalink)
    }

    /// Revoke the public share link and clear it locally.
    pub async fn revoke_share(&self, id: &str) -> Result<()> {
        let user = self.require_auth()?;
        if self.get(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }

        self.remote.revoke_share(id, &user.id).await?;
        self.update_with(id, |current| current.with_share_link(None))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
