// SPDX-FileCopyrightText: 2026 Carebridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation session state: patient binding, transcript, and the
//! outstanding draft.
//!
//! Every conversation id has its own async mutex. A [`SessionHandle`] holds
//! that mutex for as long as it lives, so turns on one conversation run one
//! at a time while turns on different conversations never contend. The
//! handle works on a copy of the record; nothing reaches the backend until
//! [`SessionHandle::commit`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use carebridge_core::{
    CarebridgeError, Clock, ConversationId, Message, PatientId, PendingAction,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Everything the store keeps for one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub conversation_id: ConversationId,
    /// Set at most once, never changed afterwards.
    pub patient: Option<PatientId>,
    pub transcript: Vec<Message>,
    pub pending: Option<PendingAction>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl SessionRecord {
    fn new(conversation_id: ConversationId, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id,
            patient: None,
            transcript: Vec::new(),
            pending: None,
            created_at: now,
            last_active: now,
        }
    }
}

/// Key-value storage behind the session store.
///
/// The store serializes access per conversation, so implementations only
/// need to be safe for concurrent use across different ids.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn load(&self, id: &ConversationId) -> Result<Option<SessionRecord>, CarebridgeError>;
    async fn store(&self, record: SessionRecord) -> Result<(), CarebridgeError>;
    async fn remove(&self, id: &ConversationId) -> Result<(), CarebridgeError>;
    async fn list(&self) -> Result<Vec<SessionRecord>, CarebridgeError>;
}

/// Process-local backend. State does not survive a restart.
#[derive(Default)]
pub struct InMemoryBackend {
    records: DashMap<ConversationId, SessionRecord>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for InMemoryBackend {
    async fn load(&self, id: &ConversationId) -> Result<Option<SessionRecord>, CarebridgeError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn store(&self, record: SessionRecord) -> Result<(), CarebridgeError> {
        self.records.insert(record.conversation_id.clone(), record);
        Ok(())
    }

    async fn remove(&self, id: &ConversationId) -> Result<(), CarebridgeError> {
        self.records.remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionRecord>, CarebridgeError> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}

/// Summary of an outstanding draft, as listed for clinicians.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingSummary {
    pub conversation_id: ConversationId,
    pub patient_uuid: Option<PatientId>,
    pub draft_id: String,
    pub note_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Owns all session records and serializes access per conversation.
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            locks: DashMap::new(),
            clock,
        }
    }

    /// Store backed by an [`InMemoryBackend`].
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(InMemoryBackend::new()), clock)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Waits for exclusive access to a conversation and returns a working
    /// copy of its record. Unknown ids get a fresh, unsaved record.
    pub async fn open(&self, id: &ConversationId) -> Result<SessionHandle, CarebridgeError> {
        loop {
            let lock = self.locks.entry(id.clone()).or_default().clone();
            let guard = lock.clone().lock_owned().await;

            // The sweeper may have evicted this conversation while we waited.
            let current = self
                .locks
                .get(id)
                .is_some_and(|l| Arc::ptr_eq(l.value(), &lock));
            if !current {
                debug!(conversation_id = %id, "session lock replaced while waiting, retrying");
                continue;
            }

            let (record, is_new) = match self.backend.load(id).await? {
                Some(record) => (record, false),
                None => (SessionRecord::new(id.clone(), self.clock.now()), true),
            };
            return Ok(SessionHandle {
                record,
                is_new,
                backend: self.backend.clone(),
                clock: self.clock.clone(),
                _guard: guard,
            });
        }
    }

    /// Like [`open`](Self::open) but fails for conversations never committed.
    pub async fn open_existing(
        &self,
        id: &ConversationId,
    ) -> Result<SessionHandle, CarebridgeError> {
        if self.backend.load(id).await?.is_none() {
            return Err(CarebridgeError::ConversationNotFound(id.to_string()));
        }
        let handle = self.open(id).await?;
        if handle.is_new() {
            return Err(CarebridgeError::ConversationNotFound(id.to_string()));
        }
        Ok(handle)
    }

    /// Binds (or re-checks) the conversation's patient and persists it.
    pub async fn bind(
        &self,
        id: &ConversationId,
        patient: Option<PatientId>,
    ) -> Result<Option<PatientId>, CarebridgeError> {
        let mut handle = self.open(id).await?;
        let bound = handle.bind(patient)?;
        handle.commit().await?;
        Ok(bound)
    }

    /// The conversation's draft, if one is outstanding.
    pub async fn get_pending(
        &self,
        id: &ConversationId,
    ) -> Result<Option<PendingAction>, CarebridgeError> {
        Ok(self.backend.load(id).await?.and_then(|r| r.pending))
    }

    pub async fn set_pending(
        &self,
        id: &ConversationId,
        draft: PendingAction,
    ) -> Result<(), CarebridgeError> {
        let mut handle = self.open(id).await?;
        handle.set_pending(draft);
        handle.commit().await
    }

    pub async fn clear_pending(
        &self,
        id: &ConversationId,
    ) -> Result<Option<PendingAction>, CarebridgeError> {
        let mut handle = self.open(id).await?;
        let cleared = handle.clear_pending();
        handle.commit().await?;
        Ok(cleared)
    }

    /// All drafts that have not yet expired, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<PendingSummary>, CarebridgeError> {
        let now = self.clock.now();
        let mut pending: Vec<PendingSummary> = self
            .backend
            .list()
            .await?
            .into_iter()
            .filter_map(|record| {
                let draft = record.pending.filter(|d| !d.is_expired(now))?;
                Some(PendingSummary {
                    conversation_id: record.conversation_id,
                    patient_uuid: record.patient,
                    draft_id: draft.id,
                    note_type: draft.note.note_type,
                    created_at: draft.created_at,
                    expires_at: draft.expires_at,
                })
            })
            .collect();
        pending.sort_by_key(|p| p.created_at);
        Ok(pending)
    }

    /// Removes sessions idle for longer than `idle`. Sessions holding a live
    /// draft, and sessions with a turn in flight, are kept.
    pub async fn evict_idle(&self, idle: Duration) -> Result<usize, CarebridgeError> {
        let now = self.clock.now();
        let is_stale = |record: &SessionRecord| {
            now - record.last_active >= idle
                && !record.pending.as_ref().is_some_and(|d| !d.is_expired(now))
        };

        let records = self.backend.list().await?;
        let mut live: HashSet<ConversationId> = HashSet::new();
        let mut evicted = 0;

        for record in records {
            let id = record.conversation_id.clone();
            if !is_stale(&record) {
                live.insert(id);
                continue;
            }

            let lock = self.locks.entry(id.clone()).or_default().clone();
            let Ok(_guard) = lock.clone().try_lock_owned() else {
                debug!(conversation_id = %id, "session busy, skipping eviction");
                live.insert(id);
                continue;
            };
            // Re-read under the lock; a turn may have committed since the listing.
            match self.backend.load(&id).await? {
                Some(current) if is_stale(&current) => {
                    self.locks.remove(&id);
                    self.backend.remove(&id).await?;
                    evicted += 1;
                    debug!(conversation_id = %id, "evicted idle session");
                }
                Some(_) => {
                    live.insert(id);
                }
                None => {}
            }
        }

        // Drop locks for conversations that never committed, unless in use.
        self.locks
            .retain(|id, lock| live.contains(id) || Arc::strong_count(lock) > 1);

        if evicted > 0 {
            info!(evicted, remaining = live.len(), "idle sessions evicted");
        }
        Ok(evicted)
    }
}

/// Exclusive, uncommitted view of one conversation.
///
/// Dropping the handle without committing discards every change, which is
/// how a failed or timed-out turn leaves the session untouched.
pub struct SessionHandle {
    record: SessionRecord,
    is_new: bool,
    backend: Arc<dyn SessionBackend>,
    clock: Arc<dyn Clock>,
    _guard: OwnedMutexGuard<()>,
}

impl SessionHandle {
    pub fn conversation_id(&self) -> &ConversationId {
        &self.record.conversation_id
    }

    /// True if the conversation has never been committed.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn patient(&self) -> Option<&PatientId> {
        self.record.patient.as_ref()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.record.transcript
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.record.pending.as_ref()
    }

    /// Applies the binding rule and returns the patient now bound.
    ///
    /// `None` never changes anything. A first `Some` binds. A later `Some`
    /// naming a different patient fails and leaves the binding as it was.
    pub fn bind(&mut self, requested: Option<PatientId>) -> Result<Option<PatientId>, CarebridgeError> {
        match (&self.record.patient, requested) {
            (_, None) => {}
            (None, Some(patient)) => {
                info!(
                    conversation_id = %self.record.conversation_id,
                    patient_uuid = %patient,
                    "conversation bound to patient"
                );
                self.record.patient = Some(patient);
            }
            (Some(bound), Some(patient)) if *bound == patient => {}
            (Some(bound), Some(patient)) => {
                warn!(
                    conversation_id = %self.record.conversation_id,
                    bound = %bound,
                    requested = %patient,
                    "patient binding conflict"
                );
                return Err(CarebridgeError::PatientBindingConflict {
                    conversation_id: self.record.conversation_id.to_string(),
                    bound: bound.to_string(),
                    requested: patient.to_string(),
                });
            }
        }
        Ok(self.record.patient.clone())
    }

    pub fn append(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.record.transcript.extend(messages);
    }

    /// Replaces any outstanding draft.
    pub fn set_pending(&mut self, draft: PendingAction) {
        if let Some(previous) = &self.record.pending {
            info!(
                conversation_id = %self.record.conversation_id,
                draft_id = previous.id,
                "outstanding draft superseded"
            );
        }
        self.record.pending = Some(draft);
    }

    pub fn clear_pending(&mut self) -> Option<PendingAction> {
        self.record.pending.take()
    }

    /// Removes and returns the draft if it expired before `now`.
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> Option<PendingAction> {
        if self.record.pending.as_ref()?.is_expired(now) {
            self.record.pending.take()
        } else {
            None
        }
    }

    /// Writes the working copy back and releases the conversation.
    pub async fn commit(mut self) -> Result<(), CarebridgeError> {
        self.record.last_active = self.clock.now();
        self.backend.store(self.record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebridge_core::{ClinicalNote, ManualClock};
    use proptest::prelude::*;

    fn store() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (SessionStore::in_memory(clock.clone()), clock)
    }

    fn draft(clock: &ManualClock, ttl_hours: i64) -> PendingAction {
        PendingAction::new(
            ClinicalNote {
                patient_uuid: PatientId::from("P1"),
                note_type: "Progress".into(),
                content: "Stable.".into(),
            },
            clock.now(),
            Duration::hours(ttl_hours),
        )
    }

    #[tokio::test]
    async fn first_patient_binds_and_null_keeps_it() {
        let (store, _) = store();
        let id = ConversationId::from("c1");

        assert_eq!(store.bind(&id, None).await.unwrap(), None);
        assert_eq!(
            store.bind(&id, Some("P1".into())).await.unwrap(),
            Some(PatientId::from("P1"))
        );
        assert_eq!(
            store.bind(&id, None).await.unwrap(),
            Some(PatientId::from("P1"))
        );
        assert_eq!(
            store.bind(&id, Some("P1".into())).await.unwrap(),
            Some(PatientId::from("P1"))
        );
    }

    #[tokio::test]
    async fn conflicting_patient_is_rejected() {
        let (store, _) = store();
        let id = ConversationId::from("c1");
        store.bind(&id, Some("P1".into())).await.unwrap();

        let err = store.bind(&id, Some("P2".into())).await.unwrap_err();
        assert!(matches!(err, CarebridgeError::PatientBindingConflict { .. }));

        let handle = store.open(&id).await.unwrap();
        assert_eq!(handle.patient(), Some(&PatientId::from("P1")));
    }

    #[tokio::test]
    async fn dropped_handle_discards_changes() {
        let (store, _) = store();
        let id = ConversationId::from("c1");
        {
            let mut handle = store.open(&id).await.unwrap();
            handle.bind(Some("P1".into())).unwrap();
            handle.append([Message::user("hello")]);
        }
        let handle = store.open(&id).await.unwrap();
        assert!(handle.is_new());
        assert!(handle.transcript().is_empty());
        assert_eq!(handle.patient(), None);
    }

    #[tokio::test]
    async fn same_conversation_waits_for_the_open_handle() {
        let (store, _) = store();
        let store = Arc::new(store);
        let id = ConversationId::from("c1");

        let handle = store.open(&id).await.unwrap();
        let waiter = {
            let store = store.clone();
            let id = id.clone();
            tokio::spawn(async move { store.open(&id).await.map(|h| h.transcript().len()) })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        // A different conversation is not blocked.
        let other = store.open(&ConversationId::from("c2")).await.unwrap();
        drop(other);

        let mut handle = handle;
        handle.append([Message::user("first")]);
        handle.commit().await.unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn pending_lifecycle_and_listing() {
        let (store, clock) = store();
        let id = ConversationId::from("c1");
        store.bind(&id, Some("P1".into())).await.unwrap();
        assert!(store.get_pending(&id).await.unwrap().is_none());

        store.set_pending(&id, draft(&clock, 24)).await.unwrap();
        let listed = store.list_pending().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].note_type, "Progress");
        assert_eq!(listed[0].patient_uuid, Some(PatientId::from("P1")));

        clock.advance(Duration::hours(25));
        assert!(store.list_pending().await.unwrap().is_empty());

        let cleared = store.clear_pending(&id).await.unwrap();
        assert!(cleared.is_some());
        assert!(store.get_pending(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn take_expired_only_removes_stale_drafts() {
        let (store, clock) = store();
        let id = ConversationId::from("c1");
        store.set_pending(&id, draft(&clock, 1)).await.unwrap();

        let mut handle = store.open(&id).await.unwrap();
        assert!(handle.take_expired(clock.now()).is_none());
        assert!(handle.pending().is_some());
        clock.advance(Duration::hours(2));
        assert!(handle.take_expired(clock.now()).is_some());
        assert!(handle.pending().is_none());
    }

    #[tokio::test]
    async fn open_existing_rejects_unknown_conversations() {
        let (store, _) = store();
        let err = store
            .open_existing(&ConversationId::from("nope"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CarebridgeError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_but_live_drafts_are_kept() {
        let (store, clock) = store();
        let idle = ConversationId::from("idle");
        let drafting = ConversationId::from("drafting");
        store.bind(&idle, Some("P1".into())).await.unwrap();
        store.set_pending(&drafting, draft(&clock, 24)).await.unwrap();

        clock.advance(Duration::hours(13));
        assert_eq!(store.evict_idle(Duration::hours(12)).await.unwrap(), 1);
        assert!(store.open_existing(&idle).await.is_err());
        assert!(store.open_existing(&drafting).await.is_ok());

        // Once the draft has expired the session goes too.
        clock.advance(Duration::hours(12));
        assert_eq!(store.evict_idle(Duration::hours(12)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn busy_sessions_are_not_evicted() {
        let (store, clock) = store();
        let id = ConversationId::from("c1");
        store.bind(&id, None).await.unwrap();
        clock.advance(Duration::hours(13));

        let handle = store.open(&id).await.unwrap();
        assert_eq!(store.evict_idle(Duration::hours(12)).await.unwrap(), 0);
        handle.commit().await.unwrap();
        // The commit refreshed last_active.
        assert_eq!(store.evict_idle(Duration::hours(12)).await.unwrap(), 0);
    }

    proptest! {
        #[test]
        fn binding_never_changes_once_set(requests in proptest::collection::vec(
            proptest::option::of(prop_oneof![Just("P1"), Just("P2"), Just("P3")]),
            1..12,
        )) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (store, _) = store();
                let id = ConversationId::from("c1");
                let mut expected: Option<PatientId> = None;

                for request in requests {
                    let request = request.map(PatientId::from);
                    let result = store.bind(&id, request.clone()).await;
                    match (expected.clone(), request) {
                        (Some(bound), Some(asked)) if bound != asked => {
                            prop_assert!(result.is_err());
                        }
                        (None, Some(asked)) => {
                            expected = Some(asked);
                            prop_assert_eq!(result.unwrap(), expected.clone());
                        }
                        _ => {
                            prop_assert_eq!(result.unwrap(), expected.clone());
                        }
                    }
                }
                Ok(())
            })?;
        }
    }
}
