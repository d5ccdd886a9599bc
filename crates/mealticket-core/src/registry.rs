//! Student registry.
//!
//! Sole owner of durable student state. The whole collection is persisted
//! as one JSON array under [`STUDENTS_KEY`], and every mutation is a
//! guarded read-modify-write: the collection lock is held while a draft is
//! mutated and written, and the draft only replaces the in-memory copy
//! once the write succeeded. A failed write therefore leaves both the
//! durable and the in-memory state exactly as they were.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StorageError;
use crate::events::Event;
use crate::storage::kv::{KvStore, STUDENTS_KEY};

const EVENT_BUFFER: usize = 64;

/// One registered student and the state of today's ticket.
///
/// `used == true` exactly when `date` and `time` are both set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub code: String,
    pub used: bool,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl StudentRecord {
    fn new(name: String, code: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            code,
            used: false,
            date: None,
            time: None,
        }
    }

    /// Redeemed on the calendar day `today`?
    pub fn redeemed_on(&self, today: &str) -> bool {
        self.used && self.date.as_deref() == Some(today)
    }

    fn clear(&mut self) {
        self.used = false;
        self.date = None;
        self.time = None;
    }
}

/// Listing filter for the admin ticket view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketFilter {
    #[default]
    All,
    Used,
    Unused,
}

impl TicketFilter {
    fn matches(self, record: &StudentRecord) -> bool {
        match self {
            TicketFilter::All => true,
            TicketFilter::Used => record.used,
            TicketFilter::Unused => !record.used,
        }
    }
}

/// Result of [`StudentRegistry::mark_redeemed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkRedeemed {
    Redeemed(StudentRecord),
    /// Already stamped with the same date. Nothing was written.
    AlreadyRedeemed(StudentRecord),
    UnknownStudent,
}

pub struct StudentRegistry {
    store: Arc<dyn KvStore>,
    records: Mutex<Vec<StudentRecord>>,
    events: broadcast::Sender<Event>,
}

impl StudentRegistry {
    /// Load the persisted collection. A missing key is an empty registry.
    pub fn load(store: Arc<dyn KvStore>) -> Result<Self, StorageError> {
        let records = match store.get(STUDENTS_KEY)? {
            Some(json) => serde_json::from_str(&json).map_err(|source| StorageError::Corrupt {
                key: STUDENTS_KEY.into(),
                source,
            })?,
            None => Vec::new(),
        };
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Ok(Self {
            store,
            records: Mutex::new(records),
            events,
        })
    }

    /// Subscribe to committed changes.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Copy of the whole collection in stored order.
    pub fn snapshot(&self) -> Vec<StudentRecord> {
        self.lock().clone()
    }

    pub fn list(&self, filter: TicketFilter) -> Vec<StudentRecord> {
        self.lock()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Login lookup.
    ///
    /// Codes are not guaranteed unique. When several records share `code`
    /// the first one in stored order wins.
    pub fn find_by_code(&self, code: &str) -> Option<StudentRecord> {
        self.lock().iter().find(|r| r.code == code).cloned()
    }

    pub fn find_by_id(&self, id: &str) -> Option<StudentRecord> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Append a new, unredeemed record.
    pub fn register(&self, name: &str, code: &str) -> Result<StudentRecord, StorageError> {
        let record = StudentRecord::new(name.to_string(), code.to_string());
        let created = record.clone();
        self.transact(move |records| {
            if records.iter().any(|r| r.code == record.code) {
                warn!(code = %record.code, "registering a duplicate login code");
            }
            records.push(record);
            Some(())
        })?;
        info!(student_id = %created.id, "student registered");
        self.notify(Event::StudentRegistered {
            student_id: created.id.clone(),
            name: created.name.clone(),
            at: Utc::now(),
        });
        Ok(created)
    }

    /// Stamp the record as redeemed on `date`.
    ///
    /// The already-redeemed check and the write happen under one lock, so
    /// concurrent callers redeem a given record at most once per date.
    pub fn mark_redeemed(
        &self,
        id: &str,
        date: &str,
        time: &str,
    ) -> Result<MarkRedeemed, StorageError> {
        let mut live = self.lock();
        let Some(idx) = live.iter().position(|r| r.id == id) else {
            return Ok(MarkRedeemed::UnknownStudent);
        };
        if live[idx].redeemed_on(date) {
            return Ok(MarkRedeemed::AlreadyRedeemed(live[idx].clone()));
        }

        let mut draft = live.clone();
        let record = &mut draft[idx];
        record.used = true;
        record.date = Some(date.to_string());
        record.time = Some(time.to_string());
        let record = record.clone();
        self.commit(&mut live, draft)?;
        drop(live);

        info!(student_id = %record.id, date, time, "ticket redeemed");
        self.notify(Event::TicketRedeemed {
            student_id: record.id.clone(),
            date: date.to_string(),
            time: time.to_string(),
            at: Utc::now(),
        });
        Ok(MarkRedeemed::Redeemed(record))
    }

    /// Clear the redemption stamp on every record. Returns how many were
    /// redeemed before the reset.
    pub fn reset_all(&self) -> Result<usize, StorageError> {
        let cleared = self
            .transact(|records| {
                let cleared = records.iter().filter(|r| r.used).count();
                records.iter_mut().for_each(StudentRecord::clear);
                Some(cleared)
            })?
            .unwrap_or(0);
        info!(cleared, "registry reset");
        self.notify(Event::RegistryReset {
            cleared,
            at: Utc::now(),
        });
        Ok(cleared)
    }

    /// Clear every stamp that is not from `today`. Records redeemed today
    /// keep their ticket. Nothing is written when there is nothing to clear.
    pub fn reset_stale(&self, today: &str) -> Result<usize, StorageError> {
        let cleared = self.transact(|records| {
            let mut cleared = 0;
            for record in records.iter_mut() {
                let stale = record.used || record.date.is_some() || record.time.is_some();
                if stale && !record.redeemed_on(today) {
                    record.clear();
                    cleared += 1;
                }
            }
            (cleared > 0).then_some(cleared)
        })?;
        let cleared = cleared.unwrap_or(0);
        if cleared > 0 {
            info!(cleared, today, "stale redemptions cleared");
            self.notify(Event::RegistryReset {
                cleared,
                at: Utc::now(),
            });
        }
        Ok(cleared)
    }

    /// Delete a record. `Ok(None)` if the id is unknown.
    pub fn remove(&self, id: &str) -> Result<Option<StudentRecord>, StorageError> {
        let removed = self.transact(|records| {
            let idx = records.iter().position(|r| r.id == id)?;
            Some(records.remove(idx))
        })?;
        if let Some(record) = &removed {
            info!(student_id = %record.id, "student removed");
            self.notify(Event::StudentRemoved {
                student_id: record.id.clone(),
                at: Utc::now(),
            });
        }
        Ok(removed)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Run `mutate` against a draft of the collection and persist it.
    ///
    /// `mutate` returning `None` means "no change": nothing is written.
    /// The draft replaces the live collection only after a successful write.
    fn transact<R>(
        &self,
        mutate: impl FnOnce(&mut Vec<StudentRecord>) -> Option<R>,
    ) -> Result<Option<R>, StorageError> {
        let mut live = self.lock();
        let mut draft = live.clone();
        let Some(result) = mutate(&mut draft) else {
            return Ok(None);
        };
        self.commit(&mut live, draft)?;
        Ok(Some(result))
    }

    /// Persist `draft` and swap it in. `live` is untouched on failure.
    fn commit(
        &self,
        live: &mut MutexGuard<'_, Vec<StudentRecord>>,
        draft: Vec<StudentRecord>,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(&draft).map_err(|e| StorageError::Write {
            key: STUDENTS_KEY.into(),
            message: e.to_string(),
        })?;
        if let Err(e) = self.store.set(STUDENTS_KEY, &json) {
            warn!(error = %e, "registry write failed, keeping previous state");
            return Err(e);
        }
        **live = draft;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StudentRecord>> {
        // Live state is only replaced after a successful write, so it is
        // consistent even if a holder panicked.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::testing::FlakyStore;
    use crate::storage::kv::MemoryStore;

    fn registry() -> (Arc<FlakyStore>, StudentRegistry) {
        let store = Arc::new(FlakyStore::default());
        let registry = StudentRegistry::load(store.clone()).unwrap();
        (store, registry)
    }

    #[test]
    fn register_creates_unredeemed_record_and_persists() {
        let (store, reg) = registry();
        let r = reg.register("Ana", "123456").unwrap();
        assert!(!r.used);
        assert!(r.date.is_none() && r.time.is_none());

        let reloaded = StudentRegistry::load(store).unwrap();
        assert_eq!(reloaded.find_by_id(&r.id), Some(r));
    }

    #[test]
    fn ids_are_unique() {
        let (_, reg) = registry();
        let a = reg.register("Ana", "1").unwrap();
        let b = reg.register("Ana", "1").unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn find_by_code_returns_first_of_duplicates() {
        let (_, reg) = registry();
        let first = reg.register("First", "777777").unwrap();
        let _second = reg.register("Second", "777777").unwrap();
        assert_eq!(reg.find_by_code("777777").unwrap().id, first.id);
        assert!(reg.find_by_code("000000").is_none());
    }

    #[test]
    fn failed_register_rolls_back() {
        let (store, reg) = registry();
        reg.register("Ana", "1").unwrap();
        store.fail_writes(true);
        assert!(matches!(
            reg.register("Bia", "2"),
            Err(StorageError::Write { .. })
        ));
        assert_eq!(reg.len(), 1);
        assert!(reg.find_by_code("2").is_none());
    }

    #[test]
    fn mark_redeemed_sets_stamp_together() {
        let (_, reg) = registry();
        let r = reg.register("Ana", "1").unwrap();
        let MarkRedeemed::Redeemed(updated) =
            reg.mark_redeemed(&r.id, "25/09/2025", "15:00:00").unwrap()
        else {
            panic!("expected a fresh redemption");
        };
        assert!(updated.used);
        assert_eq!(updated.date.as_deref(), Some("25/09/2025"));
        assert_eq!(updated.time.as_deref(), Some("15:00:00"));
        assert!(updated.redeemed_on("25/09/2025"));
        assert!(!updated.redeemed_on("26/09/2025"));
    }

    #[test]
    fn mark_redeemed_unknown_id_writes_nothing() {
        let (store, reg) = registry();
        assert_eq!(
            reg.mark_redeemed("nope", "d", "t").unwrap(),
            MarkRedeemed::UnknownStudent
        );
        assert!(store.get(STUDENTS_KEY).unwrap().is_none());
    }

    #[test]
    fn second_mark_same_day_keeps_first_stamp() {
        let (store, reg) = registry();
        let r = reg.register("Ana", "1").unwrap();
        reg.mark_redeemed(&r.id, "25/09/2025", "15:00:00").unwrap();
        let before = store.get(STUDENTS_KEY).unwrap();

        store.fail_writes(true);
        let MarkRedeemed::AlreadyRedeemed(existing) =
            reg.mark_redeemed(&r.id, "25/09/2025", "15:03:00").unwrap()
        else {
            panic!("expected the existing stamp");
        };
        assert_eq!(existing.time.as_deref(), Some("15:00:00"));
        assert_eq!(store.get(STUDENTS_KEY).unwrap(), before);
    }

    #[test]
    fn failed_mark_leaves_record_untouched() {
        let (store, reg) = registry();
        let r = reg.register("Ana", "1").unwrap();
        store.fail_writes(true);
        assert!(reg.mark_redeemed(&r.id, "d", "t").is_err());
        assert_eq!(reg.find_by_id(&r.id), Some(r));
    }

    #[test]
    fn reset_all_clears_every_stamp() {
        let (_, reg) = registry();
        let a = reg.register("Ana", "1").unwrap();
        reg.register("Bia", "2").unwrap();
        reg.mark_redeemed(&a.id, "25/09/2025", "15:00:00").unwrap();
        assert_eq!(reg.reset_all().unwrap(), 1);
        assert!(reg
            .snapshot()
            .iter()
            .all(|r| !r.used && r.date.is_none() && r.time.is_none()));
    }

    #[test]
    fn reset_stale_keeps_todays_redemptions() {
        let (_, reg) = registry();
        let today = reg.register("Today", "1").unwrap();
        let old = reg.register("Old", "2").unwrap();
        reg.mark_redeemed(&today.id, "25/09/2025", "15:00:00").unwrap();
        reg.mark_redeemed(&old.id, "24/09/2025", "15:00:00").unwrap();

        assert_eq!(reg.reset_stale("25/09/2025").unwrap(), 1);
        assert!(reg.find_by_id(&today.id).unwrap().used);
        assert!(!reg.find_by_id(&old.id).unwrap().used);
        assert_eq!(reg.reset_stale("25/09/2025").unwrap(), 0);
    }

    #[test]
    fn remove_deletes_and_persists() {
        let (store, reg) = registry();
        let a = reg.register("Ana", "1").unwrap();
        assert_eq!(reg.remove(&a.id).unwrap().unwrap().id, a.id);
        assert!(reg.remove(&a.id).unwrap().is_none());
        assert!(StudentRegistry::load(store).unwrap().is_empty());
    }

    #[test]
    fn list_filters_by_ticket_state() {
        let (_, reg) = registry();
        let a = reg.register("Ana", "1").unwrap();
        reg.register("Bia", "2").unwrap();
        reg.mark_redeemed(&a.id, "d", "t").unwrap();
        assert_eq!(reg.list(TicketFilter::All).len(), 2);
        assert_eq!(reg.list(TicketFilter::Used)[0].name, "Ana");
        assert_eq!(reg.list(TicketFilter::Unused)[0].name, "Bia");
    }

    #[test]
    fn corrupt_collection_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.set(STUDENTS_KEY, "{not json").unwrap();
        assert!(matches!(
            StudentRegistry::load(store),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn persisted_shape_uses_plain_field_names() {
        let (store, reg) = registry();
        reg.register("Ana", "123456").unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&store.get(STUDENTS_KEY).unwrap().unwrap()).unwrap();
        let obj = json[0].as_object().unwrap();
        for key in ["id", "name", "code", "used", "date", "time"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert!(json[0]["date"].is_null());
    }

    #[test]
    fn committed_changes_are_broadcast() {
        let (_, reg) = registry();
        let mut rx = reg.subscribe();
        let r = reg.register("Ana", "1").unwrap();
        match rx.try_recv().unwrap() {
            Event::StudentRegistered { student_id, .. } => assert_eq!(student_id, r.id),
            other => panic!("unexpected {other:?}"),
        }
    }
}
