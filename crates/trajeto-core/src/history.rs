// ── Notification history ──
//
// Newest-first list of received notifications, capped at
// `HISTORY_CAPACITY`. Reads are lock-free snapshots; writes are
// serialized and persisted through a pluggable `HistoryStore`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trajeto_api::Notification;

use crate::error::CoreError;

pub const HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub notification: Notification,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl HistoryEntry {
    pub fn new(notification: Notification) -> Self {
        Self {
            id: Uuid::new_v4(),
            notification,
            received_at: Utc::now(),
            read: false,
        }
    }
}

// ── Storage backends ─────────────────────────────────────────────────

/// Durable storage for the history list.
pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Result<Vec<HistoryEntry>, CoreError>;
    fn save(&self, entries: &[HistoryEntry]) -> Result<(), CoreError>;
}

/// Keeps the history in memory only. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: ArcSwap<Vec<HistoryEntry>>,
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self) -> Result<Vec<HistoryEntry>, CoreError> {
        Ok(self.entries.load().as_ref().clone())
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<(), CoreError> {
        self.entries.store(Arc::new(entries.to_vec()));
        Ok(())
    }
}

/// JSON array on disk. A missing file reads as an empty history.
#[derive(Debug, Clone)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn load(&self) -> Result<Vec<HistoryEntry>, CoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| CoreError::History {
            message: format!("{}: {e}", self.path.display()),
        })
    }

    fn save(&self, entries: &[HistoryEntry]) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(entries).map_err(|e| CoreError::History {
            message: e.to_string(),
        })?;

        // Write-then-rename keeps the previous file intact on a crash.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ── History ──────────────────────────────────────────────────────────

pub struct NotificationHistory {
    inner: Arc<HistoryInner>,
}

struct HistoryInner {
    store: Box<dyn HistoryStore>,
    entries: ArcSwap<Vec<HistoryEntry>>,
    write: Mutex<()>,
    /// Last snapshot handed to the store; saves run one at a time.
    saved: Mutex<Option<Arc<Vec<HistoryEntry>>>>,
}

impl HistoryInner {
    /// Save the newest snapshot unless it is already on disk.
    fn persist(&self) {
        let mut saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.entries.load_full();
        if saved.as_ref().is_some_and(|last| Arc::ptr_eq(last, &current)) {
            return;
        }
        if let Err(e) = self.store.save(&current) {
            tracing::warn!(error = %e, "Failed to persist notification history");
        }
        *saved = Some(current);
    }
}

/// When an update reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    Now,
    /// On the blocking pool when inside a runtime, inline otherwise.
    Background,
}

impl std::fmt::Debug for NotificationHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHistory")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl NotificationHistory {
    /// Load from `store`. An unreadable store starts an empty history.
    pub fn new(store: Box<dyn HistoryStore>) -> Self {
        let mut entries = store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not load notification history, starting empty");
            Vec::new()
        });
        entries.truncate(HISTORY_CAPACITY);

        Self {
            inner: Arc::new(HistoryInner {
                store,
                entries: ArcSwap::from_pointee(entries),
                write: Mutex::new(()),
                saved: Mutex::new(None),
            }),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryHistoryStore::default()))
    }

    /// Snapshot, newest first.
    pub fn entries(&self) -> Arc<Vec<HistoryEntry>> {
        self.inner.entries.load_full()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn unread_count(&self) -> usize {
        self.inner.entries.load().iter().filter(|e| !e.read).count()
    }

    /// Prepend a notification, evicting the oldest past capacity.
    ///
    /// Called from the session task, so the store write is moved off the
    /// async worker.
    pub fn push(&self, notification: Notification) -> HistoryEntry {
        let entry = HistoryEntry::new(notification);
        self.update(Persist::Background, |current| {
            let mut next = Vec::with_capacity(HISTORY_CAPACITY);
            next.push(entry.clone());
            next.extend(current.iter().take(HISTORY_CAPACITY - 1).cloned());
            next
        });
        entry
    }

    /// Mark one entry read. Returns `false` if no entry has that id.
    pub fn mark_read(&self, id: Uuid) -> bool {
        match self.inner.entries.load().iter().find(|e| e.id == id) {
            None => return false,
            Some(entry) if entry.read => return true,
            Some(_) => {}
        }
        self.update(Persist::Now, |current| {
            current
                .iter()
                .map(|e| HistoryEntry {
                    read: e.read || e.id == id,
                    ..e.clone()
                })
                .collect()
        });
        true
    }

    /// Returns how many entries changed.
    pub fn mark_all_read(&self) -> usize {
        let unread = self.unread_count();
        if unread > 0 {
            self.update(Persist::Now, |current| {
                current
                    .iter()
                    .map(|e| HistoryEntry {
                        read: true,
                        ..e.clone()
                    })
                    .collect()
            });
        }
        unread
    }

    pub fn clear(&self) {
        self.update(Persist::Now, |_| Vec::new());
    }

    /// Wait until the newest snapshot has reached the store.
    pub async fn flush(&self) {
        let inner = Arc::clone(&self.inner);
        if let Err(e) = tokio::task::spawn_blocking(move || inner.persist()).await {
            tracing::warn!(error = %e, "History flush did not complete");
        }
    }

    fn update(&self, persist: Persist, f: impl FnOnce(&[HistoryEntry]) -> Vec<HistoryEntry>) {
        {
            let _guard = self.inner.write.lock().unwrap_or_else(PoisonError::into_inner);
            let next = f(&self.inner.entries.load());
            self.inner.entries.store(Arc::new(next));
        }

        let handle = match persist {
            Persist::Background => tokio::runtime::Handle::try_current().ok(),
            Persist::Now => None,
        };
        match handle {
            Some(handle) => {
                let inner = Arc::clone(&self.inner);
                drop(handle.spawn_blocking(move || inner.persist()));
            }
            None => self.inner.persist(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trajeto_api::Priority;

    fn notification(n: usize) -> Notification {
        let mut notification = Notification::new("embarque", Priority::Media);
        notification.message = Some(format!("#{n}"));
        notification
    }

    #[test]
    fn newest_first_and_capped() {
        let history = NotificationHistory::in_memory();
        for n in 0..=HISTORY_CAPACITY {
            history.push(notification(n));
        }

        let entries = history.entries();
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries[0].notification.message.as_deref(), Some("#100"));
        // "#0" was evicted
        assert_eq!(
            entries.last().unwrap().notification.message.as_deref(),
            Some("#1")
        );
    }

    #[test]
    fn mark_read_flips_one_entry() {
        let history = NotificationHistory::in_memory();
        let first = history.push(notification(1));
        history.push(notification(2));

        assert_eq!(history.unread_count(), 2);
        assert!(history.mark_read(first.id));
        assert!(history.mark_read(first.id));
        assert!(!history.mark_read(Uuid::new_v4()));
        assert_eq!(history.unread_count(), 1);

        assert_eq!(history.mark_all_read(), 1);
        assert_eq!(history.unread_count(), 0);
    }

    #[test]
    fn file_store_round_trips_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");

        let history = NotificationHistory::new(Box::new(JsonFileHistoryStore::new(&path)));
        assert!(history.is_empty());

        let entry = history.push(notification(7));
        history.mark_read(entry.id);

        let reloaded = NotificationHistory::new(Box::new(JsonFileHistoryStore::new(&path)));
        let entries = reloaded.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, entry.id);
        assert!(entries[0].read);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();

        let store = JsonFileHistoryStore::new(&path);
        assert!(matches!(store.load(), Err(CoreError::History { .. })));

        let history = NotificationHistory::new(Box::new(store));
        assert!(history.is_empty());
    }

    #[test]
    fn clear_persists() {
        let store = Arc::new(MemoryHistoryStore::default());
        let history = NotificationHistory::new(Box::new(SharedStore(Arc::clone(&store))));
        history.push(notification(1));
        history.clear();

        assert!(history.is_empty());
        assert!(store.load().unwrap().is_empty());
    }

    /// Holds every save until the test opens the gate, then reports it.
    struct GatedStore {
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
        saved: tokio::sync::mpsc::UnboundedSender<Vec<HistoryEntry>>,
    }

    impl HistoryStore for GatedStore {
        fn load(&self) -> Result<Vec<HistoryEntry>, CoreError> {
            Ok(Vec::new())
        }
        fn save(&self, entries: &[HistoryEntry]) -> Result<(), CoreError> {
            // a dropped sender opens the gate for good
            let _ = self.gate.lock().unwrap().recv();
            let _ = self.saved.send(entries.to_vec());
            Ok(())
        }
    }

    fn gated() -> (
        NotificationHistory,
        std::sync::mpsc::Sender<()>,
        tokio::sync::mpsc::UnboundedReceiver<Vec<HistoryEntry>>,
    ) {
        let (gate_tx, gate_rx) = std::sync::mpsc::channel();
        let (saved_tx, saved_rx) = tokio::sync::mpsc::unbounded_channel();
        let store = GatedStore {
            gate: Mutex::new(gate_rx),
            saved: saved_tx,
        };
        (NotificationHistory::new(Box::new(store)), gate_tx, saved_rx)
    }

    #[tokio::test]
    async fn push_inside_runtime_does_not_wait_for_the_store() {
        let (history, gate, mut saved) = gated();

        // an inline save would block here forever
        history.push(notification(1));
        assert_eq!(history.len(), 1);

        gate.send(()).unwrap();
        let written = saved.recv().await.unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].notification.message.as_deref(), Some("#1"));
    }

    #[tokio::test]
    async fn flush_writes_the_latest_snapshot() {
        let store = Arc::new(MemoryHistoryStore::default());
        let history = NotificationHistory::new(Box::new(SharedStore(Arc::clone(&store))));
        history.push(notification(1));
        history.push(notification(2));

        history.flush().await;

        let persisted = store.load().unwrap();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].notification.message.as_deref(), Some("#2"));
    }

    #[tokio::test]
    async fn background_saves_never_go_backwards() {
        let (history, gate, mut saved) = gated();
        for n in 1..=3 {
            history.push(notification(n));
        }
        drop(gate);

        let mut lengths = Vec::new();
        loop {
            let written = saved.recv().await.unwrap();
            lengths.push(written.len());
            if written.len() == 3 {
                break;
            }
        }
        let mut sorted = lengths.clone();
        sorted.sort_unstable();
        assert_eq!(lengths, sorted);
    }

    struct SharedStore(Arc<MemoryHistoryStore>);

    impl HistoryStore for SharedStore {
        fn load(&self) -> Result<Vec<HistoryEntry>, CoreError> {
            self.0.load()
        }
        fn save(&self, entries: &[HistoryEntry]) -> Result<(), CoreError> {
            self.0.save(entries)
        }
    }
}
