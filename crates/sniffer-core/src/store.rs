//! In-memory capture store.
//!
//! Holds captured [`TrafficRecord`]s newest-first and tells subscribers when
//! the contents change.
//!
//! ## Architecture
//!
//! ```text
//! forwarding tasks ──insert()──► RwLock<VecDeque<Arc<TrafficRecord>>>
//!                                     │ (under the write lock)
//!                                     ▼
//!                         per-subscriber unbounded queues
//!                                     │
//!                                     ▼
//!                  presentation layer drains on its own thread
//! ```
//!
//! Events are queued while the write lock is held, so every subscriber sees
//! them in the same order the mutations happened. Producers never run
//! subscriber code.
//!
//! There is no size cap: the store grows until cleared.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::traffic::{RecordId, TrafficRecord};

/// A change to the store's contents.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A record was added at the front.
    Inserted(Arc<TrafficRecord>),
    /// All records were removed.
    Cleared,
}

/// Thread-safe, newest-first collection of traffic records.
#[derive(Debug, Default)]
pub struct CaptureStore {
    records: RwLock<VecDeque<Arc<TrafficRecord>>>,
    subscribers: Mutex<Vec<UnboundedSender<StoreEvent>>>,
}

impl CaptureStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record at the front and returns the shared handle to it.
    pub fn insert(&self, record: TrafficRecord) -> Arc<TrafficRecord> {
        let record = Arc::new(record);
        let mut records = self.records.write();
        records.push_front(Arc::clone(&record));
        tracing::trace!("Captured {} ({} records)", record.id(), records.len());
        self.publish(StoreEvent::Inserted(Arc::clone(&record)));
        record
    }

    /// Returns the current records, newest first.
    pub fn snapshot(&self) -> Vec<Arc<TrafficRecord>> {
        self.records.read().iter().cloned().collect()
    }

    /// Removes every record.
    pub fn clear(&self) {
        let mut records = self.records.write();
        let removed = records.len();
        records.clear();
        tracing::info!("Cleared {} captured records", removed);
        self.publish(StoreEvent::Cleared);
    }

    /// Returns true if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Looks up a record by id.
    pub fn get(&self, id: RecordId) -> Option<Arc<TrafficRecord>> {
        self.records
            .read()
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    /// Returns records whose URL contains `query`, ignoring case.
    ///
    /// A blank query returns every record.
    pub fn search(&self, query: &str) -> Vec<Arc<TrafficRecord>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.snapshot();
        }

        self.records
            .read()
            .iter()
            .filter(|record| record.url().to_lowercase().contains(&query))
            .cloned()
            .collect()
    }

    /// Subscribes to changes.
    ///
    /// The subscription only sees changes made after this call.
    pub fn subscribe(&self) -> StoreSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        StoreSubscription { rx }
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    // Called with the records write lock held.
    fn publish(&self, event: StoreEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Receiving end of the store's change feed.
///
/// Meant to be drained by the presentation layer on its own thread or task.
#[derive(Debug)]
pub struct StoreSubscription {
    rx: UnboundedReceiver<StoreEvent>,
}

impl StoreSubscription {
    /// Waits for the next event. Returns `None` once the store is dropped.
    pub async fn next(&mut self) -> Option<StoreEvent> {
        self.rx.recv().await
    }

    /// Returns the next pending event without waiting.
    pub fn try_next(&mut self) -> Option<StoreEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Runs `on_change` for every pending event on the caller's thread.
    ///
    /// Returns how many events were dispatched.
    pub fn dispatch_pending<F>(&mut self, mut on_change: F) -> usize
    where
        F: FnMut(StoreEvent),
    {
        let mut dispatched = 0;
        while let Some(event) = self.try_next() {
            on_change(event);
            dispatched += 1;
        }
        dispatched
    }
}
