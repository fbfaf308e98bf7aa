use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error as ThisError;
use tracing::debug;
use uuid::Uuid;

use crate::reservation::Reservation;

/// The Store keeps reservation records keyed by an integer identifier it assigns itself. Writes
/// go through a [`Transaction`], which stages its changes privately and applies them all at once
/// on commit. The store is thread-safe and can be shared and cloned cheaply using reference
/// counting.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    pub fn open() -> Store {
        let state = State {
            records: BTreeMap::new(),
            next_id: 1,
        };

        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
            open: AtomicBool::new(true),
        });

        debug!("Store opened");

        Self { inner }
    }

    /// Closes the store. Every later operation, including commits of transactions that are
    /// already running, fails with [`StoreError::Closed`].
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        debug!("Store closed");
    }

    pub fn begin(&self) -> Result<Transaction, StoreError> {
        self.ensure_open()?;

        let tx = Transaction {
            id: Uuid::new_v4(),
            store: self.clone(),
            deleted: BTreeSet::new(),
            created: BTreeMap::new(),
            finished: false,
        };
        debug!(transaction_id = %tx.id, "Transaction started");

        Ok(tx)
    }

    /// Returns every committed record, ordered by identifier.
    pub async fn find_all(&self) -> Result<Vec<Reservation>, StoreError> {
        let store = self.lock()?;
        Ok(store.records().cloned().collect())
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct InnerStore {
    state: Mutex<State>,
    open: AtomicBool,
}

impl InnerStore {
    pub fn lock(&self) -> Result<InnerStoreLocked<'_>, StoreError> {
        self.ensure_open()?;
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(InnerStoreLocked { state })
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }
}

pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
}

impl<'a> InnerStoreLocked<'a> {
    /// Hands out the next identifier. The sequence is never rewound, so identifiers of rolled
    /// back records are not reused.
    fn next_id(&mut self) -> i32 {
        let id = self.state.next_id;
        self.state.next_id += 1;
        id
    }

    fn insert(&mut self, id: i32, reservation: Reservation) {
        self.state.records.insert(id, reservation);
    }

    fn remove(&mut self, id: i32) -> Option<Reservation> {
        self.state.records.remove(&id)
    }

    pub fn size(&self) -> usize {
        self.state.records.len()
    }

    pub fn records(&self) -> impl Iterator<Item = &Reservation> {
        self.state.records.values()
    }

    fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.state.records.keys().copied()
    }
}

struct State {
    records: BTreeMap<i32, Reservation>,
    next_id: i32,
}

/// A set of staged changes against a [`Store`]. Nothing is visible to other readers until
/// [`Transaction::commit`] succeeds. Dropping a transaction without committing rolls it back.
pub struct Transaction {
    pub id: Uuid,
    store: Store,
    // Committed records this transaction has deleted.
    deleted: BTreeSet<i32>,
    // Records created by this transaction, not yet committed.
    created: BTreeMap<i32, Reservation>,
    finished: bool,
}

impl Transaction {
    /// Persists a new record and returns it with its assigned identifier.
    pub async fn create(&mut self, reservation: Reservation) -> Result<Reservation, StoreError> {
        if let Some(id) = reservation.id {
            return Err(StoreError::AlreadyPersisted { id });
        }

        let id = self.store.lock()?.next_id();
        let reservation = Reservation {
            id: Some(id),
            ..reservation
        };
        self.created.insert(id, reservation.clone());

        Ok(reservation)
    }

    /// Returns the records visible from inside this transaction, ordered by identifier.
    pub async fn find_all(&self) -> Result<Vec<Reservation>, StoreError> {
        let store = self.store.lock()?;

        let mut visible: BTreeMap<i32, Reservation> = store
            .records()
            .filter_map(|r| r.id.map(|id| (id, r.clone())))
            .filter(|(id, _)| !self.deleted.contains(id))
            .collect();
        visible.extend(self.created.iter().map(|(id, r)| (*id, r.clone())));

        Ok(visible.into_values().collect())
    }

    /// Deletes every record currently visible to this transaction and returns how many there
    /// were.
    pub async fn delete_all(&mut self) -> Result<usize, StoreError> {
        let store = self.store.lock()?;

        let before = self.deleted.len();
        self.deleted.extend(store.ids());
        let removed = self.deleted.len() - before + self.created.len();
        self.created.clear();

        Ok(removed)
    }

    pub fn commit(mut self) -> Result<(), StoreError> {
        let mut store = self.store.lock()?;

        for id in &self.deleted {
            store.remove(*id);
        }
        for (id, reservation) in std::mem::take(&mut self.created) {
            store.insert(id, reservation);
        }
        let size = store.size();
        drop(store);

        self.finished = true;
        debug!(transaction_id = %self.id, size, "Transaction committed");

        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                transaction_id = %self.id,
                discarded = self.created.len(),
                "Transaction rolled back"
            );
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum StoreError {
    #[error("store error; the store is closed")]
    Closed,
    #[error("store error; the store lock is poisoned")]
    Poisoned,
    #[error("store error; record {id} is already persisted")]
    AlreadyPersisted { id: i32 },
}
