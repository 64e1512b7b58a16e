//! Live queries - re-run a read whenever a table it depends on changes
//!
//! Every committed mutation in [`Database`] publishes a [`Change`]. A
//! [`LiveQuery`] holds a [`QueryKey`] naming the tables (and optionally the
//! workout) it reads, and re-fetches only when a published change intersects
//! that key. Changes are published after commit, so a re-fetch always sees
//! the mutation that triggered it.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, trace};

use crate::db::{Database, StoreError};

/// Store handle shared between async tasks
pub type SharedStore = Arc<Mutex<Database>>;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Workouts,
    Exercises,
    PredefinedExercises,
    PredefinedWorkouts,
    AppState,
    PersonalRecords,
}

/// A committed write to one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub table: Table,
    /// Workout the write touched, `None` when it may touch any
    pub workout_id: Option<i64>,
}

impl Change {
    pub fn table(table: Table) -> Self {
        Self { table, workout_id: None }
    }

    pub fn workout(table: Table, workout_id: i64) -> Self {
        Self { table, workout_id: Some(workout_id) }
    }
}

/// What a live query reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKey {
    tables: Vec<Table>,
    workout_id: Option<i64>,
}

impl QueryKey {
    pub fn tables(tables: &[Table]) -> Self {
        Self { tables: tables.to_vec(), workout_id: None }
    }

    /// Narrow the key to rows of a single workout
    pub fn for_workout(mut self, workout_id: i64) -> Self {
        self.workout_id = Some(workout_id);
        self
    }

    pub fn matches(&self, change: &Change) -> bool {
        if !self.tables.contains(&change.table) {
            return false;
        }
        match (self.workout_id, change.workout_id) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }
}

/// Fan-out of change events, owned by the store
#[derive(Debug)]
pub struct ChangeHub {
    tx: broadcast::Sender<Change>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, change: Change) {
        trace!(?change, "publish");
        // No receivers is not an error
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

type Fetch<T> = Box<dyn Fn(&Database) -> Result<T, StoreError> + Send>;

/// A subscribed query; drop it to unsubscribe
pub struct LiveQuery<T> {
    key: QueryKey,
    rx: broadcast::Receiver<Change>,
    fetch: Fetch<T>,
}

impl<T> LiveQuery<T> {
    pub fn new<F>(db: &Database, key: QueryKey, fetch: F) -> Self
    where
        F: Fn(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        Self {
            key,
            rx: db.subscribe(),
            fetch: Box::new(fetch),
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Run the query now regardless of pending changes
    pub fn fetch(&self, db: &Database) -> Result<T, StoreError> {
        (self.fetch)(db)
    }

    /// Drain pending changes without blocking; re-fetch if any was relevant
    pub fn poll(&mut self, db: &Database) -> Result<Option<T>, StoreError> {
        let mut dirty = false;
        loop {
            match self.rx.try_recv() {
                Ok(change) => dirty |= self.key.matches(&change),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "live query lagged, refreshing");
                    dirty = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => return Err(StoreError::Closed),
            }
        }

        if dirty { self.fetch(db).map(Some) } else { Ok(None) }
    }

    /// Wait until a change intersecting this query's key is published
    pub async fn changed(&mut self) -> Result<(), StoreError> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.key.matches(&change) => return Ok(()),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "live query lagged, refreshing");
                    return Ok(());
                }
                Err(RecvError::Closed) => return Err(StoreError::Closed),
            }
        }
    }

    /// Wait for the next relevant change and return fresh results
    pub async fn next(&mut self, store: &SharedStore) -> Result<T, StoreError> {
        self.changed().await?;
        let db = store.lock().await;
        self.fetch(&db)
    }
}
