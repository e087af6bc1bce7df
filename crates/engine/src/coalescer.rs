//! Debounced synchronization of one edited entity with its remote store.
//!
//! [`EntityCoalescer`] owns the state cell for a single entity and a worker
//! task that performs the remote updates:
//!
//! - `apply_change` merges an edit into the snapshot immediately and re-arms the
//!   quiet window;
//! - when the window elapses without further edits, the worker sends the fully
//!   merged snapshot to the store;
//! - only one update per entity is ever outstanding. Edits that arrive while an
//!   update is in flight are queued and flushed, with the latest merged state,
//!   once it resolves and their own window has elapsed.
//!
//! Save progress is published on a `watch` channel as [`UpdateStatus`]. Remote
//! failures become a `Failed` status and never roll back the snapshot. A
//! cancelled save is not reported; its edits are sent again after another
//! quiet window.
//!
//! Dropping the coalescer (or calling [`EntityCoalescer::close`]) cancels a
//! pending window. An update already in flight is left to finish, but its
//! result is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use otto_types::{ChangeSet, Entity, EntityId, UpdateStatus};
use tokio::sync::{Notify, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::SyncState;
use crate::store::{EntityStore, StoreError};

/// Quiet window used when none is configured.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(1000);

/// Tuning for an [`EntityCoalescer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerConfig {
    /// Delay after the last edit before the merged entity is persisted.
    pub quiet_window: Duration,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            quiet_window: DEFAULT_QUIET_WINDOW,
        }
    }
}

impl CoalescerConfig {
    pub fn with_quiet_window(quiet_window: Duration) -> Self {
        Self { quiet_window }
    }
}

struct Cell {
    state: SyncState,
    /// When the next flush may start; `None` when nothing is scheduled.
    deadline: Option<Instant>,
}

struct Shared {
    cell: Mutex<Cell>,
    wake: Notify,
    status: watch::Sender<UpdateStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Cell> {
        // The cell holds plain data; a panic elsewhere cannot leave it half-updated.
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps one locally edited entity in sync with an [`EntityStore`].
pub struct EntityCoalescer {
    id: EntityId,
    shared: Arc<Shared>,
    store: Arc<dyn EntityStore>,
    config: CoalescerConfig,
    cancellation_token: CancellationToken,
}

impl std::fmt::Debug for EntityCoalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCoalescer")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl EntityCoalescer {
    /// Start coalescing edits for `entity`, the last known server state.
    ///
    /// Spawns the flush worker on the current Tokio runtime; must be called
    /// from within one.
    pub fn spawn(entity: Entity, store: Arc<dyn EntityStore>, config: CoalescerConfig) -> Self {
        let id = entity.id.clone();
        let (status, _) = watch::channel(UpdateStatus::Idle);
        let shared = Arc::new(Shared {
            cell: Mutex::new(Cell {
                state: SyncState::new(entity),
                deadline: None,
            }),
            wake: Notify::new(),
            status,
        });
        let cancellation_token = CancellationToken::new();

        tokio::spawn(run_worker(
            id.clone(),
            Arc::clone(&shared),
            Arc::clone(&store),
            config,
            cancellation_token.child_token(),
        ));
        debug!(entity_id = %id, quiet_window_ms = config.quiet_window.as_millis() as u64, "coalescer started");

        Self {
            id,
            shared,
            store,
            config,
            cancellation_token,
        }
    }

    /// Read the entity from `store`, then start coalescing edits for it.
    pub async fn load(id: EntityId, store: Arc<dyn EntityStore>, config: CoalescerConfig) -> Result<Self, StoreError> {
        let entity = store.read(&id).await?;
        Ok(Self::spawn(entity, store, config))
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn config(&self) -> CoalescerConfig {
        self.config
    }

    /// Merge `changes` into the snapshot and schedule a debounced save.
    ///
    /// Returns the updated snapshot. Each call restarts the quiet window.
    pub fn apply_change(&self, changes: ChangeSet) -> Entity {
        self.apply_with_deadline(changes, Instant::now() + self.config.quiet_window)
    }

    /// Merge `changes` and save without waiting for the quiet window.
    pub fn apply_change_now(&self, changes: ChangeSet) -> Entity {
        self.apply_with_deadline(changes, Instant::now())
    }

    /// Collapse the remaining quiet window of a scheduled save.
    pub fn flush_now(&self) {
        let mut cell = self.shared.lock();
        if cell.deadline.is_some() {
            cell.deadline = Some(Instant::now());
            drop(cell);
            self.shared.wake.notify_one();
        }
    }

    fn apply_with_deadline(&self, changes: ChangeSet, deadline: Instant) -> Entity {
        if changes.is_empty() {
            return self.snapshot();
        }

        let mut cell = self.shared.lock();
        let snapshot = cell.state.apply(changes).clone();
        let now = Instant::now();
        cell.deadline = match cell.deadline {
            // An immediate save is already due; keep it due.
            Some(existing) if existing <= now => Some(existing),
            _ => Some(deadline),
        };
        drop(cell);

        self.shared.wake.notify_one();
        snapshot
    }

    /// Entity as currently shown to the user, including unsaved edits.
    pub fn snapshot(&self) -> Entity {
        self.shared.lock().state.snapshot().clone()
    }

    pub fn status(&self) -> UpdateStatus {
        self.shared.status.borrow().clone()
    }

    /// Receive every status transition.
    pub fn subscribe(&self) -> watch::Receiver<UpdateStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_updating(&self) -> bool {
        self.status().is_saving()
    }

    /// Completion time of the last successful save.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.status().saved_at()
    }

    /// Whether edits exist that the store has not confirmed yet.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.shared.lock().state.is_settled()
    }

    /// Refetch the entity and re-apply unconfirmed local edits on top.
    pub async fn refresh(&self) -> Result<Entity, StoreError> {
        let server = self.store.read(&self.id).await?;
        let mut cell = self.shared.lock();
        cell.state.replace_server(server);
        debug!(entity_id = %self.id, "refreshed entity from store");
        Ok(cell.state.snapshot().clone())
    }

    /// Wait until no edit is scheduled or in flight and return the final status.
    ///
    /// Edits left over from a failed save are not retried here; the returned
    /// status is then `Failed`.
    pub async fn settle(&self) -> Result<UpdateStatus, StoreError> {
        let mut status = self.shared.status.subscribe();
        loop {
            {
                let cell = self.shared.lock();
                let current = status.borrow_and_update().clone();
                let idle_worker = !cell.state.is_in_flight() && cell.deadline.is_none() && !current.is_saving();
                if idle_worker {
                    return Ok(current);
                }
            }
            tokio::select! {
                _ = self.cancellation_token.cancelled() => return Err(StoreError::Cancelled),
                changed = status.changed() => {
                    if changed.is_err() {
                        return Err(StoreError::Cancelled);
                    }
                }
            }
        }
    }

    /// Tear down: drop a pending save and discard the result of one in flight.
    pub fn close(&self) {
        if !self.cancellation_token.is_cancelled() {
            debug!(entity_id = %self.id, "closing coalescer");
            self.cancellation_token.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

impl Drop for EntityCoalescer {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_worker(
    id: EntityId,
    shared: Arc<Shared>,
    store: Arc<dyn EntityStore>,
    config: CoalescerConfig,
    cancellation_token: CancellationToken,
) {
    loop {
        let deadline = shared.lock().deadline;
        match deadline {
            None => {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = shared.wake.notified() => continue,
                }
            }
            Some(deadline) => {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = shared.wake.notified() => continue,
                    _ = time::sleep_until(deadline) => {}
                }
            }
        }

        let payload = {
            let mut cell = shared.lock();
            match cell.deadline {
                Some(due) if due <= Instant::now() => {
                    cell.deadline = None;
                    cell.state.begin_flush()
                }
                _ => None,
            }
        };
        let Some(payload) = payload else {
            continue;
        };

        flush(&id, &shared, store.as_ref(), payload, config, &cancellation_token).await;
        if cancellation_token.is_cancelled() {
            break;
        }
    }
    debug!(entity_id = %id, "coalescer worker stopped");
}

async fn flush(
    id: &EntityId,
    shared: &Shared,
    store: &dyn EntityStore,
    payload: Entity,
    config: CoalescerConfig,
    cancellation_token: &CancellationToken,
) {
    let previous = shared.status.send_replace(UpdateStatus::Saving);
    let started = Instant::now();
    debug!(entity_id = %id, fields = payload.fields().len(), "saving entity");

    let result = store.update(id, &payload).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if cancellation_token.is_cancelled() {
        debug!(entity_id = %id, elapsed_ms, "discarding update result after teardown");
        return;
    }

    match result {
        Ok(stored) => {
            shared.lock().state.complete_flush(stored);
            shared.status.send_replace(UpdateStatus::saved_now());
            info!(entity_id = %id, elapsed_ms, "entity saved");
        }
        Err(error) => match error.failure() {
            Some(failure) => {
                shared.lock().state.abandon_flush();
                warn!(entity_id = %id, elapsed_ms, error = %error, "entity save failed; keeping local edits");
                shared.status.send_replace(UpdateStatus::failed_now(failure));
            }
            None => {
                // The edits were never stored; send them again after another quiet window.
                {
                    let mut cell = shared.lock();
                    cell.state.abandon_flush();
                    cell.deadline.get_or_insert_with(|| Instant::now() + config.quiet_window);
                }
                debug!(entity_id = %id, "entity save cancelled; rescheduled");
                shared.status.send_replace(previous);
            }
        },
    }
}
