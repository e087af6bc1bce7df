//! Snapshot bookkeeping for one edited entity.
//!
//! The visible snapshot is always `server ⊕ in_flight ⊕ pending`:
//!
//! - `server`: last state confirmed by the remote store
//! - `in_flight`: changes carried by the update currently outstanding
//! - `pending`: changes applied locally since that update was dispatched
//!
//! [`SyncState`] holds no timers or handles; the coalescer drives it.

use otto_types::{ChangeSet, Entity, EntityId};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SyncState {
    server: Entity,
    in_flight: Option<ChangeSet>,
    pending: ChangeSet,
    snapshot: Entity,
}

impl SyncState {
    pub fn new(server: Entity) -> Self {
        Self {
            snapshot: server.clone(),
            server,
            in_flight: None,
            pending: ChangeSet::new(),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.server.id
    }

    /// Entity as the user currently sees it.
    pub fn snapshot(&self) -> &Entity {
        &self.snapshot
    }

    /// Last state confirmed by the store.
    pub fn server(&self) -> &Entity {
        &self.server
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// No local edit is waiting or travelling.
    pub fn is_settled(&self) -> bool {
        !self.has_pending() && !self.is_in_flight()
    }

    /// Fold `changes` over the previous merge result.
    pub fn apply(&mut self, changes: ChangeSet) -> &Entity {
        self.snapshot.merge(&changes);
        self.pending.absorb(changes);
        &self.snapshot
    }

    /// Move pending changes in flight and return the payload to send.
    ///
    /// Returns `None` when there is nothing to send or an update is already
    /// outstanding.
    pub fn begin_flush(&mut self) -> Option<Entity> {
        if self.in_flight.is_some() || self.pending.is_empty() {
            return None;
        }
        self.in_flight = Some(std::mem::take(&mut self.pending));
        Some(self.snapshot.clone())
    }

    /// Record the stored representation returned by a successful update.
    pub fn complete_flush(&mut self, stored: Entity) {
        self.in_flight = None;
        self.server = self.keep_id(stored);
        self.rebuild_snapshot();
    }

    /// Return the in-flight changes to pending after a failed or dropped update.
    ///
    /// The snapshot is unchanged; the edits ride along with the next flush.
    pub fn abandon_flush(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            let later = std::mem::take(&mut self.pending);
            self.pending = in_flight.then(later);
        }
    }

    /// Replace the server state after a refetch, keeping unconfirmed edits on top.
    pub fn replace_server(&mut self, server: Entity) {
        self.server = self.keep_id(server);
        self.rebuild_snapshot();
    }

    /// The edited entity's id wins over whatever id the store echoes back.
    fn keep_id(&self, mut server: Entity) -> Entity {
        if server.id != self.server.id {
            warn!(entity_id = %self.server.id, returned_id = %server.id, "store returned a different id; keeping ours");
            server.id = self.server.id.clone();
        }
        server
    }

    fn rebuild_snapshot(&mut self) {
        let mut snapshot = self.server.clone();
        if let Some(in_flight) = &self.in_flight {
            snapshot.merge(in_flight);
        }
        snapshot.merge(&self.pending);
        self.snapshot = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> SyncState {
        SyncState::new(Entity::from_json(json!({"id": "w1", "name": "A"})).unwrap())
    }

    #[test]
    fn apply_folds_over_the_previous_result() {
        let mut state = state();
        state.apply(ChangeSet::new().set("name", "B"));
        let snapshot = state.apply(ChangeSet::new().set("tools", json!(["x"]))).clone();

        assert_eq!(snapshot.to_json(), json!({"id": "w1", "name": "B", "tools": ["x"]}));
        assert!(state.has_pending());
    }

    #[test]
    fn begin_flush_sends_the_merged_snapshot_once() {
        let mut state = state();
        state.apply(ChangeSet::new().set("name", "B"));

        let payload = state.begin_flush().expect("payload");
        assert_eq!(payload.to_json(), json!({"id": "w1", "name": "B"}));
        assert!(state.is_in_flight());
        assert!(state.begin_flush().is_none(), "no second flush while one is outstanding");
    }

    #[test]
    fn nothing_to_flush_without_edits() {
        assert!(state().begin_flush().is_none());
    }

    #[test]
    fn edits_during_flight_survive_completion() {
        let mut state = state();
        state.apply(ChangeSet::new().set("name", "B"));
        let payload = state.begin_flush().unwrap();
        state.apply(ChangeSet::new().set("description", "late"));

        let mut stored = payload.clone();
        stored.merge(&ChangeSet::new().set("revision", 2));
        state.complete_flush(stored);

        assert_eq!(
            state.snapshot().to_json(),
            json!({"id": "w1", "name": "B", "revision": 2, "description": "late"})
        );
        assert!(state.has_pending());
        assert!(!state.is_in_flight());
    }

    #[test]
    fn abandoned_flush_keeps_snapshot_and_requeues_changes() {
        let mut state = state();
        state.apply(ChangeSet::new().set("name", "B"));
        state.begin_flush().unwrap();
        state.apply(ChangeSet::new().set("name", "C"));
        let before = state.snapshot().clone();

        state.abandon_flush();

        assert_eq!(state.snapshot(), &before);
        let retry = state.begin_flush().unwrap();
        assert_eq!(retry.get("name"), Some(&json!("C")));
    }

    #[test]
    fn refetch_keeps_unconfirmed_edits_on_top() {
        let mut state = state();
        state.apply(ChangeSet::new().set("name", "B"));
        state.replace_server(Entity::from_json(json!({"id": "w1", "name": "server", "description": "d"})).unwrap());

        assert_eq!(state.snapshot().to_json(), json!({"id": "w1", "name": "B", "description": "d"}));
        assert_eq!(state.server().get("name"), Some(&json!("server")));
    }

    #[test]
    fn settled_after_successful_flush() {
        let mut state = state();
        state.apply(ChangeSet::new().set("name", "B"));
        let payload = state.begin_flush().unwrap();
        assert!(!state.is_settled());
        state.complete_flush(payload);
        assert!(state.is_settled());
    }

    #[test]
    fn stored_entity_with_another_id_is_not_rekeyed() {
        let mut state = state();
        state.apply(ChangeSet::new().set("name", "B"));
        state.begin_flush().unwrap();

        state.complete_flush(Entity::from_json(json!({"id": "w2", "name": "B"})).unwrap());

        assert_eq!(state.id().as_str(), "w1");
        assert_eq!(state.snapshot().to_json(), json!({"id": "w1", "name": "B"}));
    }
}
