//! Remote entity store contract and its implementations.
//!
//! The coalescer only needs `read` and `update` by id. [`HttpEntityStore`]
//! forwards both to the Otto REST API; [`InMemoryEntityStore`] keeps entities in
//! a map and is used for offline runs and tests.

use std::collections::HashMap;
use std::sync::Arc;

use otto_api::{ApiError, OttoClient};
use otto_types::{Entity, EntityId, ResourceKind, SaveFailure, SaveFailureKind};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Failure reported by an [`EntityStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Transient transport failure.
    #[error("network error: {message}")]
    Network { message: String },

    /// The store rejected the payload.
    #[error("rejected by server ({status}): {message}")]
    Validation { status: u16, message: String },

    #[error("entity not found: {id}")]
    NotFound { id: EntityId },

    /// The operation was superseded or its owner was torn down.
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn validation(status: u16, message: impl Into<String>) -> Self {
        Self::Validation {
            status,
            message: message.into(),
        }
    }

    /// Status-facing form of this error. `Cancelled` is never surfaced.
    pub fn failure(&self) -> Option<SaveFailure> {
        let kind = match self {
            Self::Network { .. } => SaveFailureKind::Network,
            Self::Validation { .. } => SaveFailureKind::Validation,
            Self::NotFound { .. } => SaveFailureKind::NotFound,
            Self::Cancelled => return None,
        };
        Some(SaveFailure::new(kind, self.to_string()))
    }

    /// Classify an API failure for the entity `id`.
    pub fn from_api(id: &EntityId, error: ApiError) -> Self {
        match &error {
            ApiError::Transport { .. } => Self::network(error.to_string()),
            ApiError::Status { status, body, .. } => {
                if *status == StatusCode::NOT_FOUND {
                    Self::NotFound { id: id.clone() }
                } else if error.is_transient() {
                    Self::network(error.to_string())
                } else {
                    Self::validation(status.as_u16(), body.clone())
                }
            }
            ApiError::Decode { .. } => Self::validation(StatusCode::OK.as_u16(), error.to_string()),
        }
    }
}

/// Create/read/update access to remote entities of one kind.
#[async_trait::async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch the current server state of an entity.
    async fn read(&self, id: &EntityId) -> Result<Entity, StoreError>;

    /// Persist `entity` and return the stored representation.
    async fn update(&self, id: &EntityId, entity: &Entity) -> Result<Entity, StoreError>;
}

/// [`EntityStore`] backed by the Otto REST API.
#[derive(Debug, Clone)]
pub struct HttpEntityStore {
    client: OttoClient,
    kind: ResourceKind,
}

impl HttpEntityStore {
    pub fn new(client: OttoClient, kind: ResourceKind) -> Self {
        Self { client, kind }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn decode(&self, id: &EntityId, value: serde_json::Value) -> Result<Entity, StoreError> {
        Entity::from_json(value).map_err(|error| {
            StoreError::validation(
                StatusCode::OK.as_u16(),
                format!("{} {} returned an unexpected payload: {error}", self.kind.singular(), id),
            )
        })
    }
}

#[async_trait::async_trait]
impl EntityStore for HttpEntityStore {
    async fn read(&self, id: &EntityId) -> Result<Entity, StoreError> {
        let value = self
            .client
            .get_resource(self.kind, id.as_str())
            .await
            .map_err(|error| StoreError::from_api(id, error))?;
        self.decode(id, value)
    }

    async fn update(&self, id: &EntityId, entity: &Entity) -> Result<Entity, StoreError> {
        debug!(kind = %self.kind, entity_id = %id, fields = entity.fields().len(), "updating entity");
        let value = self
            .client
            .update_resource(self.kind, id.as_str(), &entity.to_json())
            .await
            .map_err(|error| StoreError::from_api(id, error))?;
        // Some endpoints answer 204; the payload we sent is then the stored state.
        if value.is_null() {
            return Ok(entity.clone());
        }
        self.decode(id, value)
    }
}

/// Map-backed [`EntityStore`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityStore {
    entities: Arc<Mutex<HashMap<EntityId, Entity>>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with entities.
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let map = entities.into_iter().map(|entity| (entity.id.clone(), entity)).collect();
        Self {
            entities: Arc::new(Mutex::new(map)),
        }
    }

    pub async fn insert(&self, entity: Entity) {
        self.entities.lock().await.insert(entity.id.clone(), entity);
    }

    pub async fn get(&self, id: &EntityId) -> Option<Entity> {
        self.entities.lock().await.get(id).cloned()
    }
}

#[async_trait::async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn read(&self, id: &EntityId) -> Result<Entity, StoreError> {
        self.get(id).await.ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    async fn update(&self, id: &EntityId, entity: &Entity) -> Result<Entity, StoreError> {
        let mut entities = self.entities.lock().await;
        let Some(stored) = entities.get_mut(id) else {
            return Err(StoreError::NotFound { id: id.clone() });
        };
        *stored = entity.clone();
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(value: &str) -> EntityId {
        EntityId::new(value).unwrap()
    }

    fn status_error(status: StatusCode) -> ApiError {
        ApiError::Status {
            status,
            url: "http://localhost/api/workflows/w1".into(),
            body: "name is required".into(),
        }
    }

    #[test]
    fn api_errors_map_to_store_taxonomy() {
        let w1 = id("w1");
        assert_eq!(StoreError::from_api(&w1, status_error(StatusCode::NOT_FOUND)), StoreError::NotFound { id: w1.clone() });
        assert!(matches!(
            StoreError::from_api(&w1, status_error(StatusCode::SERVICE_UNAVAILABLE)),
            StoreError::Network { .. }
        ));
        assert_eq!(
            StoreError::from_api(&w1, status_error(StatusCode::UNPROCESSABLE_ENTITY)),
            StoreError::validation(422, "name is required")
        );
    }

    #[test]
    fn cancelled_is_never_surfaced() {
        assert!(StoreError::Cancelled.failure().is_none());
        let failure = StoreError::network("connection reset").failure().unwrap();
        assert_eq!(failure.kind, SaveFailureKind::Network);
        assert!(failure.message.contains("connection reset"));
    }

    #[tokio::test]
    async fn in_memory_store_reads_and_updates() {
        let entity = Entity::from_json(json!({"id": "w1", "name": "A"})).unwrap();
        let store = InMemoryEntityStore::with_entities([entity.clone()]);

        assert_eq!(store.read(&id("w1")).await.unwrap(), entity);

        let renamed = Entity::from_json(json!({"id": "w1", "name": "B"})).unwrap();
        assert_eq!(store.update(&id("w1"), &renamed).await.unwrap(), renamed);
        assert_eq!(store.get(&id("w1")).await, Some(renamed));
    }

    #[tokio::test]
    async fn in_memory_store_reports_missing_entities() {
        let store = InMemoryEntityStore::new();
        let missing = Entity::new(id("w9"));
        assert_eq!(store.read(&id("w9")).await, Err(StoreError::NotFound { id: id("w9") }));
        assert_eq!(store.update(&id("w9"), &missing).await, Err(StoreError::NotFound { id: id("w9") }));
    }
}
