//! Shared types for the Otto console: editable entities, change sets, save
//! status, resource kinds and the static model-provider tables.

pub mod entity;
pub mod model_provider;
pub mod resource;
pub mod status;
pub mod workflow;

pub use entity::{ChangeSet, Entity, EntityId, ID_FIELD, ParseEntityIdError};
pub use model_provider::{ModelProviderId, ModelProviderInfo, UnknownModelProvider};
pub use resource::ResourceKind;
pub use status::{SaveFailure, SaveFailureKind, UpdateStatus};
