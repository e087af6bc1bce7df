//! # Otto Engine
//!
//! Keeps locally edited entities (workflows, agents) in sync with the Otto
//! API without flooding it with requests or losing edits.
//!
//! ## Key Features
//!
//! - **Immediate local merge**: edits are folded into the in-memory snapshot synchronously
//! - **Coalesced saves**: edits within one quiet window produce a single update
//! - **Serialized flushes**: never more than one update in flight per entity
//! - **Status feed**: `Idle` / `Saving` / `Saved` / `Failed` published over a `watch` channel
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use otto_engine::{CoalescerConfig, EntityCoalescer, InMemoryEntityStore};
//! use otto_types::{ChangeSet, Entity, EntityId};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let id = EntityId::new("w1")?;
//! let store = InMemoryEntityStore::with_entities([Entity::new(id.clone())]);
//! let coalescer = EntityCoalescer::load(id, Arc::new(store), CoalescerConfig::default()).await?;
//!
//! coalescer.apply_change(ChangeSet::new().set("name", "Nightly report"));
//! let status = coalescer.settle().await?;
//! println!("{}", status.indicator());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`state`**: pure snapshot bookkeeping (server state, in-flight and pending changes)
//! - **`coalescer`**: debounce timer, flush worker and status publication
//! - **`store`**: the remote store contract plus HTTP and in-memory implementations

pub mod coalescer;
pub mod state;
pub mod store;

pub use coalescer::{CoalescerConfig, DEFAULT_QUIET_WINDOW, EntityCoalescer};
pub use state::SyncState;
pub use store::{EntityStore, HttpEntityStore, InMemoryEntityStore, StoreError};
