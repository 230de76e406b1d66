//! Model System - instances, keys, stores and the registry that owns them
//!
//! - `primary_key`: key values, key names and canonical store keys
//! - `entity`: shared handles to model instances
//! - `store`: per-model identity map
//! - `registry`: schemas, stores and subscriber indexes of every model
//! - `crud_operations`: make, save, fill and delete
//! - `query_methods`: scans and filters over a store

pub mod crud_operations;
pub mod entity;
pub mod primary_key;
pub mod query_methods;
pub mod registry;
pub mod store;

pub use crud_operations::{BeforeDelete, DeleteOptions};
pub use entity::Entity;
pub use primary_key::{Key, KeyName, KeyValue, StoreKey};
pub use query_methods::Condition;
pub(crate) use registry::ModelEntry;
pub use registry::{ModelId, ModelRegistry, ModelSchema};
pub use store::EntityStore;
