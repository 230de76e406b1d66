//! # entigraph-orm: In-memory object graph for entigraph
//!
//! Models are declared as a [`Schema`] and booted into a [`ModelRegistry`],
//! which keeps one canonical [`Entity`] per model and key and answers
//! relation reads from derived caches kept current on every write.
//!
//! ```
//! use entigraph_orm::{Field, ModelDef, Schema};
//! use serde_json::json;
//!
//! let mut registry = Schema::new()
//!     .model(ModelDef::new("User").field("name", Field::string()).has_many("posts", "Post"))
//!     .model(ModelDef::new("Post").field("title", Field::string()).belongs_to("user", "User"))
//!     .boot()?;
//!
//! let user = registry.create("User", json!({ "id": "u1", "name": "Ada" }))?;
//! registry.create("Post", json!({ "id": "p1", "title": "Hello", "userId": "u1" }))?;
//!
//! assert_eq!(registry.related_many(&user, "posts")?.len(), 1);
//! # Ok::<(), entigraph_orm::ModelError>(())
//! ```

pub mod error;
pub mod events;
pub mod field;
pub mod model;
pub mod observers;
pub mod relationships;
pub mod schema;

#[cfg(test)]
mod tests;

// Re-export core types
pub use error::*;
pub use events::{EntityEvent, ListenerId};
pub use field::{Field, FieldKind};
pub use model::*;
pub use observers::{ObserverRegistry, StoreObserver};
pub use relationships::{CachedKeys, Delta, Direction, Related, Relation, RelationKind};
pub use schema::{ModelDef, RelationDef, RelationDefKind, Schema};

pub use entigraph_core::StoreConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
