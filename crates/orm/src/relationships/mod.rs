//! Relationships Module - relation descriptors and the engine keeping them
//! current
//!
//! Local relations (belongs-to, has-many-by) are answered from keys on the
//! instance itself. The others keep a derived cache of related keys, built
//! by a scan on first access and then updated through the subscriber index
//! of the scanned model as records are saved, rewritten and deleted.

pub mod assign;
pub mod cache;
pub mod metadata;
pub mod ordering;
pub mod pivot;
pub mod resolve;
pub mod subscribers;

pub use cache::{CachedKeys, Delta};
pub use metadata::{
    camel_case, upper_first, Comparator, Direction, PivotLink, Relation, RelationKind,
    RelationOrder,
};
pub use ordering::{apply_order, compare_values};
pub use pivot::{pivot_columns, pivot_definition, pivot_name, pivot_sides, PivotSide};
pub use resolve::Related;
pub use subscribers::{Subscriber, SubscriberIndex};
