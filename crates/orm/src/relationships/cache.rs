//! Derived relation caches
//!
//! A non-local relation keeps the canonical keys of its related records (or
//! pivot rows) per instance. The entry is filled by a full scan on first
//! access and afterwards only moved by ADD/DELETE deltas.

use crate::model::StoreKey;

/// Kind of change delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delta {
    /// A record was inserted, or a foreign key now holds a new value
    Add,
    /// A record is about to be removed, or a foreign key is about to change
    Delete,
}

impl std::fmt::Display for Delta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delta::Add => write!(f, "ADD"),
            Delta::Delete => write!(f, "DELETE"),
        }
    }
}

/// Cached keys of one relation on one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedKeys {
    One(Option<StoreKey>),
    Many(Vec<StoreKey>),
}

impl CachedKeys {
    pub fn empty(many: bool) -> Self {
        if many {
            CachedKeys::Many(Vec::new())
        } else {
            CachedKeys::One(None)
        }
    }

    pub fn keys(&self) -> Vec<StoreKey> {
        match self {
            CachedKeys::One(key) => key.iter().cloned().collect(),
            CachedKeys::Many(keys) => keys.clone(),
        }
    }

    pub fn contains(&self, key: &StoreKey) -> bool {
        match self {
            CachedKeys::One(current) => current.as_ref() == Some(key),
            CachedKeys::Many(keys) => keys.contains(key),
        }
    }

    /// Apply a delta for `key`, returning whether the entry changed.
    ///
    /// A scalar entry is only cleared when it still holds `key`, so a stale
    /// DELETE never wipes a newer link.
    pub fn apply(&mut self, delta: Delta, key: &StoreKey) -> bool {
        match (self, delta) {
            (CachedKeys::Many(keys), Delta::Add) => {
                if keys.contains(key) {
                    return false;
                }
                keys.push(key.clone());
                true
            }
            (CachedKeys::Many(keys), Delta::Delete) => match keys.iter().position(|k| k == key) {
                Some(pos) => {
                    keys.remove(pos);
                    true
                }
                None => false,
            },
            (CachedKeys::One(slot), Delta::Add) => {
                if slot.as_ref() == Some(key) {
                    return false;
                }
                *slot = Some(key.clone());
                true
            }
            (CachedKeys::One(slot), Delta::Delete) => {
                if slot.as_ref() == Some(key) {
                    *slot = None;
                    true
                } else {
                    false
                }
            }
        }
    }
}
