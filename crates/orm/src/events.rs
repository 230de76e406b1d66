//! Per-instance event primitives (`on`/`off`/`emit`)

use crate::model::Entity;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEvent {
    /// Emitted first by `delete`; a listener returning `false` vetoes it
    Delete,
    /// Emitted after the instance left its store
    Deleted,
    /// Emitted after the instance was inserted into its store
    Saved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener callback; the return value only matters for vetoable events
pub type Listener = Rc<dyn Fn(&Entity) -> bool>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    handlers: Vec<(ListenerId, EntityEvent, Listener)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, event: EntityEvent, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, event, listener));
        id
    }

    pub(crate) fn remove(&mut self, event: EntityEvent, id: ListenerId) -> bool {
        let before = self.handlers.len();
        self.handlers
            .retain(|(handler_id, handler_event, _)| !(*handler_id == id && *handler_event == event));
        self.handlers.len() != before
    }

    pub(crate) fn snapshot(&self, event: EntityEvent) -> Vec<Listener> {
        self.handlers
            .iter()
            .filter(|(_, handler_event, _)| *handler_event == event)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }
}
