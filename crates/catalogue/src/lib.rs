//! In-memory catalogue store: the single owner of every catalogued item.
//!
//! Readers get copies, never references into the live collection. Writers replace a whole
//! item under the write lock, so a concurrent `query` sees either the old or the new item.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};
use shared::{
    domain::{Item, ItemId, ItemState},
    error::CatalogueError,
    lifecycle::Transition,
    protocol::{CatalogueEvent, ItemFilter},
};
use tokio::sync::broadcast;
use tracing::{info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct CatalogueStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<CatalogueEvent>,
}

#[derive(Default)]
struct Inner {
    items: Vec<Item>,
    positions: HashMap<ItemId, usize>,
}

impl Inner {
    fn push(&mut self, item: Item) -> Result<ItemId, CatalogueError> {
        let id = item.id();
        if self.positions.contains_key(&id) {
            return Err(CatalogueError::validation(format!(
                "item {id} is already catalogued"
            )));
        }
        self.positions.insert(id, self.items.len());
        self.items.push(item);
        Ok(id)
    }
}

impl Default for CatalogueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CatalogueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogueStore")
            .field("items", &self.len())
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

impl CatalogueStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    /// Seeds a store, keeping the iteration order as the natural query order.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Result<Self, CatalogueError> {
        let store = Self::new();
        {
            let mut inner = store.write();
            for item in items {
                inner.push(item)?;
            }
        }
        Ok(store)
    }

    pub fn insert(&self, item: Item) -> Result<ItemId, CatalogueError> {
        self.write().push(item)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogueEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: ItemId) -> Option<Item> {
        let inner = self.read();
        inner
            .positions
            .get(&id)
            .and_then(|&pos| inner.items.get(pos))
            .cloned()
    }

    /// Items matching every predicate of `filter`, in insertion order.
    pub fn query(&self, filter: &ItemFilter) -> Vec<Item> {
        let prepared = filter.prepare();
        self.read()
            .items
            .iter()
            .filter(|item| prepared.matches(item))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> Vec<Item> {
        self.read().items.clone()
    }

    pub fn apply_transition(
        &self,
        id: ItemId,
        transition: &Transition,
    ) -> Result<Item, CatalogueError> {
        let mut inner = self.write();
        self.apply_locked(&mut inner, id, transition)
    }

    /// Releases every hold whose deadline is at or before `now`, returning the released ids
    /// in insertion order. The scan and the swaps share one write guard.
    pub fn expire_holds(&self, now: DateTime<Utc>) -> Vec<ItemId> {
        let mut inner = self.write();
        let due: Vec<ItemId> = inner
            .items
            .iter()
            .filter(|item| item.is_hold_expired(now))
            .map(Item::id)
            .collect();

        let expire = Transition::ExpireHold { now };
        let mut expired = Vec::with_capacity(due.len());
        for id in due {
            if self.apply_locked(&mut inner, id, &expire).is_ok() {
                expired.push(id);
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "expired overdue holds");
        }
        expired
    }

    // Events go out while `inner` is still borrowed so subscribers see them in version order.
    fn apply_locked(
        &self,
        inner: &mut Inner,
        id: ItemId,
        transition: &Transition,
    ) -> Result<Item, CatalogueError> {
        let Some(pos) = inner.positions.get(&id).copied() else {
            return Err(CatalogueError::NotFound(id));
        };
        let Some(slot) = inner.items.get_mut(pos) else {
            return Err(CatalogueError::NotFound(id));
        };

        let from = slot.status();
        let updated = match slot.apply(transition) {
            Ok(next) => next,
            Err(error) => {
                warn!(item_id = %id, %error, "rejected catalogue transition");
                if let (
                    ItemState::OnHold {
                        patron: held_by, ..
                    },
                    Transition::Hold { patron, .. },
                ) = (slot.state(), transition)
                {
                    if held_by != patron {
                        warn!(
                            item_id = %id,
                            %held_by,
                            requested_by = %patron,
                            "duplicate hold found"
                        );
                        let _ = self.events.send(CatalogueEvent::DuplicateHoldFound {
                            item_id: id,
                            held_by: held_by.clone(),
                            requested_by: patron.clone(),
                            at: Utc::now(),
                        });
                    }
                }
                return Err(error);
            }
        };
        *slot = updated.clone();

        info!(
            item_id = %id,
            kind = %transition.kind(),
            %from,
            to = %updated.status(),
            version = updated.version(),
            "applied catalogue transition"
        );
        let _ = self.events.send(CatalogueEvent::TransitionApplied {
            item: updated.clone(),
            kind: transition.kind(),
            from,
            at: Utc::now(),
        });
        Ok(updated)
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
