//! User selection tracking.
//!
//! The selection flag lives on the entity itself; the set keeps an
//! independent list of the selected handles so they can be enumerated
//! without scanning the live list. Selection requests may race with remote
//! deletes, so unknown keys are reported as [`SelectOutcome::Missing`]
//! instead of failing.

use crate::entity::{EntityKey, EntityRef};
use crate::pk_index;
use tracing::warn;

/// Result of a selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The selection state changed.
    Applied,
    /// The entity was already in the requested state.
    Unchanged,
    /// No entity with the key exists; nothing was done.
    Missing,
}

impl SelectOutcome {
    /// Returns true unless the key was missing.
    pub fn is_found(&self) -> bool {
        !matches!(self, SelectOutcome::Missing)
    }
}

/// Handles of the currently selected entities.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    selected: Vec<EntityRef>,
}

impl SelectionSet {
    /// Creates an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the entity with `key` selected.
    pub fn select(&mut self, items: &[EntityRef], key: &EntityKey) -> SelectOutcome {
        let Some(item) = pk_index::find(items, key) else {
            warn!(%key, "cannot select entity: not in the collection");
            return SelectOutcome::Missing;
        };
        let was_selected = item.is_selected();
        item.set_selected(true);
        if !pk_index::contains(&self.selected, key) {
            self.selected.push(item.clone());
        }
        if was_selected {
            SelectOutcome::Unchanged
        } else {
            SelectOutcome::Applied
        }
    }

    /// Clears the selection mark of the entity with `key`.
    pub fn unselect(&mut self, items: &[EntityRef], key: &EntityKey) -> SelectOutcome {
        let Some(item) = pk_index::find(items, key) else {
            warn!(%key, "cannot unselect entity: not in the collection");
            return SelectOutcome::Missing;
        };
        let was_selected = item.is_selected();
        item.set_selected(false);
        if let Some(idx) = pk_index::position_of(&self.selected, key) {
            self.selected.remove(idx);
        }
        if was_selected {
            SelectOutcome::Applied
        } else {
            SelectOutcome::Unchanged
        }
    }

    /// Returns true if the entity with `key` is selected.
    ///
    /// Unknown keys are not selected.
    pub fn is_selected(&self, items: &[EntityRef], key: &EntityKey) -> bool {
        match pk_index::find(items, key) {
            Some(item) => item.is_selected(),
            None => {
                warn!(%key, "selection queried for entity not in the collection");
                false
            }
        }
    }

    /// Returns the selected handles in selection order.
    pub fn selected(&self) -> &[EntityRef] {
        &self.selected
    }

    /// Drops `key` from the selection, clearing its flag.
    ///
    /// Used when the entity leaves the live list.
    pub fn remove(&mut self, key: &EntityKey) -> bool {
        match pk_index::position_of(&self.selected, key) {
            Some(idx) => {
                let item = self.selected.remove(idx);
                item.set_selected(false);
                true
            }
            None => false,
        }
    }

    /// Returns the number of selected entities.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Returns true if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Returns true if any entity in `items` carries the selection flag.
pub fn any_selected(items: &[EntityRef]) -> bool {
    items.iter().any(EntityRef::is_selected)
}
