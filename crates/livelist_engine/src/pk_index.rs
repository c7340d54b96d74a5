//! Primary-key lookup within ordered sequences.

use crate::entity::{Entity, EntityKey, EntityRef};

/// Anything that carries a primary key.
pub trait Keyed {
    /// Returns the primary key.
    fn entity_key(&self) -> &EntityKey;
}

impl Keyed for Entity {
    fn entity_key(&self) -> &EntityKey {
        self.key()
    }
}

impl Keyed for EntityRef {
    fn entity_key(&self) -> &EntityKey {
        self.key()
    }
}

/// Returns the index of the item with `key`, scanning front to back.
pub fn position_of<T: Keyed>(items: &[T], key: &EntityKey) -> Option<usize> {
    items.iter().position(|item| item.entity_key() == key)
}

/// Returns the item with `key`.
pub fn find<'a, T: Keyed>(items: &'a [T], key: &EntityKey) -> Option<&'a T> {
    position_of(items, key).map(|idx| &items[idx])
}

/// Returns true if an item with `key` exists.
pub fn contains<T: Keyed>(items: &[T], key: &EntityKey) -> bool {
    position_of(items, key).is_some()
}
