//! Physical stacks of items.

use std::sync::Arc;

use crate::definition::ItemDefinition;

/// A physical stack of items: a shared definition plus a count.
///
/// The count is always clamped to `0..=definition.stack_size()`.
/// An instance with a count of zero is treated as absent by the [`Slot`](crate::inventory::Slot) that holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemInstance {
    definition: Arc<ItemDefinition>,
    count: u32,
}

impl ItemInstance {
    /// Creates a new stack, clamping `count` to the definition's stack size.
    pub fn new(definition: Arc<ItemDefinition>, count: u32) -> Self {
        let count = count.min(definition.stack_size());
        Self { definition, count }
    }

    /// The definition this stack is an instance of.
    pub fn definition(&self) -> &Arc<ItemDefinition> {
        &self.definition
    }

    /// The string ID of the definition.
    pub fn id(&self) -> &str {
        self.definition.id()
    }

    /// How many items are in this stack.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Sets the count, clamped to the stack size.
    pub fn set_count(&mut self, count: u32) {
        self.count = count.min(self.definition.stack_size());
    }

    /// How many more items fit in this stack.
    pub fn room(&self) -> u32 {
        self.definition.stack_size() - self.count
    }

    /// Returns true if the stack holds nothing.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Adds up to `amount` items, returning how many were actually added.
    pub fn add(&mut self, amount: u32) -> u32 {
        let added = amount.min(self.room());
        self.count += added;
        added
    }

    /// Removes up to `amount` items, returning how many were actually removed.
    pub fn remove(&mut self, amount: u32) -> u32 {
        let removed = amount.min(self.count);
        self.count -= removed;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn potion() -> Arc<ItemDefinition> {
        Arc::new(ItemDefinition::new("potion", "Potion").with_stack_size(10))
    }

    #[test]
    fn count_is_clamped() {
        let mut stack = ItemInstance::new(potion(), 25);
        assert_eq!(stack.count(), 10);

        stack.set_count(11);
        assert_eq!(stack.count(), 10);
    }

    #[test]
    fn add_and_remove_report_what_moved() {
        let mut stack = ItemInstance::new(potion(), 7);

        assert_eq!(stack.add(5), 3);
        assert_eq!(stack.count(), 10);
        assert_eq!(stack.room(), 0);

        assert_eq!(stack.remove(12), 10);
        assert!(stack.is_empty());
    }
}
