//! Inventories are fixed-size arrays of [`Slot`]s, each holding at most one [`ItemInstance`].
//!
//! All mutation goes through the inventory's own methods (or through the [`InventoryManager`](crate::manager::InventoryManager),
//! which calls into them), so every change to a slot can be reported through the inventory's [`SlotNotifier`].

use bevy::ecs::{entity::Entity, event::Event};
use bevy::log::{debug, warn};
use bevy::utils::HashMap;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::CapabilityKind;
use crate::database::ItemDatabase;
use crate::definition::ItemDefinition;
use crate::instance::ItemInstance;

/// What an inventory is used for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryCategory {
    /// No particular purpose.
    #[default]
    Uncategorized,
    /// The player's own inventory.
    Player,
    /// Carried by a non-player character.
    Npc,
    /// A chest, barrel or similar.
    StorageContainer,
    /// A shop's stock.
    Merchant,
    /// Holds items for a quest.
    QuestItemHolder,
}

/// A single storage location.
///
/// A slot is empty if it has no instance, or its instance has a count of zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    instance: Option<ItemInstance>,
}

impl Slot {
    /// Creates a slot holding `instance`.
    pub fn new(instance: ItemInstance) -> Self {
        Self {
            instance: Some(instance),
        }
    }

    /// Returns true if the slot holds nothing.
    pub fn is_empty(&self) -> bool {
        self.instance
            .as_ref()
            .map_or(true, |instance| instance.is_empty())
    }

    /// The instance in this slot, unless the slot is empty.
    pub fn instance(&self) -> Option<&ItemInstance> {
        self.instance
            .as_ref()
            .filter(|instance| !instance.is_empty())
    }

    /// The item count in this slot; zero when empty.
    pub fn count(&self) -> u32 {
        self.instance().map_or(0, ItemInstance::count)
    }

    /// Returns true if the slot is non-empty and holds the item `id`.
    pub fn holds(&self, id: &str) -> bool {
        self.instance().is_some_and(|instance| instance.id() == id)
    }

    /// Empties the slot.
    pub fn clear(&mut self) {
        self.instance = None;
    }

    pub(crate) fn instance_mut(&mut self) -> Option<&mut ItemInstance> {
        self.instance
            .as_mut()
            .filter(|instance| !instance.is_empty())
    }
}

/// Sent once for every slot that an inventory operation changes.
///
/// The payload is a snapshot of the slot after the change.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct SlotUpdated {
    /// The owner of the inventory.
    pub owner: Entity,
    /// The index of the slot within the inventory.
    pub index: usize,
    /// The slot's new contents.
    pub slot: Slot,
}

/// The sending half of a slot-update channel, bound to one inventory owner.
#[derive(Debug, Clone)]
pub struct SlotNotifier {
    owner: Entity,
    sender: Sender<SlotUpdated>,
}

impl SlotNotifier {
    /// Creates a notifier that reports changes to `owner`'s inventory on `sender`.
    pub fn new(owner: Entity, sender: Sender<SlotUpdated>) -> Self {
        Self { owner, sender }
    }

    /// The owner reported in each [`SlotUpdated`].
    pub fn owner(&self) -> Entity {
        self.owner
    }

    fn send(&self, index: usize, slot: &Slot) {
        let update = SlotUpdated {
            owner: self.owner,
            index,
            slot: slot.clone(),
        };

        if self.sender.send(update).is_err() {
            debug!(
                "Slot update for {:?} dropped: the receiver is gone.",
                self.owner
            );
        }
    }
}

/// An error that can occur when manipulating inventories.
///
/// A failed operation never changes any slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Amounts must be positive.
    #[error("The amount must be greater than zero.")]
    InvalidAmount,
    /// The item ID is not in the catalog.
    #[error("No item with the ID '{0}' exists.")]
    UnknownItem(String),
    /// There are not enough of the item.
    #[error("Requested {requested} of '{id}', but only {available} are available.")]
    InsufficientStock {
        /// The item ID.
        id: String,
        /// How many were asked for.
        requested: u32,
        /// How many there are.
        available: u32,
    },
    /// The slot index is past the end of the inventory.
    #[error("Slot {index} is out of range for an inventory of {len} slots.")]
    SlotOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of slots.
        len: usize,
    },
    /// The slot holds nothing.
    #[error("Slot {0} is empty.")]
    EmptySlot(usize),
    /// No inventory is registered for the owner.
    #[error("No inventory is registered for {0:?}.")]
    UnknownOwner(Entity),
    /// The target inventory could not absorb the whole transfer.
    #[error("The target inventory has no room for {remainder} of '{id}'.")]
    TargetFull {
        /// The item ID.
        id: String,
        /// How many would not have fit.
        remainder: u32,
    },
}

/// A fixed number of item slots.
///
/// The slot count is fixed after creation; [`initialize`](Self::initialize) replaces the whole slot array.
///
/// ```
/// use leafwing_inventory::database::ItemDatabase;
/// use leafwing_inventory::definition::ItemDefinition;
/// use leafwing_inventory::inventory::{Inventory, InventoryCategory};
///
/// let database = ItemDatabase::from_definitions([
///     ItemDefinition::new("potion", "Potion").with_stack_size(10),
/// ]);
/// let mut inventory = Inventory::new(InventoryCategory::Player, 2);
///
/// // Only 20 potions fit, so 5 are handed back.
/// assert_eq!(inventory.add_item(&database, "potion", 25), 5);
/// assert!(inventory.remove_item("potion", 15).is_ok());
/// assert_eq!(inventory.item_count("potion"), 5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    category: InventoryCategory,
    slots: Vec<Slot>,
    notifier: Option<SlotNotifier>,
}

impl Inventory {
    /// Creates an inventory with `size` empty slots.
    pub fn new(category: InventoryCategory, size: usize) -> Self {
        Self {
            category,
            slots: vec![Slot::default(); size],
            notifier: None,
        }
    }

    /// Reports every slot change through `notifier`.
    pub fn with_notifier(mut self, notifier: SlotNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replaces (or removes) the notifier.
    pub fn set_notifier(&mut self, notifier: Option<SlotNotifier>) {
        self.notifier = notifier;
    }

    /// Resets the inventory to `size` empty slots.
    ///
    /// Any previous contents are discarded without notification.
    pub fn initialize(&mut self, category: InventoryCategory, size: usize) {
        self.category = category;
        self.slots = vec![Slot::default(); size];
    }

    /// What this inventory is used for.
    pub fn category(&self) -> InventoryCategory {
        self.category
    }

    /// The number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the inventory has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every slot, in order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The slot at `index`.
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Adds up to `amount` of the item `id`, and returns how many could not be placed.
    ///
    /// Existing stacks of the item are topped up first, in slot order.
    /// The rest spills into empty slots, in slot order, one full stack at a time.
    /// Partial placement is kept: a non-zero return value is the caller's signal that the inventory is full.
    ///
    /// Unknown items are not placed at all, and the full amount is returned.
    pub fn add_item(&mut self, database: &ItemDatabase, id: &str, amount: u32) -> u32 {
        if amount == 0 {
            return 0;
        }

        let Some(definition) = database.get(id) else {
            warn!("Cannot add unknown item '{id}'.");
            return amount;
        };

        let mut remaining = amount;

        for index in 0..self.slots.len() {
            if remaining == 0 {
                return 0;
            }

            let Some(instance) = self.slots[index]
                .instance_mut()
                .filter(|instance| instance.id() == id)
            else {
                continue;
            };

            let added = instance.add(remaining);
            if added > 0 {
                remaining -= added;
                self.notify(index);
            }
        }

        for index in 0..self.slots.len() {
            if remaining == 0 {
                return 0;
            }

            if !self.slots[index].is_empty() {
                continue;
            }

            let placed = remaining.min(definition.stack_size());
            self.slots[index] = Slot::new(ItemInstance::new(definition.clone(), placed));
            remaining -= placed;
            self.notify(index);
        }

        if remaining > 0 {
            debug!("Inventory is full: {remaining} of '{id}' could not be placed.");
        }
        remaining
    }

    /// Removes exactly `amount` of the item `id`, or nothing at all.
    ///
    /// Items are taken from the *last* matching slot first, so that recently started stacks empty out
    /// before the older, fuller stacks near the front of the inventory.
    /// Slots that reach zero are cleared.
    pub fn remove_item(&mut self, id: &str, amount: u32) -> Result<(), InventoryError> {
        if amount == 0 {
            return Err(InventoryError::InvalidAmount);
        }

        let available = self.item_count(id);
        if available < amount {
            return Err(InventoryError::InsufficientStock {
                id: id.to_string(),
                requested: amount,
                available,
            });
        }

        let mut needed = amount;
        for index in (0..self.slots.len()).rev() {
            if needed == 0 {
                break;
            }

            let slot = &mut self.slots[index];
            let Some(instance) = slot.instance_mut().filter(|instance| instance.id() == id) else {
                continue;
            };

            needed -= instance.remove(needed);
            if instance.is_empty() {
                slot.clear();
            }
            self.notify(index);
        }

        Ok(())
    }

    /// Removes up to `amount` items from a single slot, returning how many were removed.
    pub fn consume_from_slot(&mut self, index: usize, amount: u32) -> Result<u32, InventoryError> {
        if amount == 0 {
            return Err(InventoryError::InvalidAmount);
        }

        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(InventoryError::SlotOutOfRange { index, len })?;
        let instance = slot
            .instance_mut()
            .ok_or(InventoryError::EmptySlot(index))?;

        let removed = instance.remove(amount);
        if instance.is_empty() {
            slot.clear();
        }
        self.notify(index);

        Ok(removed)
    }

    /// The total count of the item `id`, across all slots.
    pub fn item_count(&self, id: &str) -> u32 {
        self.slots
            .iter()
            .filter(|slot| slot.holds(id))
            .map(Slot::count)
            .sum()
    }

    /// Returns true if there are at least `amount` of the item `id`.
    pub fn has_item(&self, id: &str, amount: u32) -> bool {
        self.item_count(id) >= amount
    }

    /// How many more of `definition` could be added before the inventory is full.
    pub fn free_capacity_for(&self, definition: &ItemDefinition) -> u32 {
        self.slots
            .iter()
            .map(|slot| match slot.instance() {
                None => definition.stack_size(),
                Some(instance) if instance.id() == definition.id() => instance.room(),
                Some(_) => 0,
            })
            .sum()
    }

    /// The first stack, in slot order, whose item has a capability of kind `kind`.
    pub fn first_item_with_capability(&self, kind: CapabilityKind) -> Option<&ItemInstance> {
        self.slots
            .iter()
            .filter_map(Slot::instance)
            .find(|instance| instance.definition().has_capability(kind))
    }

    /// Total counts, by item ID, of every item with a capability of kind `kind`.
    pub fn items_with_capability(&self, kind: CapabilityKind) -> HashMap<String, u32> {
        let mut counts = HashMap::default();

        for instance in self.slots.iter().filter_map(Slot::instance) {
            if instance.definition().has_capability(kind) {
                *counts.entry(instance.id().to_string()).or_insert(0) += instance.count();
            }
        }
        counts
    }

    /// Exchanges the contents of two slots in this inventory.
    pub fn swap_slots(&mut self, a: usize, b: usize) -> Result<(), InventoryError> {
        self.check_index(a)?;
        self.check_index(b)?;

        self.slots.swap(a, b);
        self.notify(a);
        if a != b {
            self.notify(b);
        }
        Ok(())
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<(), InventoryError> {
        if index < self.slots.len() {
            Ok(())
        } else {
            Err(InventoryError::SlotOutOfRange {
                index,
                len: self.slots.len(),
            })
        }
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    pub(crate) fn notify(&self, index: usize) {
        if let (Some(notifier), Some(slot)) = (&self.notifier, self.slots.get(index)) {
            notifier.send(index, slot);
        }
    }
}
