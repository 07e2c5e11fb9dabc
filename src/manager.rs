//! Tracks every live [`Inventory`], keyed by the entity that owns it.

use bevy::ecs::{entity::Entity, system::Resource};
use bevy::log::{debug, info, warn};
use bevy::utils::HashMap;

use crate::database::ItemDatabase;
use crate::inventory::{Inventory, InventoryCategory, InventoryError};

/// Points at one slot of one registered inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    /// The owner of the inventory.
    pub owner: Entity,
    /// The slot index.
    pub index: usize,
}

impl SlotRef {
    /// Creates a new slot reference.
    pub fn new(owner: Entity, index: usize) -> Self {
        Self { owner, index }
    }
}

/// The registry of live inventories, and the home of cross-inventory operations.
///
/// The most recently registered [`InventoryCategory::Player`] inventory is the primary inventory.
#[derive(Resource, Debug, Default)]
pub struct InventoryManager {
    inventories: HashMap<Entity, Inventory>,
    primary: Option<Entity>,
}

impl InventoryManager {
    /// Starts tracking `inventory` under `owner`.
    ///
    /// Returns `false`, and leaves the existing inventory in place, if `owner` already has one.
    pub fn register(&mut self, owner: Entity, inventory: Inventory) -> bool {
        if self.inventories.contains_key(&owner) {
            warn!("{owner:?} already has a registered inventory.");
            return false;
        }

        if inventory.category() == InventoryCategory::Player {
            info!("{owner:?} is now the primary inventory.");
            self.primary = Some(owner);
        }

        debug!(
            "Registered a {:?} inventory with {} slots for {owner:?}.",
            inventory.category(),
            inventory.len()
        );
        self.inventories.insert(owner, inventory);
        true
    }

    /// Stops tracking `owner`'s inventory, handing it back.
    pub fn unregister(&mut self, owner: Entity) -> Option<Inventory> {
        let removed = self.inventories.remove(&owner);

        if removed.is_some() && self.primary == Some(owner) {
            debug!("The primary inventory {owner:?} was unregistered.");
            self.primary = None;
        }
        removed
    }

    /// Returns true if `owner` has a registered inventory.
    pub fn contains(&self, owner: Entity) -> bool {
        self.inventories.contains_key(&owner)
    }

    /// The number of registered inventories.
    pub fn len(&self) -> usize {
        self.inventories.len()
    }

    /// Returns true if no inventories are registered.
    pub fn is_empty(&self) -> bool {
        self.inventories.is_empty()
    }

    /// The inventory owned by `owner`.
    pub fn get(&self, owner: Entity) -> Option<&Inventory> {
        self.inventories.get(&owner)
    }

    /// The inventory owned by `owner`, mutably.
    pub fn get_mut(&mut self, owner: Entity) -> Option<&mut Inventory> {
        self.inventories.get_mut(&owner)
    }

    /// The owner of the primary inventory, if there is one.
    pub fn primary_owner(&self) -> Option<Entity> {
        self.primary
    }

    /// The primary inventory.
    pub fn primary(&self) -> Option<&Inventory> {
        self.primary.and_then(|owner| self.inventories.get(&owner))
    }

    /// The primary inventory, mutably.
    pub fn primary_mut(&mut self) -> Option<&mut Inventory> {
        self.primary.and_then(|owner| self.inventories.get_mut(&owner))
    }

    /// Every registered inventory of the given category, in no particular order.
    pub fn inventories_by_category(
        &self,
        category: InventoryCategory,
    ) -> impl Iterator<Item = (Entity, &Inventory)> {
        self.inventories
            .iter()
            .filter(move |(_, inventory)| inventory.category() == category)
            .map(|(owner, inventory)| (*owner, inventory))
    }

    /// Every registered inventory, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &Inventory)> {
        self.inventories
            .iter()
            .map(|(owner, inventory)| (*owner, inventory))
    }

    /// Exchanges the contents of two slots, which may be in the same inventory or in different ones.
    ///
    /// Both slots are reported as updated.
    pub fn swap(&mut self, a: SlotRef, b: SlotRef) -> Result<(), InventoryError> {
        if a.owner == b.owner {
            return self
                .inventories
                .get_mut(&a.owner)
                .ok_or(InventoryError::UnknownOwner(a.owner))?
                .swap_slots(a.index, b.index);
        }

        let [first, second] = self.pair_mut(a.owner, b.owner)?;
        Self::swap_between(first, a.index, second, b.index)
    }

    /// Moves exactly `amount` of the item `id` from `source`'s inventory to `target`'s, or nothing at all.
    ///
    /// Moving items within a single inventory only checks that they are there.
    pub fn transfer(
        &mut self,
        database: &ItemDatabase,
        source: Entity,
        target: Entity,
        id: &str,
        amount: u32,
    ) -> Result<(), InventoryError> {
        if source == target {
            let inventory = self
                .inventories
                .get(&source)
                .ok_or(InventoryError::UnknownOwner(source))?;
            return check_stock(inventory, id, amount);
        }

        let [from, to] = self.pair_mut(source, target)?;
        Self::transfer_between(database, from, to, id, amount)
    }

    /// Exchanges slot `a_index` of `a` with slot `b_index` of `b`.
    pub fn swap_between(
        a: &mut Inventory,
        a_index: usize,
        b: &mut Inventory,
        b_index: usize,
    ) -> Result<(), InventoryError> {
        a.check_index(a_index)?;
        b.check_index(b_index)?;

        if let (Some(a_slot), Some(b_slot)) = (a.slot_mut(a_index), b.slot_mut(b_index)) {
            std::mem::swap(a_slot, b_slot);
        }

        a.notify(a_index);
        b.notify(b_index);
        Ok(())
    }

    /// Moves exactly `amount` of the item `id` from `source` to `target`, or nothing at all.
    ///
    /// The items are removed from `source` and added to `target`.
    /// If `target` cannot hold them all, whatever it did absorb is taken back out
    /// and the full amount is returned to `source`, leaving both per-item totals as they were.
    pub fn transfer_between(
        database: &ItemDatabase,
        source: &mut Inventory,
        target: &mut Inventory,
        id: &str,
        amount: u32,
    ) -> Result<(), InventoryError> {
        if !database.contains(id) {
            return Err(InventoryError::UnknownItem(id.to_string()));
        }
        check_stock(source, id, amount)?;

        source.remove_item(id, amount)?;
        let remainder = target.add_item(database, id, amount);
        if remainder == 0 {
            return Ok(());
        }

        let absorbed = amount - remainder;
        if absorbed > 0 {
            target.remove_item(id, absorbed)?;
        }

        let lost = source.add_item(database, id, amount);
        if lost > 0 {
            warn!("Rolling back a transfer of '{id}' could not return {lost} items to the source.");
        }

        debug!("Transfer of {amount} '{id}' rolled back: the target had room for {absorbed}.");
        Err(InventoryError::TargetFull {
            id: id.to_string(),
            remainder,
        })
    }

    fn pair_mut(&mut self, a: Entity, b: Entity) -> Result<[&mut Inventory; 2], InventoryError> {
        for owner in [a, b] {
            if !self.inventories.contains_key(&owner) {
                return Err(InventoryError::UnknownOwner(owner));
            }
        }

        self.inventories
            .get_many_mut([&a, &b])
            .ok_or(InventoryError::UnknownOwner(a))
    }
}

fn check_stock(inventory: &Inventory, id: &str, amount: u32) -> Result<(), InventoryError> {
    if amount == 0 {
        return Err(InventoryError::InvalidAmount);
    }

    let available = inventory.item_count(id);
    if available < amount {
        return Err(InventoryError::InsufficientStock {
            id: id.to_string(),
            requested: amount,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bevy::ecs::world::World;
    use crossbeam_channel::unbounded;

    use super::*;
    use crate::definition::ItemDefinition;
    use crate::inventory::{Slot, SlotNotifier};

    fn database() -> ItemDatabase {
        ItemDatabase::from_definitions([
            ItemDefinition::new("potion", "Potion").with_stack_size(10),
            ItemDefinition::new("sword", "Sword").with_stack_size(1),
        ])
    }

    fn owners<const N: usize>() -> [Entity; N] {
        let mut world = World::new();
        std::array::from_fn(|_| world.spawn_empty().id())
    }

    fn counts(inventory: &Inventory) -> Vec<u32> {
        inventory.slots().iter().map(Slot::count).collect()
    }

    #[test]
    fn the_latest_player_inventory_is_primary() {
        let [player, chest, second_player] = owners();
        let mut manager = InventoryManager::default();

        assert!(manager.register(player, Inventory::new(InventoryCategory::Player, 4)));
        assert!(manager.register(
            chest,
            Inventory::new(InventoryCategory::StorageContainer, 8)
        ));
        assert_eq!(manager.primary_owner(), Some(player));

        assert!(manager.register(second_player, Inventory::new(InventoryCategory::Player, 2)));
        assert_eq!(manager.primary_owner(), Some(second_player));
        assert_eq!(manager.primary().map(Inventory::len), Some(2));

        assert!(manager.unregister(second_player).is_some());
        assert!(manager.primary().is_none());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn duplicate_registration_keeps_the_original() {
        let [owner] = owners();
        let mut manager = InventoryManager::default();

        manager.register(owner, Inventory::new(InventoryCategory::Npc, 3));
        assert!(!manager.register(owner, Inventory::new(InventoryCategory::Npc, 9)));
        assert_eq!(manager.get(owner).map(Inventory::len), Some(3));
    }

    #[test]
    fn inventories_can_be_found_by_category() {
        let [shop, chest, other_chest] = owners();
        let mut manager = InventoryManager::default();
        manager.register(shop, Inventory::new(InventoryCategory::Merchant, 4));
        manager.register(chest, Inventory::new(InventoryCategory::StorageContainer, 4));
        manager.register(
            other_chest,
            Inventory::new(InventoryCategory::StorageContainer, 4),
        );

        let mut containers: Vec<_> = manager
            .inventories_by_category(InventoryCategory::StorageContainer)
            .map(|(owner, _)| owner)
            .collect();
        containers.sort();
        let mut expected = vec![chest, other_chest];
        expected.sort();

        assert_eq!(containers, expected);
        assert_eq!(
            manager
                .inventories_by_category(InventoryCategory::Player)
                .count(),
            0
        );
    }

    #[test]
    fn swapping_across_inventories_twice_restores_both() {
        let database = database();
        let [player, chest] = owners();
        let mut manager = InventoryManager::default();

        let mut backpack = Inventory::new(InventoryCategory::Player, 3);
        backpack.add_item(&database, "potion", 6);
        let mut storage = Inventory::new(InventoryCategory::StorageContainer, 3);
        storage.add_item(&database, "sword", 1);
        manager.register(player, backpack);
        manager.register(chest, storage);

        let a = SlotRef::new(player, 0);
        let b = SlotRef::new(chest, 2);
        manager.swap(a, b).unwrap();
        assert_eq!(counts(manager.get(player).unwrap()), [0, 0, 0]);
        assert_eq!(counts(manager.get(chest).unwrap()), [1, 0, 6]);

        manager.swap(a, b).unwrap();
        assert_eq!(counts(manager.get(player).unwrap()), [6, 0, 0]);
        assert_eq!(counts(manager.get(chest).unwrap()), [1, 0, 0]);
    }

    #[test]
    fn swapping_within_one_inventory() {
        let database = database();
        let [player] = owners();
        let mut manager = InventoryManager::default();
        let mut inventory = Inventory::new(InventoryCategory::Player, 2);
        inventory.add_item(&database, "sword", 1);
        manager.register(player, inventory);

        manager
            .swap(SlotRef::new(player, 0), SlotRef::new(player, 1))
            .unwrap();
        assert!(manager.get(player).unwrap().slot(1).unwrap().holds("sword"));
    }

    #[test]
    fn bad_swaps_change_nothing() {
        let database = database();
        let [player, chest, ghost] = owners();
        let mut manager = InventoryManager::default();
        let mut inventory = Inventory::new(InventoryCategory::Player, 2);
        inventory.add_item(&database, "potion", 3);
        manager.register(player, inventory);
        manager.register(chest, Inventory::new(InventoryCategory::StorageContainer, 2));

        assert_eq!(
            manager.swap(SlotRef::new(player, 0), SlotRef::new(chest, 5)),
            Err(InventoryError::SlotOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(
            manager.swap(SlotRef::new(player, 0), SlotRef::new(ghost, 0)),
            Err(InventoryError::UnknownOwner(ghost))
        );
        assert_eq!(counts(manager.get(player).unwrap()), [3, 0]);
    }

    #[test]
    fn swaps_report_both_slots() {
        let database = database();
        let [player, chest] = owners();
        let (sender, receiver) = unbounded();
        let mut manager = InventoryManager::default();

        let mut inventory = Inventory::new(InventoryCategory::Player, 2)
            .with_notifier(SlotNotifier::new(player, sender.clone()));
        inventory.add_item(&database, "potion", 2);
        manager.register(player, inventory);
        manager.register(
            chest,
            Inventory::new(InventoryCategory::StorageContainer, 2)
                .with_notifier(SlotNotifier::new(chest, sender)),
        );
        receiver.try_iter().count();

        manager
            .swap(SlotRef::new(player, 0), SlotRef::new(chest, 1))
            .unwrap();
        let updates: Vec<_> = receiver.try_iter().collect();

        assert_eq!(updates.len(), 2);
        assert_eq!((updates[0].owner, updates[0].index), (player, 0));
        assert!(updates[0].slot.is_empty());
        assert_eq!((updates[1].owner, updates[1].index), (chest, 1));
        assert_eq!(updates[1].slot.count(), 2);
    }

    #[test]
    fn transfer_moves_items() {
        let database = database();
        let [player, chest] = owners();
        let mut manager = InventoryManager::default();
        let mut inventory = Inventory::new(InventoryCategory::Player, 2);
        inventory.add_item(&database, "potion", 15);
        manager.register(player, inventory);
        manager.register(chest, Inventory::new(InventoryCategory::StorageContainer, 2));

        manager
            .transfer(&database, player, chest, "potion", 12)
            .unwrap();

        assert_eq!(manager.get(player).unwrap().item_count("potion"), 3);
        assert_eq!(manager.get(chest).unwrap().item_count("potion"), 12);
    }

    #[test]
    fn transfer_into_a_full_target_rolls_back() {
        let database = database();
        let [player, chest] = owners();
        let mut manager = InventoryManager::default();

        let mut inventory = Inventory::new(InventoryCategory::Player, 3);
        inventory.add_item(&database, "potion", 25);
        manager.register(player, inventory);

        let mut storage = Inventory::new(InventoryCategory::StorageContainer, 2);
        storage.add_item(&database, "sword", 1);
        storage.add_item(&database, "potion", 4);
        manager.register(chest, storage);

        assert_eq!(
            manager.transfer(&database, player, chest, "potion", 8),
            Err(InventoryError::TargetFull {
                id: "potion".into(),
                remainder: 2,
            })
        );

        assert_eq!(manager.get(player).unwrap().item_count("potion"), 25);
        assert_eq!(manager.get(chest).unwrap().item_count("potion"), 4);
        assert_eq!(manager.get(chest).unwrap().item_count("sword"), 1);
    }

    #[test]
    fn transfer_checks_stock_first() {
        let database = database();
        let [player, chest] = owners();
        let mut manager = InventoryManager::default();
        let mut inventory = Inventory::new(InventoryCategory::Player, 2);
        inventory.add_item(&database, "potion", 2);
        manager.register(player, inventory);
        manager.register(chest, Inventory::new(InventoryCategory::StorageContainer, 2));

        assert!(matches!(
            manager.transfer(&database, player, chest, "potion", 3),
            Err(InventoryError::InsufficientStock { available: 2, .. })
        ));
        assert_eq!(
            manager.transfer(&database, player, chest, "elixir", 1),
            Err(InventoryError::UnknownItem("elixir".into()))
        );
        assert_eq!(
            manager.transfer(&database, player, chest, "potion", 0),
            Err(InventoryError::InvalidAmount)
        );
        assert_eq!(manager.get(player).unwrap().item_count("potion"), 2);
        assert_eq!(manager.get(chest).unwrap().item_count("potion"), 0);
    }
}
