//! The Bevy plugin that ties the item database, handlers and inventories into an app.

use bevy::app::{App, Plugin, Startup, Update};
use bevy::ecs::prelude::*;
use bevy::ecs::system::SystemState;
use bevy::log::{debug, error, warn};
use bevy::time::Time;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::capability::CapabilityKind;
use crate::database::ItemDatabase;
use crate::handler::{CollisionPolicy, HandlerRegistry, UseContext};
use crate::handlers::{tick_active_restores, tick_cooldowns, ItemCooldowns};
use crate::inventory::{Slot, SlotNotifier, SlotUpdated};
use crate::manager::InventoryManager;

/// A plugin that wires the item database, handler registry and inventories into a Bevy app.
///
/// Insert your [`ItemDatabase`] (for example with [`ItemDatabase::from_raw`]) before the app's first update:
/// it is validated against the [`HandlerRegistry`] during [`Startup`].
///
/// Extra handlers can be added by inserting a [`HandlerRegistry`] resource *before* this plugin is added;
/// the plugin will then leave that registry as it is.
#[derive(Debug, Clone)]
pub struct InventoryPlugin {
    /// What happens when two handlers are registered for the same capability kind.
    ///
    /// Defaults to [`CollisionPolicy::FirstRegisteredWins`].
    pub collision_policy: CollisionPolicy,
    /// If true, the built-in [`ConsumableHandler`](crate::handlers::ConsumableHandler)
    /// and [`UseItemHandler`](crate::handlers::UseItemHandler) are registered.
    ///
    /// Defaults to `true`.
    pub register_default_handlers: bool,
    /// If true, slot changes sent through the [`SlotUpdateChannel`] are re-sent as [`SlotUpdated`] events every frame.
    /// If false, you must drain [`SlotUpdateChannel::receiver`] yourself.
    ///
    /// Defaults to `true`.
    pub forward_slot_updates: bool,
}

impl Default for InventoryPlugin {
    fn default() -> Self {
        Self {
            collision_policy: CollisionPolicy::default(),
            register_default_handlers: true,
            forward_slot_updates: true,
        }
    }
}

impl Plugin for InventoryPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<HandlerRegistry>() {
            let mut registry =
                HandlerRegistry::default().with_collision_policy(self.collision_policy);
            if self.register_default_handlers {
                registry = registry.with_default_handlers();
            }
            app.insert_resource(registry);
        }

        app.init_resource::<ItemDatabase>()
            .init_resource::<InventoryManager>()
            .init_resource::<SlotUpdateChannel>()
            .add_event::<SlotUpdated>()
            .add_event::<UseItemRequest>()
            .add_event::<ItemUsed>()
            .add_systems(Startup, initialize_item_database)
            .add_systems(Update, handle_use_item_requests)
            .add_systems(
                Update,
                (tick_cooldowns, tick_active_restores).run_if(resource_exists::<Time>),
            );

        if self.forward_slot_updates {
            app.add_systems(
                Update,
                forward_slot_updates.after(handle_use_item_requests),
            );
        }
    }
}

/// The channel that inventories report their slot changes on.
///
/// Give each inventory a notifier with [`SlotUpdateChannel::notifier`] when you create it.
#[derive(Resource, Debug, Clone)]
pub struct SlotUpdateChannel {
    sender: Sender<SlotUpdated>,
    receiver: Receiver<SlotUpdated>,
}

impl Default for SlotUpdateChannel {
    fn default() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }
}

impl SlotUpdateChannel {
    /// A notifier that reports changes to `owner`'s inventory on this channel.
    pub fn notifier(&self, owner: Entity) -> SlotNotifier {
        SlotNotifier::new(owner, self.sender.clone())
    }

    /// The receiving half of the channel.
    pub fn receiver(&self) -> &Receiver<SlotUpdated> {
        &self.receiver
    }
}

/// Asks for the item in `slot` of `owner`'s inventory to be used on `target`.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseItemRequest {
    /// The entity using the item, which must have a registered inventory.
    pub owner: Entity,
    /// The slot holding the item.
    pub slot: usize,
    /// The entity the item is used on. This is often the owner.
    pub target: Entity,
}

impl UseItemRequest {
    /// A request for `owner` to use the item in `slot` on themselves.
    pub fn on_self(owner: Entity, slot: usize) -> Self {
        Self {
            owner,
            slot,
            target: owner,
        }
    }
}

/// Sent after a [`UseItemRequest`] has been carried out.
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct ItemUsed {
    /// The request that was handled.
    pub request: UseItemRequest,
    /// The string ID of the used item.
    pub item: String,
    /// How many of the item's actionable capabilities succeeded.
    pub succeeded: usize,
    /// Whether one item was consumed from the slot.
    pub consumed: bool,
}

/// Builds the handler registry, indexes the [`ItemDatabase`] and validates it against the registry.
pub fn initialize_item_database(
    mut database: ResMut<ItemDatabase>,
    mut registry: ResMut<HandlerRegistry>,
) {
    let report = database.initialize(registry.as_mut());

    if !report.is_ok() {
        warn!(
            "The item database has {} issue(s); items with problems may not work.",
            report.issues().len()
        );
    }
}

/// Drains the [`SlotUpdateChannel`] into [`SlotUpdated`] events.
pub fn forward_slot_updates(channel: Res<SlotUpdateChannel>, mut events: EventWriter<SlotUpdated>) {
    while let Ok(update) = channel.receiver.try_recv() {
        events.send(update);
    }
}

/// Carries out every pending [`UseItemRequest`].
///
/// Each actionable capability of the item is executed against the world, in authoring order.
/// If a [`CapabilityKind::Consumable`] capability succeeded, one item is taken from the slot;
/// either way the slot is reported as updated.
///
/// Items that are still cooling down for the owner are skipped.
/// While handlers run, the [`HandlerRegistry`] and [`InventoryManager`] are temporarily out of the world.
pub fn handle_use_item_requests(
    world: &mut World,
    system_state: &mut SystemState<EventReader<UseItemRequest>>,
) {
    let requests: Vec<UseItemRequest> = {
        let mut reader = system_state.get_mut(world);
        reader.read().copied().collect()
    };
    if requests.is_empty() {
        return;
    }

    world.resource_scope(|world, registry: Mut<HandlerRegistry>| {
        world.resource_scope(|world, mut manager: Mut<InventoryManager>| {
            for request in requests {
                if let Some(used) = use_item(world, &registry, &mut manager, request) {
                    world.send_event(used);
                }
            }
        });
    });
}

fn use_item(
    world: &mut World,
    registry: &HandlerRegistry,
    manager: &mut InventoryManager,
    request: UseItemRequest,
) -> Option<ItemUsed> {
    let Some(inventory) = manager.get_mut(request.owner) else {
        warn!("{:?} tried to use an item, but has no inventory.", request.owner);
        return None;
    };

    let Some(mut instance) = inventory.slot(request.slot).and_then(Slot::instance).cloned() else {
        warn!(
            "{:?} tried to use slot {}, which is empty or missing.",
            request.owner, request.slot
        );
        return None;
    };

    let definition = instance.definition().clone();
    let ready = world
        .get::<ItemCooldowns>(request.owner)
        .map_or(true, |cooldowns| cooldowns.is_ready(definition.item_id()));
    if !ready {
        debug!("'{}' is still cooling down for {:?}.", definition.id(), request.owner);
        return None;
    }

    let mut context = UseContext::new(world, request.owner, request.target);
    let mut succeeded = 0;
    let mut consumed = false;
    for capability in definition.actionable_capabilities() {
        if registry.execute(&mut instance, capability, &mut context).is_ok() {
            succeeded += 1;
            consumed |= capability.is_a(CapabilityKind::Consumable);
        }
    }

    if consumed {
        if let Err(err) = inventory.consume_from_slot(request.slot, 1) {
            error!("Could not consume '{}': {err}", definition.id());
        }
    } else {
        inventory.notify(request.slot);
    }

    Some(ItemUsed {
        request,
        item: definition.id().to_string(),
        succeeded,
        consumed,
    })
}
