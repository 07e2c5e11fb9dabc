//! Handlers execute actionable capabilities, keeping item data free of any reference to game logic.
//!
//! Each [`CapabilityHandler`] declares the single [`CapabilityKind`] it is bound to.
//! The [`HandlerRegistry`] is given an explicit list of handlers, and builds a kind-to-handler map exactly once.
//!
//! When a capability is executed, the registry first looks for a handler bound to its concrete kind,
//! and then walks up [`CapabilityKind::ancestors`] until one is found.
//! This lets a single generic handler (e.g. one bound to [`CapabilityKind::Consumable`]) serve a whole family of capabilities,
//! while still allowing more specific overrides.

use std::any::type_name;

use bevy::ecs::{entity::Entity, system::Resource, world::World};
use bevy::log::{error, info, warn};
use bevy::utils::hashbrown::hash_map::Entry;
use bevy::utils::HashMap;
use thiserror::Error;

use crate::capability::{Capability, CapabilityKind};
use crate::handlers::{ConsumableHandler, UseItemHandler};
use crate::instance::ItemInstance;

/// The runtime context a capability is executed against.
///
/// Handlers are free to read and write anything in the [`World`], but are expected to act on
/// the `user` (who is using the item) and the `target` (who the item is used on).
pub struct UseContext<'w> {
    /// The game world.
    pub world: &'w mut World,
    /// The entity using the item.
    pub user: Entity,
    /// The entity the item is used on. Often the same as `user`.
    pub target: Entity,
}

impl<'w> UseContext<'w> {
    /// Creates a context where `user` acts on `target`.
    pub fn new(world: &'w mut World, user: Entity, target: Entity) -> Self {
        Self {
            world,
            user,
            target,
        }
    }

    /// Creates a context where `entity` uses the item on itself.
    pub fn on_self(world: &'w mut World, entity: Entity) -> Self {
        Self::new(world, entity, entity)
    }
}

/// An executor for one [`CapabilityKind`].
///
/// Exactly one instance of each handler is stored in the [`HandlerRegistry`].
pub trait CapabilityHandler: Send + Sync + 'static {
    /// The capability kind this handler is bound to.
    ///
    /// This may be an abstract kind, in which case every subtype without a more specific handler is routed here.
    fn kind(&self) -> CapabilityKind;

    /// A human-readable name, used when reporting registration collisions.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Applies `capability`, an instance of [`Self::kind`] or one of its subtypes, to the `context`.
    fn execute(
        &self,
        instance: &mut ItemInstance,
        capability: &Capability,
        context: &mut UseContext,
    ) -> Result<(), HandlerError>;
}

/// An error raised by a handler that could not apply its effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The entity does not exist.
    #[error("Entity {0:?} does not exist.")]
    MissingEntity(Entity),
    /// The entity lacks the component the effect acts on.
    #[error("Entity {entity:?} has no {component} component.")]
    MissingComponent {
        /// The entity that was acted on.
        entity: Entity,
        /// The name of the missing component.
        component: &'static str,
    },
    /// The handler was routed a capability it does not know how to apply.
    #[error("This handler cannot execute {0:?} capabilities.")]
    UnsupportedCapability(CapabilityKind),
}

/// An error that can occur when dispatching a capability to its handler.
///
/// These are always reported and returned: dispatch never panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// [`HandlerRegistry::build`] has not been called yet.
    #[error("The handler registry has not been built.")]
    NotBuilt,
    /// Passive capabilities cannot be executed.
    #[error("{0:?} capabilities are not actionable.")]
    NotActionable(CapabilityKind),
    /// No handler is bound to the kind or any of its supertypes.
    #[error("No handler found for {0:?} or any of its supertypes.")]
    NoHandler(CapabilityKind),
    /// The handler was found, but failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// How to resolve two handlers that are bound to the same [`CapabilityKind`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Keep the handler that appears first in the registration list.
    #[default]
    FirstRegisteredWins,
    /// Replace the existing handler with the later one.
    LastRegisteredWins,
}

/// A record of two handlers that claimed the same capability kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerCollision {
    /// The contested kind.
    pub kind: CapabilityKind,
    /// The name of the handler that was kept.
    pub kept: &'static str,
    /// The name of the handler that was discarded.
    pub discarded: &'static str,
}

/// Maps capability kinds to their single handler instance.
///
/// Handlers are registered with [`with_handler`](Self::with_handler) or [`register`](Self::register),
/// and take effect once [`build`](Self::build) is called.
/// Building happens exactly once: later calls are no-ops, and later registrations are ignored.
///
/// Registration order is the order of the list, which makes [`CollisionPolicy`] resolution deterministic.
///
/// ```
/// use leafwing_inventory::capability::CapabilityKind;
/// use leafwing_inventory::handler::HandlerRegistry;
///
/// let mut registry = HandlerRegistry::default().with_default_handlers();
/// registry.build();
///
/// // `ManaEffect` has no handler of its own, and falls back to the `Consumable` handler.
/// assert!(registry.has_handler_for(CapabilityKind::ManaEffect));
/// assert!(!registry.has_handler_for(CapabilityKind::Equipment));
/// ```
#[derive(Resource, Default)]
pub struct HandlerRegistry {
    pending: Vec<Box<dyn CapabilityHandler>>,
    handlers: HashMap<CapabilityKind, Box<dyn CapabilityHandler>>,
    collisions: Vec<HandlerCollision>,
    policy: CollisionPolicy,
    built: bool,
}

impl HandlerRegistry {
    /// Adds a handler to the registration list.
    pub fn with_handler(mut self, handler: impl CapabilityHandler) -> Self {
        self.register(handler);
        self
    }

    /// Adds the built-in [`ConsumableHandler`] and [`UseItemHandler`] to the registration list.
    pub fn with_default_handlers(self) -> Self {
        self.with_handler(ConsumableHandler)
            .with_handler(UseItemHandler)
    }

    /// Sets how collisions between handlers bound to the same kind are resolved.
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds a handler to the registration list.
    ///
    /// Returns false, and ignores the handler, if the registry has already been built
    /// or if the handler is bound to a passive kind.
    pub fn register(&mut self, handler: impl CapabilityHandler) -> bool {
        if self.built {
            warn!(
                "Ignoring handler {} registered after the handler registry was built.",
                handler.name()
            );
            return false;
        }

        if !handler.kind().is_actionable() {
            warn!(
                "Ignoring handler {}: {:?} capabilities are passive and cannot be executed.",
                handler.name(),
                handler.kind()
            );
            return false;
        }

        self.pending.push(Box::new(handler));
        true
    }

    /// Builds the kind-to-handler map from the registration list.
    ///
    /// Calling this more than once has no effect.
    pub fn build(&mut self) {
        if self.built {
            return;
        }

        for handler in std::mem::take(&mut self.pending) {
            match self.handlers.entry(handler.kind()) {
                Entry::Vacant(entry) => {
                    entry.insert(handler);
                }
                Entry::Occupied(mut entry) => {
                    let existing = entry.get().name();
                    let collision = match self.policy {
                        CollisionPolicy::FirstRegisteredWins => HandlerCollision {
                            kind: handler.kind(),
                            kept: existing,
                            discarded: handler.name(),
                        },
                        CollisionPolicy::LastRegisteredWins => {
                            let collision = HandlerCollision {
                                kind: handler.kind(),
                                kept: handler.name(),
                                discarded: existing,
                            };
                            entry.insert(handler);
                            collision
                        }
                    };

                    warn!(
                        "Handlers {} and {} are both bound to {:?}; keeping {}.",
                        collision.kept, collision.discarded, collision.kind, collision.kept
                    );
                    self.collisions.push(collision);
                }
            }
        }

        self.built = true;
        info!(
            "Handler registry built with {} handler instances.",
            self.handlers.len()
        );
    }

    /// Returns true once [`build`](Self::build) has been called.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// The number of distinct kinds with a directly bound handler.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are bound.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Every collision resolved during [`build`](Self::build).
    pub fn collisions(&self) -> &[HandlerCollision] {
        &self.collisions
    }

    /// Finds the handler for `kind`, falling back through its supertypes.
    ///
    /// Resolution stops at the nearest kind with a bound handler.
    pub fn resolve(&self, kind: CapabilityKind) -> Option<&dyn CapabilityHandler> {
        if !self.built {
            return None;
        }

        kind.ancestors()
            .find_map(|kind| self.handlers.get(&kind))
            .map(|handler| handler.as_ref())
    }

    /// Returns true if a handler resolves for `kind`, directly or through a supertype.
    ///
    /// Passive kinds are never executed, so they never have a handler.
    pub fn has_handler_for(&self, kind: CapabilityKind) -> bool {
        if !self.built {
            warn!("Checked for a {kind:?} handler before the handler registry was built.");
            return false;
        }

        if !kind.is_actionable() {
            return false;
        }

        self.resolve(kind).is_some()
    }

    /// Executes a single capability of `instance` against `context`.
    ///
    /// Failures are logged and returned; nothing is changed when no handler resolves.
    pub fn execute(
        &self,
        instance: &mut ItemInstance,
        capability: &Capability,
        context: &mut UseContext,
    ) -> Result<(), DispatchError> {
        let kind = capability.kind();

        if !self.built {
            error!("Tried to execute {kind:?} before the handler registry was built.");
            return Err(DispatchError::NotBuilt);
        }

        if !kind.is_actionable() {
            error!("Tried to execute passive capability {kind:?}.");
            return Err(DispatchError::NotActionable(kind));
        }

        let Some(handler) = self.resolve(kind) else {
            error!("No handler instance found for capability {kind:?}.");
            return Err(DispatchError::NoHandler(kind));
        };

        handler
            .execute(instance, capability, context)
            .map_err(|err| {
                error!(
                    "{} failed to execute {kind:?} for item '{}': {err}",
                    handler.name(),
                    instance.id()
                );
                DispatchError::from(err)
            })
    }

    /// Executes every actionable capability of the instance's definition, in authoring order.
    ///
    /// A failing capability does not stop the rest. Returns how many capabilities succeeded.
    pub fn execute_all(&self, instance: &mut ItemInstance, context: &mut UseContext) -> usize {
        let definition = instance.definition().clone();

        definition
            .actionable_capabilities()
            .filter(|capability| self.execute(instance, capability, context).is_ok())
            .count()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();

        f.debug_struct("HandlerRegistry")
            .field("kinds", &kinds)
            .field("pending", &self.pending.len())
            .field("collisions", &self.collisions)
            .field("policy", &self.policy)
            .field("built", &self.built)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capability::{EquipmentCapability, RestoreEffect, UseItemCapability};
    use crate::definition::ItemDefinition;

    /// Records which handler ran, in the order they ran.
    #[derive(Resource, Default)]
    struct Calls(Vec<&'static str>);

    struct Recording {
        kind: CapabilityKind,
        label: &'static str,
    }

    impl CapabilityHandler for Recording {
        fn kind(&self) -> CapabilityKind {
            self.kind
        }

        fn name(&self) -> &'static str {
            self.label
        }

        fn execute(
            &self,
            _instance: &mut ItemInstance,
            _capability: &Capability,
            context: &mut UseContext,
        ) -> Result<(), HandlerError> {
            context
                .world
                .get_resource_or_insert_with(Calls::default)
                .0
                .push(self.label);
            Ok(())
        }
    }

    fn recording(kind: CapabilityKind, label: &'static str) -> Recording {
        Recording { kind, label }
    }

    fn omni_potion() -> ItemInstance {
        let definition = ItemDefinition::new("potion_omni", "Omni Potion")
            .with_capability(Capability::HealthEffect(RestoreEffect::default()))
            .with_capability(Capability::Equipment(EquipmentCapability::default()))
            .with_capability(Capability::ManaEffect(RestoreEffect::default()));
        ItemInstance::new(Arc::new(definition), 1)
    }

    fn calls(world: &World) -> Vec<&'static str> {
        world
            .get_resource::<Calls>()
            .map(|calls| calls.0.clone())
            .unwrap_or_default()
    }

    #[test]
    fn unbuilt_registry_resolves_nothing() {
        let registry =
            HandlerRegistry::default().with_handler(recording(CapabilityKind::UseItem, "use"));
        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let mut instance = omni_potion();

        assert!(!registry.has_handler_for(CapabilityKind::UseItem));
        assert_eq!(
            registry.execute(
                &mut instance,
                &Capability::UseItem(UseItemCapability::default()),
                &mut UseContext::on_self(&mut world, entity)
            ),
            Err(DispatchError::NotBuilt)
        );
    }

    #[test]
    fn build_is_idempotent() {
        let mut registry =
            HandlerRegistry::default().with_handler(recording(CapabilityKind::UseItem, "use"));
        registry.build();
        registry.build();
        assert_eq!(registry.len(), 1);

        assert!(!registry.register(recording(CapabilityKind::Consumable, "late")));
        registry.build();
        assert!(!registry.has_handler_for(CapabilityKind::Consumable));
    }

    #[test]
    fn handlers_fall_back_to_the_nearest_ancestor() {
        let mut registry = HandlerRegistry::default()
            .with_handler(recording(CapabilityKind::Actionable, "actionable"))
            .with_handler(recording(CapabilityKind::Consumable, "consumable"));
        registry.build();

        assert!(registry.has_handler_for(CapabilityKind::ManaEffect));
        assert_eq!(
            registry.resolve(CapabilityKind::ManaEffect).map(|h| h.name()),
            Some("consumable")
        );
        assert_eq!(
            registry.resolve(CapabilityKind::UseItem).map(|h| h.name()),
            Some("actionable")
        );

        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let mut instance = omni_potion();
        let mana = Capability::ManaEffect(RestoreEffect::default());
        registry
            .execute(&mut instance, &mana, &mut UseContext::on_self(&mut world, entity))
            .unwrap();

        assert_eq!(calls(&world), ["consumable"]);
    }

    #[test]
    fn specific_handlers_override_generic_ones() {
        let mut registry = HandlerRegistry::default()
            .with_handler(recording(CapabilityKind::Consumable, "consumable"))
            .with_handler(recording(CapabilityKind::ManaEffect, "mana"));
        registry.build();

        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let mut instance = omni_potion();

        let executed =
            registry.execute_all(&mut instance, &mut UseContext::on_self(&mut world, entity));

        assert_eq!(executed, 2);
        assert_eq!(calls(&world), ["consumable", "mana"]);
    }

    #[test]
    fn first_registered_handler_wins_by_default() {
        let mut registry = HandlerRegistry::default()
            .with_handler(recording(CapabilityKind::UseItem, "first"))
            .with_handler(recording(CapabilityKind::UseItem, "second"));
        registry.build();

        assert_eq!(
            registry.resolve(CapabilityKind::UseItem).map(|h| h.name()),
            Some("first")
        );
        assert_eq!(
            registry.collisions(),
            [HandlerCollision {
                kind: CapabilityKind::UseItem,
                kept: "first",
                discarded: "second",
            }]
        );
    }

    #[test]
    fn collision_policy_is_configurable() {
        let mut registry = HandlerRegistry::default()
            .with_collision_policy(CollisionPolicy::LastRegisteredWins)
            .with_handler(recording(CapabilityKind::UseItem, "first"))
            .with_handler(recording(CapabilityKind::UseItem, "second"));
        registry.build();

        assert_eq!(
            registry.resolve(CapabilityKind::UseItem).map(|h| h.name()),
            Some("second")
        );
        assert_eq!(registry.collisions()[0].discarded, "first");
    }

    #[test]
    fn missing_handlers_are_reported_without_side_effects() {
        let mut registry =
            HandlerRegistry::default().with_handler(recording(CapabilityKind::UseItem, "use"));
        registry.build();

        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let mut instance = omni_potion();
        let health = Capability::HealthEffect(RestoreEffect::default());

        assert_eq!(
            registry.execute(
                &mut instance,
                &health,
                &mut UseContext::on_self(&mut world, entity)
            ),
            Err(DispatchError::NoHandler(CapabilityKind::HealthEffect))
        );
        assert!(calls(&world).is_empty());
        assert_eq!(instance.count(), 1);
    }

    #[test]
    fn passive_capabilities_cannot_be_executed() {
        let mut registry =
            HandlerRegistry::default().with_handler(recording(CapabilityKind::Actionable, "any"));
        registry.build();

        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let mut instance = omni_potion();
        let sword = Capability::Equipment(EquipmentCapability::default());

        assert_eq!(
            registry.execute(
                &mut instance,
                &sword,
                &mut UseContext::on_self(&mut world, entity)
            ),
            Err(DispatchError::NotActionable(CapabilityKind::Equipment))
        );
    }

    #[test]
    fn passive_kinds_never_have_handlers() {
        let mut registry = HandlerRegistry::default();
        assert!(!registry.register(recording(CapabilityKind::Equipment, "equip")));
        registry.build();

        assert!(registry.is_empty());
        assert!(!registry.has_handler_for(CapabilityKind::Equipment));
        assert!(!registry.has_handler_for(CapabilityKind::Crafting));
    }
}
