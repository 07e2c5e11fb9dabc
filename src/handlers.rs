//! Built-in handlers, and the components they act on.
//!
//! Games register their own handlers for their own capabilities,
//! and may override these by registering a more specific handler, or by using [`CollisionPolicy::LastRegisteredWins`](crate::handler::CollisionPolicy).

use bevy::ecs::{component::Component, entity::Entity, system::Query, system::Res};
use bevy::log::{debug, info};
use bevy::time::Time;
use bevy::utils::HashMap;

use crate::capability::{Capability, CapabilityKind, RestoreEffect};
use crate::handler::{CapabilityHandler, HandlerError, UseContext};
use crate::identifier::ItemId;
use crate::instance::ItemInstance;

/// The health of an entity.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Health {
    /// Current health, in `0..=max`.
    pub current: f32,
    /// Maximum health.
    pub max: f32,
}

impl Health {
    /// Creates a component at full health.
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Restores up to `amount`, capped at `max`. Negative amounts are ignored.
    ///
    /// Returns how much was actually restored.
    pub fn restore(&mut self, amount: f32) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }

        let before = self.current;
        self.current = (self.current + amount).min(self.max);
        self.current - before
    }

    /// Removes up to `amount`, stopping at zero.
    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount.max(0.0)).max(0.0);
    }
}

/// The mana of an entity.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Mana {
    /// Current mana, in `0..=max`.
    pub current: f32,
    /// Maximum mana.
    pub max: f32,
}

impl Mana {
    /// Creates a component with a full pool.
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Restores up to `amount`, capped at `max`. Negative amounts are ignored.
    ///
    /// Returns how much was actually restored.
    pub fn restore(&mut self, amount: f32) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }

        let before = self.current;
        self.current = (self.current + amount).min(self.max);
        self.current - before
    }

    /// Spends up to `amount`, stopping at zero.
    pub fn reduce(&mut self, amount: f32) {
        self.current = (self.current - amount.max(0.0)).max(0.0);
    }
}

/// Per-item cooldowns of an entity, in seconds remaining.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct ItemCooldowns {
    remaining: HashMap<ItemId, f32>,
}

impl ItemCooldowns {
    /// Starts (or restarts) the cooldown of `item`.
    pub fn start(&mut self, item: ItemId, seconds: f32) {
        if seconds > 0.0 {
            self.remaining.insert(item, seconds);
        }
    }

    /// Seconds until `item` can be used again; zero if it is ready.
    pub fn remaining(&self, item: ItemId) -> f32 {
        self.remaining.get(&item).copied().unwrap_or(0.0)
    }

    /// Returns true if `item` is not cooling down.
    pub fn is_ready(&self, item: ItemId) -> bool {
        self.remaining(item) <= 0.0
    }

    /// Advances every cooldown by `delta` seconds, forgetting the ones that finish.
    pub fn tick(&mut self, delta: f32) {
        self.remaining.retain(|_, seconds| {
            *seconds -= delta;
            *seconds > 0.0
        });
    }
}

/// Which pool a [`ActiveRestore`] refills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoredResource {
    /// [`Health`]
    Health,
    /// [`Mana`]
    Mana,
}

/// A restore effect that is applied gradually.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRestore {
    /// The pool being refilled.
    pub resource: RestoredResource,
    /// Amount restored per second.
    pub per_second: f32,
    /// Seconds left.
    pub remaining: f32,
}

/// The over-time effects currently running on an entity.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct ActiveRestores(pub Vec<ActiveRestore>);

/// Restores [`Health`] or [`Mana`] on the target, for every [`CapabilityKind::Consumable`] capability.
///
/// Instant effects are applied immediately; the rest are added to the target's [`ActiveRestores`].
/// A positive cooldown is started on the user's [`ItemCooldowns`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsumableHandler;

impl CapabilityHandler for ConsumableHandler {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Consumable
    }

    fn execute(
        &self,
        instance: &mut ItemInstance,
        capability: &Capability,
        context: &mut UseContext,
    ) -> Result<(), HandlerError> {
        let (resource, effect) = match capability {
            Capability::HealthEffect(effect) => (RestoredResource::Health, effect),
            Capability::ManaEffect(effect) => (RestoredResource::Mana, effect),
            other => return Err(HandlerError::UnsupportedCapability(other.kind())),
        };

        apply_restore(resource, effect, context)?;
        start_cooldown(instance, capability.cooldown(), context)?;

        debug!(
            "Used {} ({:?}) on {:?}.",
            instance.definition().display_name(),
            capability.kind(),
            context.target
        );
        Ok(())
    }
}

/// Logs the use verb, and starts a cooldown on the user's [`ItemCooldowns`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UseItemHandler;

impl CapabilityHandler for UseItemHandler {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::UseItem
    }

    fn execute(
        &self,
        instance: &mut ItemInstance,
        capability: &Capability,
        context: &mut UseContext,
    ) -> Result<(), HandlerError> {
        let Capability::UseItem(use_item) = capability else {
            return Err(HandlerError::UnsupportedCapability(capability.kind()));
        };

        info!("[{}] {} executed.", instance.id(), use_item.verb);
        start_cooldown(instance, use_item.cooldown, context)
    }
}

fn apply_restore(
    resource: RestoredResource,
    effect: &RestoreEffect,
    context: &mut UseContext,
) -> Result<(), HandlerError> {
    let target = context.target;
    let amount = effect.amount as f32;

    if !effect.instant && effect.duration > 0.0 {
        let mut entity = context
            .world
            .get_entity_mut(target)
            .ok_or(HandlerError::MissingEntity(target))?;
        let active = ActiveRestore {
            resource,
            per_second: amount / effect.duration,
            remaining: effect.duration,
        };

        if let Some(mut restores) = entity.get_mut::<ActiveRestores>() {
            restores.0.push(active);
            return Ok(());
        }
        entity.insert(ActiveRestores(vec![active]));
        return Ok(());
    }

    match resource {
        RestoredResource::Health => {
            let mut health = context.world.get_mut::<Health>(target).ok_or(
                HandlerError::MissingComponent {
                    entity: target,
                    component: "Health",
                },
            )?;
            health.restore(amount);
        }
        RestoredResource::Mana => {
            let mut mana =
                context
                    .world
                    .get_mut::<Mana>(target)
                    .ok_or(HandlerError::MissingComponent {
                        entity: target,
                        component: "Mana",
                    })?;
            mana.restore(amount);
        }
    }
    Ok(())
}

fn start_cooldown(
    instance: &ItemInstance,
    seconds: f32,
    context: &mut UseContext,
) -> Result<(), HandlerError> {
    if seconds <= 0.0 {
        return Ok(());
    }

    let user = context.user;
    let item = instance.definition().item_id();
    let mut entity = context
        .world
        .get_entity_mut(user)
        .ok_or(HandlerError::MissingEntity(user))?;

    if let Some(mut cooldowns) = entity.get_mut::<ItemCooldowns>() {
        cooldowns.start(item, seconds);
    } else {
        let mut cooldowns = ItemCooldowns::default();
        cooldowns.start(item, seconds);
        entity.insert(cooldowns);
    }
    debug!("Item '{}' has a {seconds}s cooldown.", instance.id());
    Ok(())
}

/// Counts every [`ItemCooldowns`] down.
pub fn tick_cooldowns(time: Res<Time>, mut query: Query<&mut ItemCooldowns>) {
    let delta = time.delta_seconds();
    for mut cooldowns in query.iter_mut() {
        cooldowns.tick(delta);
    }
}

/// Applies over-time restores, dropping the ones that have run out.
pub fn tick_active_restores(
    time: Res<Time>,
    mut query: Query<(
        Entity,
        &mut ActiveRestores,
        Option<&mut Health>,
        Option<&mut Mana>,
    )>,
) {
    let delta = time.delta_seconds();

    for (entity, mut restores, mut health, mut mana) in query.iter_mut() {
        for restore in restores.0.iter_mut() {
            let step = delta.min(restore.remaining);
            restore.remaining -= step;

            let amount = restore.per_second * step;
            match (restore.resource, health.as_mut(), mana.as_mut()) {
                (RestoredResource::Health, Some(health), _) => {
                    health.restore(amount);
                }
                (RestoredResource::Mana, _, Some(mana)) => {
                    mana.restore(amount);
                }
                (resource, _, _) => {
                    debug!("{entity:?} has no {resource:?} pool; dropping its restore.");
                    restore.remaining = 0.0;
                }
            }
        }

        restores.0.retain(|restore| restore.remaining > 0.0);
    }
}
