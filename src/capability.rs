//! Capabilities are the orthogonal facets that an [`ItemDefinition`](crate::definition::ItemDefinition) is composed of.
//!
//! A capability is pure data: it never stores a reference to the code that acts on it.
//! Instead, each capability reports its [`CapabilityKind`], and the [`HandlerRegistry`](crate::handler::HandlerRegistry)
//! maps kinds to executors.
//!
//! Kinds form a small, closed hierarchy described by [`CapabilityKind::parent`].
//! Abstract kinds (like [`CapabilityKind::Consumable`]) never appear on a concrete [`Capability`],
//! but can be used to query for, or register a handler against, a whole family of capabilities at once.

use serde::{Deserialize, Serialize};

/// The identity of a capability variant, including the abstract variants that group them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CapabilityKind {
    /// Abstract: any capability that can be executed against a [`UseContext`](crate::handler::UseContext).
    Actionable,
    /// Abstract: an actionable capability that is used up, such as a potion's effect.
    Consumable,
    /// Restores health to the target.
    HealthEffect,
    /// Restores mana to the target.
    ManaEffect,
    /// A generic "use" action.
    UseItem,
    /// Passive equipment stats.
    Equipment,
    /// Passive crafting recipes.
    Crafting,
}

impl CapabilityKind {
    /// Every kind, in declaration order.
    pub const ALL: [CapabilityKind; 7] = [
        CapabilityKind::Actionable,
        CapabilityKind::Consumable,
        CapabilityKind::HealthEffect,
        CapabilityKind::ManaEffect,
        CapabilityKind::UseItem,
        CapabilityKind::Equipment,
        CapabilityKind::Crafting,
    ];

    /// The direct supertype of this kind, if any.
    pub const fn parent(self) -> Option<CapabilityKind> {
        match self {
            CapabilityKind::Actionable => None,
            CapabilityKind::Consumable => Some(CapabilityKind::Actionable),
            CapabilityKind::HealthEffect => Some(CapabilityKind::Consumable),
            CapabilityKind::ManaEffect => Some(CapabilityKind::Consumable),
            CapabilityKind::UseItem => Some(CapabilityKind::Actionable),
            CapabilityKind::Equipment => None,
            CapabilityKind::Crafting => None,
        }
    }

    /// Iterates over this kind and then each of its supertypes, nearest first.
    ///
    /// ```
    /// use leafwing_inventory::capability::CapabilityKind;
    ///
    /// let chain: Vec<_> = CapabilityKind::ManaEffect.ancestors().collect();
    /// assert_eq!(
    ///     chain,
    ///     [CapabilityKind::ManaEffect, CapabilityKind::Consumable, CapabilityKind::Actionable]
    /// );
    /// ```
    pub fn ancestors(self) -> impl Iterator<Item = CapabilityKind> {
        // The hierarchy is acyclic and shallow, so this terminates within `ALL.len()` steps.
        std::iter::successors(Some(self), |kind| kind.parent()).take(Self::ALL.len())
    }

    /// Returns true if `self` is `other`, or has `other` as a supertype.
    pub fn is_a(self, other: CapabilityKind) -> bool {
        self.ancestors().any(|kind| kind == other)
    }

    /// Returns true if capabilities of this kind can be executed by a handler.
    pub fn is_actionable(self) -> bool {
        self.is_a(CapabilityKind::Actionable)
    }
}

/// A single facet of an item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Capability {
    /// Restores health when consumed.
    HealthEffect(RestoreEffect),
    /// Restores mana when consumed.
    ManaEffect(RestoreEffect),
    /// A generic use action.
    UseItem(UseItemCapability),
    /// Stats granted while equipped.
    Equipment(EquipmentCapability),
    /// Ways to craft this item.
    Crafting(CraftingCapability),
}

impl Capability {
    /// The concrete kind of this capability.
    pub const fn kind(&self) -> CapabilityKind {
        match self {
            Capability::HealthEffect(_) => CapabilityKind::HealthEffect,
            Capability::ManaEffect(_) => CapabilityKind::ManaEffect,
            Capability::UseItem(_) => CapabilityKind::UseItem,
            Capability::Equipment(_) => CapabilityKind::Equipment,
            Capability::Crafting(_) => CapabilityKind::Crafting,
        }
    }

    /// Returns true if this capability is of kind `kind`, directly or through a supertype.
    pub fn is_a(&self, kind: CapabilityKind) -> bool {
        self.kind().is_a(kind)
    }

    /// Returns true if this capability can be executed by a handler.
    pub fn is_actionable(&self) -> bool {
        self.kind().is_actionable()
    }

    /// The cooldown, in seconds, started when this capability is executed.
    ///
    /// Passive capabilities have no cooldown.
    pub fn cooldown(&self) -> f32 {
        match self {
            Capability::HealthEffect(effect) | Capability::ManaEffect(effect) => effect.cooldown,
            Capability::UseItem(use_item) => use_item.cooldown,
            Capability::Equipment(_) | Capability::Crafting(_) => 0.0,
        }
    }
}

/// Restores some resource on the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreEffect {
    /// How much is restored.
    pub amount: u32,
    /// Seconds before the item can be used again.
    pub cooldown: f32,
    /// If false, the amount is restored over `duration` seconds.
    pub instant: bool,
    /// Only used when the effect is not instant.
    pub duration: f32,
}

impl Default for RestoreEffect {
    fn default() -> Self {
        Self {
            amount: 50,
            cooldown: 0.0,
            instant: true,
            duration: 5.0,
        }
    }
}

/// A generic action, described by a verb.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UseItemCapability {
    /// Shown to the player, e.g. "Read" or "Open".
    pub verb: String,
    /// Seconds before the item can be used again.
    pub cooldown: f32,
}

impl Default for UseItemCapability {
    fn default() -> Self {
        Self {
            verb: "Use".to_string(),
            cooldown: 0.0,
        }
    }
}

/// Stats granted by an equippable item.
///
/// This capability is passive: it has no handler and cannot be executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentCapability {
    /// Damage per hit.
    pub damage: i32,
    /// Hits per second.
    pub attack_speed: f32,
}

impl Default for EquipmentCapability {
    fn default() -> Self {
        Self {
            damage: 5,
            attack_speed: 1.2,
        }
    }
}

/// All of the ways to craft an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraftingCapability {
    /// Alternative recipes; any one of them produces the item.
    pub recipes: Vec<CraftingRecipe>,
}

/// One way to craft an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraftingRecipe {
    /// The crafting station required, such as `"forge"`.
    ///
    /// `None` means the recipe can be crafted by hand.
    pub station: Option<String>,
    /// Items consumed by the recipe.
    pub ingredients: Vec<MaterialCost>,
    /// Items produced by the recipe.
    ///
    /// When empty, the recipe produces one of the item that owns it.
    pub outputs: Vec<MaterialCost>,
}

/// An amount of some item, referenced by its string ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCost {
    /// The ID of the item definition.
    pub item: String,
    /// How many are required or produced.
    pub amount: u32,
}
