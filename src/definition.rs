//! Item definitions are the immutable templates that every [`ItemInstance`](crate::instance::ItemInstance) refers to.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::{Capability, CapabilityKind};
use crate::identifier::ItemId;

/// The stack size used when an authored definition does not specify one.
pub const DEFAULT_STACK_SIZE: u32 = 99;

/// An immutable template describing one kind of item.
///
/// Definitions are shared between every instance of the item, and live for as long as the catalog does.
/// The capabilities are kept in authoring order, which is also the order they are executed in.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDefinition {
    id: String,
    item_id: ItemId,
    display_name: String,
    icon: Option<String>,
    stack_size: u32,
    description: String,
    capabilities: Vec<Capability>,
}

impl ItemDefinition {
    /// Creates a definition with the given string ID and display name.
    ///
    /// The stack size starts at [`DEFAULT_STACK_SIZE`], and there are no capabilities.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            item_id: ItemId::from_name(&id),
            id,
            display_name: display_name.into(),
            icon: None,
            stack_size: DEFAULT_STACK_SIZE,
            description: String::new(),
            capabilities: Vec::new(),
        }
    }

    /// Sets the maximum number of items in a single stack.
    ///
    /// Values below 1 are raised to 1.
    pub fn with_stack_size(mut self, stack_size: u32) -> Self {
        self.stack_size = stack_size.max(1);
        self
    }

    /// Sets the player-facing description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the icon reference, typically an asset path.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Appends a capability.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// The unique string ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The hashed form of [`id`](Self::id).
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// The name shown to the player.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The icon reference, if any.
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// The maximum count of a single stack. Always at least 1.
    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    /// The description shown to the player.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// All capabilities, in authoring order.
    pub fn all_capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// The first capability of kind `kind` (or of a subtype of it).
    pub fn capability(&self, kind: CapabilityKind) -> Option<&Capability> {
        self.capabilities(kind).next()
    }

    /// Every capability of kind `kind` (or of a subtype of it).
    pub fn capabilities(&self, kind: CapabilityKind) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter().filter(move |cap| cap.is_a(kind))
    }

    /// Returns true if any capability is of kind `kind` (or of a subtype of it).
    pub fn has_capability(&self, kind: CapabilityKind) -> bool {
        self.capability(kind).is_some()
    }

    /// Every capability that can be executed by a handler.
    pub fn actionable_capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities(CapabilityKind::Actionable)
    }
}

/// The serialization-friendly form of an [`ItemDefinition`], as produced by authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItemDefinition {
    /// The unique string ID.
    pub id: String,
    /// The name shown to the player.
    pub display_name: String,
    /// An icon reference, typically an asset path.
    #[serde(default)]
    pub icon: Option<String>,
    /// The maximum count of a single stack.
    #[serde(default = "default_stack_size")]
    pub stack_size: u32,
    /// The description shown to the player.
    #[serde(default)]
    pub description: String,
    /// The capabilities, in order.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

fn default_stack_size() -> u32 {
    DEFAULT_STACK_SIZE
}

/// An error that can occur when converting a [`RawItemDefinition`] into an [`ItemDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// Stacks must be able to hold at least one item.
    #[error("Item '{0}' has a stack size of zero.")]
    ZeroStackSize(String),
}

impl TryFrom<RawItemDefinition> for ItemDefinition {
    type Error = DefinitionError;

    // Blank IDs are accepted here: they are reported by the catalog when the index is built.
    fn try_from(raw: RawItemDefinition) -> Result<Self, Self::Error> {
        if raw.stack_size == 0 {
            return Err(DefinitionError::ZeroStackSize(raw.id));
        }

        let mut definition = ItemDefinition::new(raw.id, raw.display_name)
            .with_stack_size(raw.stack_size)
            .with_description(raw.description);
        definition.icon = raw.icon;
        definition.capabilities = raw.capabilities;

        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{EquipmentCapability, RestoreEffect};

    fn omni_potion() -> ItemDefinition {
        ItemDefinition::new("potion_omni", "Omni Potion")
            .with_stack_size(10)
            .with_capability(Capability::HealthEffect(RestoreEffect::default()))
            .with_capability(Capability::ManaEffect(RestoreEffect::default()))
    }

    #[test]
    fn stack_size_is_at_least_one() {
        let def = ItemDefinition::new("rock", "Rock").with_stack_size(0);
        assert_eq!(def.stack_size(), 1);
    }

    #[test]
    fn querying_by_abstract_kind_matches_subtypes() {
        let potion = omni_potion();

        assert_eq!(potion.capabilities(CapabilityKind::Consumable).count(), 2);
        assert_eq!(potion.actionable_capabilities().count(), 2);
        assert_eq!(
            potion.capability(CapabilityKind::Consumable).map(Capability::kind),
            Some(CapabilityKind::HealthEffect)
        );
        assert!(!potion.has_capability(CapabilityKind::Equipment));
    }

    #[test]
    fn passive_items_have_no_actionable_capabilities() {
        let sword = ItemDefinition::new("sword", "Sword")
            .with_stack_size(1)
            .with_capability(Capability::Equipment(EquipmentCapability::default()));

        assert!(sword.has_capability(CapabilityKind::Equipment));
        assert_eq!(sword.actionable_capabilities().count(), 0);
    }

    #[test]
    fn raw_definitions_with_zero_stack_size_are_rejected() {
        let raw = RawItemDefinition {
            id: "broken".into(),
            display_name: "Broken".into(),
            icon: None,
            stack_size: 0,
            description: String::new(),
            capabilities: Vec::new(),
        };

        assert_eq!(
            ItemDefinition::try_from(raw),
            Err(DefinitionError::ZeroStackSize("broken".into()))
        );
    }

    #[test]
    fn raw_definitions_keep_their_data() {
        let raw = RawItemDefinition {
            id: "potion_health".into(),
            display_name: "Health Potion".into(),
            icon: Some("icons/potion_red.png".into()),
            stack_size: 20,
            description: "Tastes like cherries.".into(),
            capabilities: vec![Capability::HealthEffect(RestoreEffect::default())],
        };

        let def = ItemDefinition::try_from(raw).unwrap();
        assert_eq!(def.id(), "potion_health");
        assert_eq!(def.item_id(), ItemId::from_name("potion_health"));
        assert_eq!(def.icon(), Some("icons/potion_red.png"));
        assert_eq!(def.stack_size(), 20);
        assert_eq!(def.all_capabilities().len(), 1);
    }
}
