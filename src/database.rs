//! The item database is the catalog of every [`ItemDefinition`] in the game.
//!
//! Definitions are supplied in authoring order, either directly or as a serialization-friendly [`RawItemCatalog`].
//! From that list, the database builds an index keyed by the string ID for constant-time lookup.
//!
//! Building the index never fails: entries with a blank or duplicate ID are dropped and reported as [`ValidationIssue`]s,
//! while the rest of the catalog stays usable.
//! [`ItemDatabase::initialize`] additionally builds the [`HandlerRegistry`] and confirms that every actionable capability
//! in the catalog can be executed.

use std::sync::Arc;

use bevy::ecs::system::Resource;
use bevy::log::{error, info};
use bevy::utils::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::CapabilityKind;
use crate::definition::{DefinitionError, ItemDefinition, RawItemDefinition};
use crate::handler::HandlerRegistry;
use crate::identifier::ItemId;

/// The serialized form of the catalog, as produced by authoring tools.
///
/// This is stored as a flat list: it is easier to hand-author, and preserves authoring order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItemCatalog {
    /// Every item definition, in authoring order.
    pub items: Vec<RawItemDefinition>,
}

/// A problem found while building or validating the catalog.
///
/// None of these are fatal: the offending entry is skipped, and the rest of the catalog remains usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    /// The definition at this position has an empty or whitespace-only ID.
    #[error("Item '{display_name}' at position {position} is missing an ID.")]
    BlankId {
        /// The position of the definition in the authoring list.
        position: usize,
        /// The display name, to help find the definition.
        display_name: String,
    },
    /// A second definition used an ID that is already in the index.
    #[error("Duplicate item ID '{0}'.")]
    DuplicateId(String),
    /// A raw definition could not be converted.
    #[error(transparent)]
    InvalidDefinition(#[from] DefinitionError),
    /// No handler resolves for an actionable capability.
    #[error("Missing handler for capability {capability:?} on item '{item}'.")]
    MissingHandler {
        /// The ID of the item carrying the capability.
        item: String,
        /// The kind of the capability.
        capability: CapabilityKind,
    },
}

/// Every [`ValidationIssue`] found by [`ItemDatabase::initialize`], gathered in one place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true if nothing was found.
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// Every issue, catalog issues first.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// The number of actionable capabilities without a handler.
    pub fn missing_handlers(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, ValidationIssue::MissingHandler { .. }))
            .count()
    }
}

/// The catalog of item definitions, indexed by ID.
///
/// ```
/// use leafwing_inventory::database::ItemDatabase;
/// use leafwing_inventory::definition::ItemDefinition;
///
/// let database = ItemDatabase::from_definitions([
///     ItemDefinition::new("sword", "Sword").with_stack_size(1),
///     ItemDefinition::new("sword", "Another Sword"),
/// ]);
///
/// // The first definition wins, and the duplicate is reported.
/// assert_eq!(database.len(), 1);
/// assert_eq!(database.get("sword").unwrap().display_name(), "Sword");
/// assert_eq!(database.issues().len(), 1);
/// ```
#[derive(Resource, Debug, Default)]
pub struct ItemDatabase {
    items: Vec<Arc<ItemDefinition>>,
    index: HashMap<String, Arc<ItemDefinition>>,
    conversion_issues: Vec<ValidationIssue>,
    issues: Vec<ValidationIssue>,
    report: Option<ValidationReport>,
}

impl ItemDatabase {
    /// Creates a database from definitions in authoring order, and builds its index.
    pub fn from_definitions(definitions: impl IntoIterator<Item = ItemDefinition>) -> Self {
        let mut database = ItemDatabase {
            items: definitions.into_iter().map(Arc::new).collect(),
            ..Default::default()
        };
        database.build_index();
        database
    }

    /// Converts a raw catalog, and builds its index.
    ///
    /// Raw definitions that fail to convert are dropped and reported alongside the index issues.
    pub fn from_raw(raw_catalog: RawItemCatalog) -> Self {
        let mut database = ItemDatabase::default();

        for raw_item in raw_catalog.items {
            match ItemDefinition::try_from(raw_item) {
                Ok(definition) => database.items.push(Arc::new(definition)),
                Err(err) => {
                    error!("Failed to convert raw item definition: {err}");
                    database.conversion_issues.push(err.into());
                }
            }
        }

        database.build_index();
        database
    }

    /// Rebuilds the ID index from the list of definitions.
    ///
    /// Blank and duplicate IDs are skipped and reported; the first definition with a given ID wins.
    /// Rebuilding is deterministic, so calling this again yields the same index.
    pub fn build_index(&mut self) -> &[ValidationIssue] {
        let mut index: HashMap<String, Arc<ItemDefinition>> = HashMap::default();
        let mut issues = self.conversion_issues.clone();

        for (position, item) in self.items.iter().enumerate() {
            if item.id().trim().is_empty() {
                issues.push(ValidationIssue::BlankId {
                    position,
                    display_name: item.display_name().to_string(),
                });
                continue;
            }

            if index.contains_key(item.id()) {
                issues.push(ValidationIssue::DuplicateId(item.id().to_string()));
                continue;
            }

            index.insert(item.id().to_string(), item.clone());
        }

        for issue in &issues[self.conversion_issues.len()..] {
            error!("Item database: {issue}");
        }

        self.index = index;
        self.issues = issues;
        &self.issues
    }

    /// Builds the index and the handler registry, then checks every actionable capability for a handler.
    ///
    /// Only the first call does any work; later calls return the same report.
    pub fn initialize(&mut self, registry: &mut HandlerRegistry) -> &ValidationReport {
        if self.report.is_none() {
            self.build_index();
            registry.build();

            let mut issues = self.issues.clone();
            issues.extend(self.validate_handlers(registry));

            let report = ValidationReport { issues };
            if report.missing_handlers() > 0 {
                error!(
                    "Item database validation failed with {} missing handler mapping(s).",
                    report.missing_handlers()
                );
            } else {
                info!("Item database handler validation successful.");
            }
            info!("Item database initialized with {} items.", self.len());

            self.report = Some(report);
        }

        self.report.get_or_insert_with(ValidationReport::default)
    }

    /// Returns true once [`initialize`](Self::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.report.is_some()
    }

    /// The report produced by [`initialize`](Self::initialize), if it has run.
    pub fn report(&self) -> Option<&ValidationReport> {
        self.report.as_ref()
    }

    /// Checks every actionable capability of every indexed definition for a handler.
    ///
    /// Handlers resolved through a supertype count.
    pub fn validate_handlers(&self, registry: &HandlerRegistry) -> Vec<ValidationIssue> {
        let issues: Vec<_> = self
            .iter()
            .flat_map(|definition| {
                definition
                    .actionable_capabilities()
                    .filter(|capability| !registry.has_handler_for(capability.kind()))
                    .map(|capability| ValidationIssue::MissingHandler {
                        item: definition.id().to_string(),
                        capability: capability.kind(),
                    })
            })
            .collect();

        for issue in &issues {
            error!("Item database: {issue}");
        }
        issues
    }

    /// Gets a definition by its string ID.
    ///
    /// Returns [`None`] for unknown or blank IDs.
    pub fn get(&self, id: &str) -> Option<&Arc<ItemDefinition>> {
        self.index.get(id)
    }

    /// Gets a definition by its hashed ID.
    ///
    /// Distinct string IDs can share a hash; the first such definition in authoring order is returned.
    pub fn get_by_item_id(&self, item_id: ItemId) -> Option<&Arc<ItemDefinition>> {
        self.iter().find(|definition| definition.item_id() == item_id)
    }

    /// Returns true if the ID is in the index.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Every indexed definition, in authoring order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ItemDefinition>> {
        self.items.iter().filter(|definition| {
            self.index
                .get(definition.id())
                .is_some_and(|indexed| Arc::ptr_eq(indexed, definition))
        })
    }

    /// Every indexed definition with a capability of kind `kind` (or of a subtype of it), in authoring order.
    pub fn items_with_capability(
        &self,
        kind: CapabilityKind,
    ) -> impl Iterator<Item = &Arc<ItemDefinition>> {
        self.iter()
            .filter(move |definition| definition.has_capability(kind))
    }

    /// Every indexed definition that can be used through a handler.
    pub fn actionable_items(&self) -> impl Iterator<Item = &Arc<ItemDefinition>> {
        self.items_with_capability(CapabilityKind::Actionable)
    }

    /// The issues found by the last index build.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// The number of indexed definitions.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if no definitions are indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
