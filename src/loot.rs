//! Random item drops.

use bevy::log::warn;
use bevy::utils::HashMap;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::database::ItemDatabase;
use crate::inventory::Inventory;

/// How a [`LootDrop`] takes part in a roll.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropKind {
    /// Always dropped, once per roll.
    #[default]
    Guaranteed,
    /// Competes with the other weighted drops for each weighted roll.
    Weighted,
}

/// One entry in a [`LootTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootDrop {
    /// How this entry is selected.
    pub kind: DropKind,
    /// The string ID of the dropped item.
    pub item: String,
    /// The smallest amount dropped.
    pub min_amount: u32,
    /// The largest amount dropped.
    pub max_amount: u32,
    /// The relative likelihood of a weighted drop. Ignored for guaranteed drops.
    pub weight: f32,
}

impl Default for LootDrop {
    fn default() -> Self {
        Self {
            kind: DropKind::Guaranteed,
            item: String::new(),
            min_amount: 1,
            max_amount: 1,
            weight: 1.0,
        }
    }
}

impl LootDrop {
    /// A guaranteed drop of `min..=max` of `item`.
    pub fn guaranteed(item: impl Into<String>, min_amount: u32, max_amount: u32) -> Self {
        Self {
            kind: DropKind::Guaranteed,
            item: item.into(),
            min_amount,
            max_amount,
            ..Default::default()
        }
    }

    /// A weighted drop of `min..=max` of `item`.
    pub fn weighted(
        item: impl Into<String>,
        min_amount: u32,
        max_amount: u32,
        weight: f32,
    ) -> Self {
        Self {
            kind: DropKind::Weighted,
            item: item.into(),
            min_amount,
            max_amount,
            weight,
        }
    }

    /// Picks an amount uniformly from the drop's range.
    ///
    /// Both bounds are at least one, and a reversed range collapses onto `min_amount`.
    pub fn roll_amount(&self, rng: &mut impl Rng) -> u32 {
        let min = self.min_amount.max(1);
        let max = self.max_amount.max(min);
        rng.gen_range(min..=max)
    }
}

/// A set of drops, rolled together.
///
/// ```
/// use leafwing_inventory::loot::{LootDrop, LootTable};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let table = LootTable {
///     weighted_rolls: 1,
///     entries: vec![
///         LootDrop::guaranteed("coin", 3, 3),
///         LootDrop::weighted("gem", 1, 1, 1.0),
///     ],
/// };
///
/// let drops = table.roll(&mut StdRng::seed_from_u64(7));
/// assert_eq!(drops["coin"], 3);
/// assert_eq!(drops["gem"], 1);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootTable {
    /// How many weighted picks happen after the guaranteed drops.
    pub weighted_rolls: u32,
    /// Every drop in the table.
    pub entries: Vec<LootDrop>,
}

impl LootTable {
    /// Rolls the table once, returning the total amount dropped per item ID.
    ///
    /// Every guaranteed entry drops once. Then each weighted roll picks one weighted entry,
    /// proportionally to its weight. Entries without an item, and weighted entries without a positive weight, never drop.
    pub fn roll(&self, rng: &mut impl Rng) -> HashMap<String, u32> {
        let mut drops = HashMap::default();

        for entry in self
            .entries
            .iter()
            .filter(|entry| entry.kind == DropKind::Guaranteed && !entry.item.is_empty())
        {
            *drops.entry(entry.item.clone()).or_insert(0) += entry.roll_amount(rng);
        }

        let weighted: Vec<&LootDrop> = self
            .entries
            .iter()
            .filter(|entry| {
                entry.kind == DropKind::Weighted && !entry.item.is_empty() && entry.weight > 0.0
            })
            .collect();

        if weighted.is_empty() || self.weighted_rolls == 0 {
            return drops;
        }

        let distribution = match WeightedIndex::new(weighted.iter().map(|entry| entry.weight)) {
            Ok(distribution) => distribution,
            Err(err) => {
                warn!("Skipping weighted loot rolls: {err}");
                return drops;
            }
        };

        for _ in 0..self.weighted_rolls {
            let entry = weighted[distribution.sample(rng)];
            *drops.entry(entry.item.clone()).or_insert(0) += entry.roll_amount(rng);
        }

        drops
    }

    /// Rolls the table and adds the drops to `inventory`.
    ///
    /// Returns whatever did not fit, per item ID.
    pub fn roll_into(
        &self,
        rng: &mut impl Rng,
        database: &ItemDatabase,
        inventory: &mut Inventory,
    ) -> HashMap<String, u32> {
        let mut leftovers = HashMap::default();

        for (item, amount) in self.roll(rng) {
            let remainder = inventory.add_item(database, &item, amount);
            if remainder > 0 {
                leftovers.insert(item, remainder);
            }
        }
        leftovers
    }
}
