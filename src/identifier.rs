//! Item definitions are authored with human-readable string IDs such as `"potion_health"`.
//! At runtime, those strings are hashed into a tiny [`Copy`] key, [`Id<T>`], which is what the catalog index is built on.
//!
//! The hash is stable across runs and platforms, so it is also safe to compute at compile time for well-known items.

use serde::{Deserialize, Serialize};
use std::{fmt::Debug, hash::Hash, marker::PhantomData};

use crate::definition::ItemDefinition;

/// The identifier of an [`ItemDefinition`] in the catalog.
pub type ItemId = Id<ItemDefinition>;

/// A hashed identifier for a *kind* of `T`.
///
/// These are constructed by hashing string identifiers via [`Id::from_name`].
/// Two different strings may (very rarely) hash to the same value,
/// so the [`ItemDatabase`](crate::database::ItemDatabase) indexes definitions by their string ID instead.
#[derive(Serialize, Deserialize)]
pub struct Id<T> {
    value: u64,

    #[serde(skip)]
    _phantom: PhantomData<T>,
}

/// Base of the polynomial rolling hash.
///
/// A positive prime roughly equal to the size of the input alphabet.
const HASH_P: u64 = 53;

/// Modulus of the polynomial rolling hash.
///
/// A large prime: larger values lower the chance of a collision.
const HASH_M: u64 = 1_000_000_009;

impl<T> Id<T> {
    /// Creates a new ID by hashing a string identifier.
    ///
    /// # Example
    ///
    /// ```
    /// use leafwing_inventory::identifier::ItemId;
    ///
    /// const POTION: ItemId = ItemId::from_name("potion_health");
    ///
    /// assert_eq!(POTION, ItemId::from_name("potion_health"));
    /// assert_ne!(POTION, ItemId::from_name("potion_mana"));
    /// ```
    pub const fn from_name(name: &str) -> Self {
        // Polynomial rolling hash, see <https://cp-algorithms.com/string/string-hashing.html>
        let bytes = name.as_bytes();
        let mut value = 0;
        let mut p_pow = 1;
        let mut i = 0;

        // `for` loops are not allowed in const fns.
        while i < bytes.len() {
            value = (value + (bytes[i] as u64 + 1) * p_pow) % HASH_M;
            p_pow = (p_pow * HASH_P) % HASH_M;
            i += 1;
        }

        Id {
            value,
            _phantom: PhantomData,
        }
    }

    /// The raw hashed value.
    pub const fn value(&self) -> u64 {
        self.value
    }
}

impl<T> From<&str> for Id<T> {
    fn from(name: &str) -> Self {
        Id::from_name(name)
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}
