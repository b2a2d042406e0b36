//! Core domain types for the recommendation catalog.
//!
//! This module defines the fundamental data structures used throughout the system.
//! Key Rust concepts demonstrated here:
//! - Type aliases for domain clarity (UserId, ItemId)
//! - Manual trait impls when equality is narrower than the struct
//! - `Option<T>` for fields that only exist after enrichment
//! - Vec + HashMap position index for stable ordering with O(1) lookups

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

// =============================================================================
// Type Aliases
// =============================================================================

/// Unique, stable identifier for a user
pub type UserId = String;

/// Globally unique identifier for an item (e.g. a TMDB movie id as a string)
pub type ItemId = String;

/// Category assigned to items when none is given
pub const DEFAULT_CATEGORY: &str = "movie";

// =============================================================================
// User
// =============================================================================

/// A user and the items they have viewed.
///
/// The viewing history is chronological and may contain the same item more
/// than once (repeat views).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub viewing_history: Vec<ItemId>,
}

impl User {
    /// Create a user with an empty viewing history
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            viewing_history: Vec::new(),
        }
    }

    /// Builder-style constructor with a known history
    pub fn with_history<I, S>(mut self, history: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ItemId>,
    {
        self.viewing_history = history.into_iter().map(Into::into).collect();
        self
    }

    /// True when the user has never viewed anything (cold start)
    pub fn is_cold_start(&self) -> bool {
        self.viewing_history.is_empty()
    }
}

// =============================================================================
// Item
// =============================================================================

/// An item that can be recommended.
///
/// Only `id` is guaranteed to be present; `name` and `genres` may be missing
/// until the item is enriched from a metadata provider.
///
/// Rust concept: equality and hashing are implemented by hand so that two
/// `Item`s with the same id are the same item, whatever their metadata says.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: Option<String>,
    pub category: String,
    /// Genre/tag labels. `BTreeSet` collapses duplicates and keeps a stable order.
    pub genres: BTreeSet<String>,
}

impl Item {
    /// Create a fully described item
    pub fn new<I, S>(id: impl Into<ItemId>, name: impl Into<String>, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: Some(name.into()),
            category: DEFAULT_CATEGORY.to_string(),
            genres: genres.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an item that only carries its identifier
    pub fn bare(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            category: DEFAULT_CATEGORY.to_string(),
            genres: BTreeSet::new(),
        }
    }

    /// Override the category tag
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Name to show to a user, falling back to the identifier
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// True once name and genres are known
    pub fn is_enriched(&self) -> bool {
        self.name.is_some() && !self.genres.is_empty()
    }

    /// Take the name and genres from `other` where this item has none.
    ///
    /// Returns true if anything changed. Id and category are never touched.
    pub fn fill_gaps(&mut self, other: Item) -> bool {
        let mut changed = false;
        if self.name.is_none() && other.name.is_some() {
            self.name = other.name;
            changed = true;
        }
        if self.genres.is_empty() && !other.genres.is_empty() {
            self.genres = other.genres;
            changed = true;
        }
        changed
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// =============================================================================
// Rating
// =============================================================================

/// A (user, item, score) triple used to train the collaborative model.
///
/// Repeated pairs are kept as-is; deduplication is the model's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub score: f32,
}

impl Rating {
    pub fn new(user_id: impl Into<UserId>, item_id: impl Into<ItemId>, score: f32) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            score,
        }
    }
}

// =============================================================================
// Statistics Types
// =============================================================================

/// Precomputed rating statistics for an item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    pub avg_score: f32,
    pub rating_count: u32,
}

/// What [`Catalog::upsert_item`] did with an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

// =============================================================================
// Catalog - The In-Memory Data Layer
// =============================================================================

/// Holds the canonical users, items and the rating matrix.
///
/// Users and items are stored in insertion order (so training inputs and
/// `all_item_ids` are deterministic) with a position index for O(1) lookups.
/// Ratings are stored once and indexed by position per user and per item.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    // Primary data stores
    pub(crate) users: Vec<User>,
    pub(crate) user_positions: HashMap<UserId, usize>,
    pub(crate) items: Vec<Item>,
    pub(crate) item_positions: HashMap<ItemId, usize>,
    pub(crate) ratings: Vec<Rating>,

    // Rating indices (positions into `ratings`)
    pub(crate) user_ratings: HashMap<UserId, Vec<usize>>,
    pub(crate) item_ratings: HashMap<ItemId, Vec<usize>>,

    // Secondary indices
    /// Items grouped by genre label
    pub(crate) genre_index: HashMap<String, Vec<ItemId>>,

    // Precomputed statistics
    pub(crate) item_stats: HashMap<ItemId, ItemStats>,
}

impl Catalog {
    /// Creates a new, empty Catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from three aligned collections.
    ///
    /// Secondary indices and statistics are built; references are not
    /// validated (see [`Catalog::validate`]).
    pub fn from_parts(users: Vec<User>, items: Vec<Item>, ratings: Vec<Rating>) -> Self {
        let mut catalog = Self::new();
        for user in users {
            catalog.insert_user(user);
        }
        for item in items {
            catalog.insert_item(item);
        }
        for rating in ratings {
            catalog.insert_rating(rating);
        }
        catalog.build_secondary_indices();
        catalog.compute_item_stats();
        catalog
    }

    // Getters return references; the catalog keeps ownership.

    /// Get a user by ID
    pub fn get_user(&self, id: &str) -> Option<&User> {
        self.user_positions.get(id).map(|&pos| &self.users[pos])
    }

    /// Get an item by ID
    pub fn get_item(&self, id: &str) -> Option<&Item> {
        self.item_positions.get(id).map(|&pos| &self.items[pos])
    }

    /// Get all ratings made by a user, in insertion order
    pub fn get_user_ratings(&self, user_id: &str) -> Vec<&Rating> {
        self.user_ratings
            .get(user_id)
            .map(|positions| positions.iter().map(|&p| &self.ratings[p]).collect())
            .unwrap_or_default()
    }

    /// Get all ratings for an item
    pub fn get_item_ratings(&self, item_id: &str) -> Vec<&Rating> {
        self.item_ratings
            .get(item_id)
            .map(|positions| positions.iter().map(|&p| &self.ratings[p]).collect())
            .unwrap_or_default()
    }

    /// Get all items tagged with a genre
    pub fn get_items_by_genre(&self, genre: &str) -> &[ItemId] {
        self.genre_index
            .get(genre)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Get precomputed statistics for an item
    pub fn get_item_stats(&self, item_id: &str) -> Option<&ItemStats> {
        self.item_stats.get(item_id)
    }

    /// Every item identifier, in insertion order
    pub fn all_item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    /// Case-insensitive name search: exact matches first, then substring
    /// matches ordered by average score (best first).
    pub fn search_by_name(&self, query: &str) -> Vec<&Item> {
        let needle = query.to_lowercase();
        let mut matches: Vec<(u8, f32, &Item)> = self
            .items
            .iter()
            .filter_map(|item| {
                let name = item.name.as_ref()?.to_lowercase();
                let relevance = if name == needle {
                    0
                } else if name.contains(&needle) {
                    1
                } else {
                    return None;
                };
                let avg = self
                    .get_item_stats(&item.id)
                    .map(|s| s.avg_score)
                    .unwrap_or(0.0);
                Some((relevance, avg, item))
            })
            .collect();

        matches.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
        });
        matches.into_iter().map(|(_, _, item)| item).collect()
    }

    // Mutators take `&mut self`

    /// Insert a user, replacing any user with the same id
    pub fn insert_user(&mut self, user: User) {
        match self.user_positions.get(&user.id) {
            Some(&pos) => self.users[pos] = user,
            None => {
                self.user_positions.insert(user.id.clone(), self.users.len());
                self.users.push(user);
            }
        }
    }

    /// Insert an item, replacing any item with the same id
    pub fn insert_item(&mut self, item: Item) {
        match self.item_positions.get(&item.id) {
            Some(&pos) => self.items[pos] = item,
            None => {
                self.item_positions.insert(item.id.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    /// Add `item`, or fill the gaps of the record stored under its id.
    ///
    /// Unlike [`Catalog::insert_item`] this never drops known metadata, and
    /// it keeps the genre index current. Records that already have a name
    /// and genres are left as they are.
    pub fn upsert_item(&mut self, item: Item) -> Upsert {
        let Some(&pos) = self.item_positions.get(&item.id) else {
            index_genres(&mut self.genre_index, &item);
            self.insert_item(item);
            return Upsert::Inserted;
        };

        let existing = &mut self.items[pos];
        if existing.is_enriched() {
            return Upsert::Unchanged;
        }
        let had_genres = !existing.genres.is_empty();
        if !existing.fill_gaps(item) {
            return Upsert::Unchanged;
        }
        if !had_genres {
            index_genres(&mut self.genre_index, &self.items[pos]);
        }
        Upsert::Updated
    }

    /// Insert a rating and update the rating indices
    pub fn insert_rating(&mut self, rating: Rating) {
        let pos = self.ratings.len();
        self.user_ratings
            .entry(rating.user_id.clone())
            .or_default()
            .push(pos);
        self.item_ratings
            .entry(rating.item_id.clone())
            .or_default()
            .push(pos);
        self.ratings.push(rating);
    }

    /// Get counts for debugging/validation
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.users.len(), self.items.len(), self.ratings.len())
    }
}

pub(crate) fn index_genres(genre_index: &mut HashMap<String, Vec<ItemId>>, item: &Item) {
    for genre in &item.genres {
        genre_index
            .entry(genre.clone())
            .or_default()
            .push(item.id.clone());
    }
}
