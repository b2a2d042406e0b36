//! # Catalog Crate
//!
//! Canonical users, items and ratings shared by both predictors and by the
//! hybrid engine's item resolution.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (User, Item, Rating, Catalog)
//! - **parser**: Parse `.dat` files into Rust structs, and write items back
//! - **index**: Build secondary indices and statistics, validate references
//! - **error**: Error types for catalog loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use catalog::Catalog;
//! use std::path::Path;
//!
//! let catalog = Catalog::load_from_dir(Path::new("data/catalog"))?;
//!
//! let user = catalog.get_user("42").unwrap();
//! let item = catalog.get_item("603").unwrap();
//! println!("{} viewed {} items", user.id, user.viewing_history.len());
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{CatalogError, Result};
pub use types::{
    Catalog, DEFAULT_CATEGORY, Item, ItemId, ItemStats, Rating, Upsert, User, UserId,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_creation() {
        let catalog = Catalog::new();
        let (users, items, ratings) = catalog.counts();

        assert_eq!(users, 0);
        assert_eq!(items, 0);
        assert_eq!(ratings, 0);
    }

    #[test]
    fn test_insert_user() {
        let mut catalog = Catalog::new();
        catalog.insert_user(User::new("1").with_history(["m1", "m2"]));

        let retrieved = catalog.get_user("1").unwrap();
        assert_eq!(retrieved.viewing_history.len(), 2);
    }

    #[test]
    fn test_item_equality_is_identifier_equality() {
        let a = Item::new("603", "The Matrix", ["Action"]);
        let b = Item::bare("603").with_category("film");
        assert_eq!(a, b);

        let set: std::collections::HashSet<Item> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insert_item_replaces_in_place() {
        let mut catalog = Catalog::new();
        catalog.insert_item(Item::bare("m1"));
        catalog.insert_item(Item::bare("m2"));
        catalog.insert_item(Item::new("m1", "Alien", ["Horror"]));

        assert_eq!(catalog.all_item_ids(), vec!["m1", "m2"]);
        assert_eq!(catalog.get_item("m1").unwrap().display_name(), "Alien");
    }

    #[test]
    fn test_insert_rating() {
        let mut catalog = Catalog::new();
        catalog.insert_rating(Rating::new("1", "m1", 5.0));
        catalog.insert_rating(Rating::new("1", "m1", 3.0));

        // Repeated pairs are kept
        assert_eq!(catalog.get_user_ratings("1").len(), 2);
        assert_eq!(catalog.get_item_ratings("m1").len(), 2);
    }

    #[test]
    fn test_empty_queries() {
        let catalog = Catalog::new();

        assert!(catalog.get_user("999").is_none());
        assert!(catalog.get_item("999").is_none());
        assert!(catalog.get_user_ratings("999").is_empty());
        assert!(catalog.get_item_ratings("999").is_empty());
        assert!(catalog.get_items_by_genre("Action").is_empty());
        assert!(catalog.all_item_ids().is_empty());
    }

    #[test]
    fn test_search_by_name_exact_first() {
        let catalog = Catalog::from_parts(
            vec![User::new("u1")],
            vec![
                Item::new("m1", "Alien Resurrection", ["Horror"]),
                Item::new("m2", "Alien", ["Horror"]),
                Item::bare("m3"),
            ],
            vec![Rating::new("u1", "m1", 5.0)],
        );

        let found: Vec<&str> = catalog
            .search_by_name("alien")
            .iter()
            .map(|item| item.id.as_str())
            .collect();
        assert_eq!(found, vec!["m2", "m1"]);
    }

    #[test]
    fn test_item_serde_shape() {
        let item = Item::new("603", "The Matrix", ["Sci-Fi", "Action"]);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "603");
        assert_eq!(json["genres"][0], "Action");
    }

    #[test]
    fn test_upsert_fills_gaps_only() {
        let mut catalog = Catalog::from_parts(
            vec![],
            vec![Item::new("m1", "Heat", ["Crime"]), Item::bare("m2")],
            vec![],
        );

        // Known metadata is never overwritten
        let outcome = catalog.upsert_item(Item::new("m1", "Heat (1995)", ["Drama"]));
        assert_eq!(outcome, Upsert::Unchanged);
        assert_eq!(catalog.get_item("m1").unwrap().display_name(), "Heat");

        let outcome = catalog.upsert_item(Item::new("m2", "Ronin", ["Thriller"]));
        assert_eq!(outcome, Upsert::Updated);
        assert_eq!(catalog.get_items_by_genre("Thriller"), &["m2".to_string()]);

        let outcome = catalog.upsert_item(Item::new("m3", "Collateral", ["Crime"]));
        assert_eq!(outcome, Upsert::Inserted);
        assert_eq!(catalog.get_items_by_genre("Crime").len(), 2);
        assert_eq!(catalog.all_item_ids(), vec!["m1", "m2", "m3"]);

        // Nothing new to offer
        assert_eq!(catalog.upsert_item(Item::bare("m2")), Upsert::Unchanged);
    }

    #[test]
    fn test_fill_gaps_keeps_id_and_category() {
        let mut item = Item::bare("m1").with_category("series");
        let fetched = Item::new("other", "Chernobyl", ["Drama"]);

        assert!(item.fill_gaps(fetched));
        assert_eq!(item.id, "m1");
        assert_eq!(item.category, "series");
        assert_eq!(item.display_name(), "Chernobyl");
        assert!(item.is_enriched());
    }
}
