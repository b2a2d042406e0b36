//! Catalog building and indexing logic.
//!
//! This module builds a Catalog from parsed data:
//! - Create primary indices (users, items, ratings)
//! - Build secondary indices (genre_index)
//! - Compute aggregate statistics (item stats)
//! - Validate references between ratings, users and items

use crate::error::{CatalogError, Result};
use crate::parser;
use crate::types::*;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

impl Catalog {
    /// Load a catalog from a directory containing `users.dat`, `items.dat`
    /// and `ratings.dat`.
    ///
    /// Steps:
    /// 1. Parse all three files in parallel
    /// 2. Build primary indices
    /// 3. Build secondary indices
    /// 4. Compute item statistics
    /// 5. Validate data integrity
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        info!("Loading catalog from {:?}", data_dir);

        let users_path = data_dir.join("users.dat");
        let items_path = data_dir.join("items.dat");
        let ratings_path = data_dir.join("ratings.dat");

        // Nested joins give three-way parallelism
        let ((users, items), ratings) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_users(&users_path),
                    || parser::parse_items(&items_path),
                )
            },
            || parser::parse_ratings(&ratings_path),
        );

        let users = users?;
        let items = items?;
        let ratings = ratings?;

        info!(
            "Loaded {} users, {} items, {} ratings",
            users.len(),
            items.len(),
            ratings.len()
        );

        let catalog = Catalog::from_parts(users, items, ratings);
        catalog.validate()?;

        info!("Catalog successfully built and validated");
        Ok(catalog)
    }

    /// Write the current items back to `items.dat` in `data_dir`
    ///
    /// Users and ratings are never rewritten.
    pub fn save_items(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join("items.dat");
        parser::write_items(&path, &self.items)?;
        info!("Saved {} items to {:?}", self.items.len(), path);
        Ok(())
    }

    /// Rebuild the genre index from the current items
    pub fn build_secondary_indices(&mut self) {
        self.genre_index.clear();
        for item in &self.items {
            index_genres(&mut self.genre_index, item);
        }
    }

    /// Compute average score and rating count for every rated item
    pub fn compute_item_stats(&mut self) {
        let ratings = &self.ratings;
        let item_stats: HashMap<ItemId, ItemStats> = self
            .item_ratings
            .par_iter()
            .map(|(item_id, positions)| {
                let rating_count = positions.len() as u32;
                let avg_score = if rating_count > 0 {
                    let total: f32 = positions.iter().map(|&p| ratings[p].score).sum();
                    total / rating_count as f32
                } else {
                    0.0
                };
                (
                    item_id.clone(),
                    ItemStats {
                        avg_score,
                        rating_count,
                    },
                )
            })
            .collect();
        self.item_stats = item_stats;
    }

    /// Validate data integrity
    ///
    /// Check that:
    /// - All rating.user_id references exist in users
    /// - All rating.item_id references exist in items
    /// - Scores are finite numbers
    pub fn validate(&self) -> Result<()> {
        for rating in &self.ratings {
            if !self.user_positions.contains_key(&rating.user_id) {
                return Err(CatalogError::MissingReference {
                    entity: "User".to_string(),
                    id: rating.user_id.clone(),
                });
            }
            if !self.item_positions.contains_key(&rating.item_id) {
                return Err(CatalogError::MissingReference {
                    entity: "Item".to_string(),
                    id: rating.item_id.clone(),
                });
            }
            if !rating.score.is_finite() {
                return Err(CatalogError::InvalidValue {
                    field: "score".to_string(),
                    value: rating.score.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "catalog-{}-{}",
            name,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_from_dir() {
        let dir = scratch_dir("load");
        fs::write(dir.join("users.dat"), "u1::m1|m2\nu2::\n").unwrap();
        fs::write(
            dir.join("items.dat"),
            "m1::The Matrix::movie::Action|Sci-Fi\nm2::Toy Story::movie::Animation\nm3::::movie::\n",
        )
        .unwrap();
        fs::write(dir.join("ratings.dat"), "u1::m1::5\nu1::m2::3.5\nu2::m1::4\n").unwrap();

        let catalog = Catalog::load_from_dir(&dir).unwrap();
        assert_eq!(catalog.counts(), (2, 3, 3));
        assert_eq!(catalog.get_items_by_genre("Action"), &["m1".to_string()]);

        let stats = catalog.get_item_stats("m1").unwrap();
        assert_eq!(stats.rating_count, 2);
        assert!((stats.avg_score - 4.5).abs() < 1e-6);

        assert!(catalog.get_item("m3").unwrap().name.is_none());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_rejects_dangling_rating() {
        let dir = scratch_dir("dangling");
        fs::write(dir.join("users.dat"), "u1::\n").unwrap();
        fs::write(dir.join("items.dat"), "m1::A::movie::Drama\n").unwrap();
        fs::write(dir.join("ratings.dat"), "u1::m404::4\n").unwrap();

        let err = Catalog::load_from_dir(&dir).unwrap_err();
        assert!(matches!(err, CatalogError::MissingReference { .. }));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_missing_dir() {
        let result = Catalog::load_from_dir(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(CatalogError::FileNotFound { .. })));
    }

    #[test]
    fn test_validate_rejects_non_finite_score() {
        let catalog = Catalog::from_parts(
            vec![User::new("u1")],
            vec![Item::bare("m1")],
            vec![Rating::new("u1", "m1", f32::NAN)],
        );
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_save_items_reloads() {
        let dir = scratch_dir("save");
        fs::write(dir.join("users.dat"), "u1::m1\n").unwrap();
        fs::write(dir.join("items.dat"), "m1::Heat::movie::Crime\n").unwrap();
        fs::write(dir.join("ratings.dat"), "u1::m1::4\n").unwrap();

        let mut catalog = Catalog::load_from_dir(&dir).unwrap();
        catalog.upsert_item(Item::new("m2", "Alien: Covenant", ["Horror", "Sci-Fi"]));
        catalog.upsert_item(Item::bare("m3").with_category("series"));
        catalog.save_items(&dir).unwrap();

        let reloaded = Catalog::load_from_dir(&dir).unwrap();
        assert_eq!(reloaded.all_item_ids(), vec!["m1", "m2", "m3"]);
        assert_eq!(reloaded.get_item("m2").unwrap().name.as_deref(), Some("Alien: Covenant"));
        assert_eq!(reloaded.get_item("m2").unwrap().genres.len(), 2);
        assert_eq!(reloaded.get_item("m3").unwrap().category, "series");
        assert!(reloaded.get_item("m3").unwrap().name.is_none());
        assert_eq!(reloaded.get_user_ratings("u1").len(), 1);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_secondary_indices_follow_replaced_items() {
        let mut catalog = Catalog::from_parts(
            vec![],
            vec![Item::new("m1", "Heat", ["Crime"])],
            vec![],
        );
        catalog.insert_item(Item::new("m1", "Heat", ["Thriller"]));
        catalog.build_secondary_indices();

        assert!(catalog.get_items_by_genre("Crime").is_empty());
        assert_eq!(catalog.get_items_by_genre("Thriller").len(), 1);
    }
}
