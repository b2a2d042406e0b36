//! Integration tests for the hybrid engine.
//!
//! These run the native predictors end to end on the demo catalog shipped
//! under `data/catalog`.

use catalog::{Catalog, Item, User};
use engine::{EngineError, HybridEngine};
use models::{GenreTfIdfModel, MatrixFactorizationModel};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

fn load_demo_catalog() -> Catalog {
    let data_dir = Path::new("../../data/catalog");
    Catalog::load_from_dir(data_dir).expect("Failed to load demo catalog")
}

fn native_engine() -> HybridEngine {
    let collaborative = MatrixFactorizationModel::new()
        .with_embedding_dim(8)
        .with_epochs(50)
        .with_learning_rate(0.02)
        .with_seed(7);
    HybridEngine::new(Arc::new(collaborative), Arc::new(GenreTfIdfModel::new()))
}

fn assert_unique(items: &[Item]) {
    let unique: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(unique.len(), items.len(), "duplicate items in {:?}", items);
}

#[tokio::test]
async fn test_native_engine_end_to_end() {
    let catalog = load_demo_catalog();
    let engine = native_engine();
    engine.train_from_catalog(&catalog).await.unwrap();

    let user = catalog.get_user("u1").unwrap();
    let recommended = engine.recommend(user, 5).await.unwrap();

    assert_eq!(recommended.len(), 5);
    assert_unique(&recommended);

    // Both predictors leave out what the user already watched
    let history: HashSet<&str> = user.viewing_history.iter().map(String::as_str).collect();
    assert!(recommended.iter().all(|i| !history.contains(i.id.as_str())));
}

#[tokio::test]
async fn test_native_engine_is_deterministic() {
    let catalog = load_demo_catalog();
    let user = catalog.get_user("u4").unwrap().clone();

    let first = native_engine();
    first.train_from_catalog(&catalog).await.unwrap();
    let second = native_engine();
    second.train_from_catalog(&catalog).await.unwrap();

    assert_eq!(
        first.recommend_ids(&user, 6).await.unwrap(),
        second.recommend_ids(&user, 6).await.unwrap()
    );
}

#[tokio::test]
async fn test_cold_start_user_still_gets_results() {
    let catalog = load_demo_catalog();
    let engine = native_engine();
    engine.train_from_catalog(&catalog).await.unwrap();

    // u5 is known but has no history and no ratings
    let user = catalog.get_user("u5").unwrap();
    assert!(user.is_cold_start());

    let recommended = engine.recommend(user, 4).await.unwrap();
    assert_eq!(recommended.len(), 4);
    assert_unique(&recommended);
}

#[tokio::test]
async fn test_unseen_user_gets_content_only_results() {
    let catalog = load_demo_catalog();
    let engine = native_engine();
    engine.train_from_catalog(&catalog).await.unwrap();

    // Not part of training: collaborative has nothing, content still works
    let newcomer = User::new("newcomer").with_history(["862"]);
    let recommended = engine.recommend(&newcomer, 3).await.unwrap();

    let ids: Vec<&str> = recommended.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], "863");
    assert!(!ids.contains(&"862"));
}

#[tokio::test]
async fn test_similar_items_by_genre() {
    let catalog = load_demo_catalog();
    let engine = native_engine();
    engine.train_from_catalog(&catalog).await.unwrap();

    let similar = engine.similar_items("862", 3).await.unwrap();
    let ids: Vec<&str> = similar.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], "863");
    assert!(!ids.contains(&"862"));
    assert_unique(&similar);
}

#[tokio::test]
async fn test_native_engine_untrained() {
    let catalog = load_demo_catalog();
    let engine = native_engine();

    let err = engine.recommend(catalog.get_user("u1").unwrap(), 5).await.unwrap_err();
    assert!(matches!(err, EngineError::UntrainedModel { .. }));
}

#[tokio::test]
async fn test_training_failure_surfaces() {
    let catalog = load_demo_catalog();
    let engine = native_engine();

    // No ratings at all: matrix factorization has nothing to learn from
    let err = engine
        .train(catalog.users(), catalog.items(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TrainingFailure { .. }));
    assert!(!engine.is_trained());
}
