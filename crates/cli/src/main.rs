use anyhow::{anyhow, Context, Result};
use catalog::{Catalog, Item, UserId};
use clap::{Parser, Subcommand};
use colored::Colorize;
use engine::HybridEngine;
use metadata::{MetadataConfig, TmdbClient, sync_popular};
use models::{
    GenreTfIdfModel, MatrixFactorizationModel, ModelServingContext, RankedCandidate,
    RemoteCollaborativeModel, RemoteContentModel,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// FlickPicker - Hybrid Movie Recommender
#[derive(Parser)]
#[command(name = "flick-picker")]
#[command(about = "Hybrid recommender combining collaborative and content-based filtering", long_about = None)]
struct Cli {
    /// Directory holding users.dat, items.dat and ratings.dat
    #[arg(short, long, default_value = "data/catalog")]
    data_dir: PathBuf,

    /// Model-serving address (e.g. http://localhost:50051); native models when absent
    #[arg(long)]
    model_server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train both models and recommend items for a user
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: UserId,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        top_n: usize,

        /// Fill in unnamed or unknown items from TMDB
        #[arg(long, conflicts_with = "explain")]
        enrich: bool,

        /// Show which model contributed each recommendation
        #[arg(long)]
        explain: bool,

        /// TMDB API key used by --enrich
        #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
        tmdb_api_key: Option<String>,
    },

    /// Find items similar to a given item by content features
    Similar {
        /// Item ID to find similar items for
        #[arg(long)]
        item_id: String,

        /// Number of similar items to return
        #[arg(long, default_value = "8")]
        top_n: usize,
    },

    /// Add one page of TMDB's popular movies to items.dat
    SyncPopular {
        /// Popular-list page to fetch (1-based)
        #[arg(long, default_value = "1")]
        page: u32,

        /// TMDB API key
        #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
        tmdb_api_key: Option<String>,
    },

    /// Show a user's viewing history and rating statistics
    User {
        /// User ID to display
        #[arg(long)]
        user_id: UserId,
    },

    /// Search for items by name
    Search {
        /// Text to search for (case-insensitive substring match)
        #[arg(long)]
        title: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    println!("Loading catalog from {}...", cli.data_dir.display());
    let start = Instant::now();
    let mut catalog = load_catalog(&cli.data_dir)?;
    let (users, items, ratings) = catalog.counts();
    println!(
        "{} Loaded {} users, {} items, {} ratings in {:?}",
        "✓".green(),
        users,
        items,
        ratings,
        start.elapsed()
    );

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Recommend {
            user_id,
            top_n,
            enrich,
            explain,
            tmdb_api_key,
        } => {
            let tmdb_api_key = if enrich { Some(tmdb_api_key.unwrap_or_default()) } else { None };
            handle_recommend(
                &catalog,
                cli.model_server.as_deref(),
                &user_id,
                top_n,
                explain,
                tmdb_api_key,
            )
            .await?
        }
        Commands::Similar { item_id, top_n } => {
            handle_similar(&catalog, cli.model_server.as_deref(), &item_id, top_n).await?
        }
        Commands::SyncPopular { page, tmdb_api_key } => {
            handle_sync_popular(
                &mut catalog,
                &cli.data_dir,
                page,
                tmdb_api_key.unwrap_or_default(),
            )
            .await?
        }
        Commands::User { user_id } => handle_user(&catalog, &user_id)?,
        Commands::Search { title } => handle_search(&catalog, &title)?,
    }

    Ok(())
}

fn load_catalog(data_dir: &Path) -> Result<Catalog> {
    Catalog::load_from_dir(data_dir)
        .with_context(|| format!("Failed to load catalog from {}", data_dir.display()))
}

/// Build the engine over native models, or over remote ones when a model
/// server is given. The context is returned so the caller can shut it down.
async fn build_engine(
    model_server: Option<&str>,
) -> Result<(HybridEngine, Option<ModelServingContext>)> {
    match model_server {
        Some(addr) => {
            let context = ModelServingContext::connect(addr)
                .await
                .context("Failed to connect to model server")?;
            let engine = HybridEngine::new(
                Arc::new(RemoteCollaborativeModel::new(&context)),
                Arc::new(RemoteContentModel::new(&context)),
            );
            Ok((engine, Some(context)))
        }
        None => Ok((
            HybridEngine::new(
                Arc::new(MatrixFactorizationModel::new()),
                Arc::new(GenreTfIdfModel::new()),
            ),
            None,
        )),
    }
}

async fn train_engine(engine: &HybridEngine, catalog: &Catalog) -> Result<()> {
    let start = Instant::now();
    engine
        .train_from_catalog(catalog)
        .await
        .context("Failed to train models")?;
    println!("{} Trained models in {:?}", "✓".green(), start.elapsed());
    Ok(())
}

/// Handle the 'recommend' command
///
/// `tmdb_api_key` is `Some` when enrichment was requested.
async fn handle_recommend(
    catalog: &Catalog,
    model_server: Option<&str>,
    user_id: &str,
    top_n: usize,
    explain: bool,
    tmdb_api_key: Option<String>,
) -> Result<()> {
    let user = catalog
        .get_user(user_id)
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;

    // Single model-serving connection for the whole run
    let (mut engine, context) = build_engine(model_server).await?;

    if let Some(api_key) = &tmdb_api_key {
        let client = TmdbClient::new(MetadataConfig::new(api_key.as_str()))
            .context("--enrich needs a TMDB API key (--tmdb-api-key or TMDB_API_KEY)")?;
        engine = engine.with_metadata_fetcher(Arc::new(client));
    }

    train_engine(&engine, catalog).await?;

    if explain {
        let candidates = engine
            .recommend_candidates(user, top_n)
            .await
            .context("Failed to generate recommendations")?;
        print_candidates(catalog, &candidates);
    } else {
        let recommendations = if tmdb_api_key.is_some() {
            engine.recommend_enriched(user, top_n).await
        } else {
            engine.recommend(user, top_n).await
        }
        .context("Failed to generate recommendations")?;
        print_recommendations(catalog, "Recommendations:", &recommendations);
    }

    if let Some(context) = context {
        context.shutdown();
    }
    Ok(())
}

/// Handle the 'similar' command
async fn handle_similar(
    catalog: &Catalog,
    model_server: Option<&str>,
    item_id: &str,
    top_n: usize,
) -> Result<()> {
    let item = catalog
        .get_item(item_id)
        .ok_or_else(|| anyhow!("Item {} not found", item_id))?;

    let (engine, context) = build_engine(model_server).await?;
    train_engine(&engine, catalog).await?;

    let similar = engine
        .similar_items(item_id, top_n)
        .await
        .context("Failed to find similar items")?;
    let title = format!("Similar to {} [{}]:", item.display_name(), join_genres(item));
    print_recommendations(catalog, &title, &similar);

    if let Some(context) = context {
        context.shutdown();
    }
    Ok(())
}

/// Handle the 'sync-popular' command
async fn handle_sync_popular(
    catalog: &mut Catalog,
    data_dir: &Path,
    page: u32,
    tmdb_api_key: String,
) -> Result<()> {
    let client = TmdbClient::new(MetadataConfig::new(tmdb_api_key))
        .context("sync-popular needs a TMDB API key (--tmdb-api-key or TMDB_API_KEY)")?;

    let start = Instant::now();
    let summary = sync_popular(&client, catalog, page)
        .await
        .with_context(|| format!("Failed to sync popular page {}", page))?;

    if summary.added + summary.updated > 0 {
        catalog
            .save_items(data_dir)
            .with_context(|| format!("Failed to save items to {}", data_dir.display()))?;
    }

    println!(
        "{} Page {}: {} listed, {} added, {} updated in {:?}",
        "✓".green(),
        summary.page,
        summary.fetched,
        summary.added,
        summary.updated,
        start.elapsed()
    );
    Ok(())
}

/// Handle the 'user' command
fn handle_user(catalog: &Catalog, user_id: &str) -> Result<()> {
    let user = catalog
        .get_user(user_id)
        .ok_or_else(|| anyhow!("User {} not found", user_id))?;
    let ratings = catalog.get_user_ratings(user_id);

    println!("{}", format!("User ID: {}", user.id).bold().blue());

    println!("{}Viewing history ({} views):", "• ".green(), user.viewing_history.len());
    for item_id in &user.viewing_history {
        let name = catalog.get_item(item_id).map(Item::display_name).unwrap_or(item_id.as_str());
        println!("  - {}", name);
    }

    let num_ratings = ratings.len();
    let avg_rating = if num_ratings > 0 {
        ratings.iter().map(|r| r.score).sum::<f32>() / num_ratings as f32
    } else {
        0.0
    };
    println!("{}Number of ratings: {}", "• ".cyan(), num_ratings);
    println!("{}Average rating: {:.2}", "• ".cyan(), avg_rating);

    let mut top_rated = ratings.clone();
    top_rated.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    println!("Top rated items:");
    for rating in top_rated.iter().take(5) {
        if let Some(item) = catalog.get_item(&rating.item_id) {
            println!("  - {} (Rating: {})", item.display_name(), rating.score);
        }
    }

    // Genre preferences: average score per genre
    let mut genre_ratings: HashMap<&str, (f32, u32)> = HashMap::new();
    for rating in &ratings {
        if let Some(item) = catalog.get_item(&rating.item_id) {
            for genre in &item.genres {
                let entry = genre_ratings.entry(genre.as_str()).or_insert((0.0, 0));
                entry.0 += rating.score;
                entry.1 += 1;
            }
        }
    }
    let mut genre_ratings: Vec<_> = genre_ratings.into_iter().collect();
    genre_ratings.sort_by(|a, b| a.0.cmp(b.0));
    println!("Genre preferences:");
    for (genre, (total, count)) in genre_ratings {
        println!("  - {}: Average Rating: {:.2} ({} ratings)", genre, total / count as f32, count);
    }
    Ok(())
}

/// Handle the 'search' command
fn handle_search(catalog: &Catalog, title: &str) -> Result<()> {
    let matches = catalog.search_by_name(title);

    println!("{}", format!("Search results for '{}':", title).bold().blue());
    if matches.is_empty() {
        println!("  (no matches)");
    }
    for item in matches.iter().take(20) {
        let (avg, count) = catalog
            .get_item_stats(&item.id)
            .map(|s| (s.avg_score, s.rating_count))
            .unwrap_or((0.0, 0));
        println!(
            "{}: {} [{}] avg {:.2} ({} ratings)",
            item.id,
            item.display_name(),
            join_genres(item),
            avg,
            count
        );
    }
    Ok(())
}

fn join_genres(item: &Item) -> String {
    item.genres.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Helper function to format and print recommendations
fn print_recommendations(catalog: &Catalog, title: &str, recommendations: &[Item]) {
    println!("{}", title.bold().blue());
    if recommendations.is_empty() {
        println!("  (nothing to recommend)");
    }
    for (rank, item) in recommendations.iter().enumerate() {
        let stats = catalog
            .get_item_stats(&item.id)
            .map(|s| format!("avg {:.2} from {} ratings", s.avg_score, s.rating_count))
            .unwrap_or_else(|| "no ratings".to_string());
        println!(
            "{}. {} ({}) [{}] - {}",
            (rank + 1).to_string().green(),
            item.display_name(),
            item.category,
            join_genres(item),
            stats
        );
    }
}

/// Print merged candidates with the model that contributed each one
fn print_candidates(catalog: &Catalog, candidates: &[RankedCandidate]) {
    println!("{}", "Recommendations:".bold().blue());
    if candidates.is_empty() {
        println!("  (nothing to recommend)");
    }
    for candidate in candidates {
        let name = catalog
            .get_item(&candidate.item_id)
            .map(Item::display_name)
            .unwrap_or(candidate.item_id.as_str());
        println!(
            "{}. {} - from {}",
            (candidate.rank + 1).to_string().green(),
            name,
            candidate.source.to_string().cyan()
        );
    }
}
