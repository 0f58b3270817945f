use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use warp::Filter;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use foodgram_backend::api::routes::routes;
use foodgram_backend::cache::cache::{invalidate, CacheKey};
use foodgram_backend::database::actions::{import, tags};
use foodgram_backend::database::migrations::run_migrations;
use foodgram_backend::error::handle_rejection;

#[derive(Parser)]
#[command(name = "foodgram-backend", about = "Recipe sharing backend API")]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Redis connection string
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations and serve the HTTP API
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
        bind: String,

        /// Directory recipe images are stored in and served from
        #[arg(long, env = "MEDIA_ROOT", default_value = "media")]
        media_root: PathBuf,
    },
    /// Apply pending schema migrations and exit
    Migrate,
    /// Insert the static tag set
    SeedTags,
    /// Bulk-load the ingredient catalog from a CSV or JSON file
    ImportIngredients { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let pool: Pool<Postgres> = PgPoolOptions::new()
        .max_connections(16)
        .connect(&cli.database_url)
        .await?;

    match cli.command {
        Command::Serve { bind, media_root } => {
            run_migrations(&pool).await?;

            let client = redis::Client::open(cli.redis_url.as_str())?;
            let cache = client.get_multiplexed_tokio_connection().await?;

            let addr: SocketAddr = bind.parse()?;
            let filter = routes(pool, cache, media_root).recover(handle_rejection);

            log::info!("listening on {addr}");
            warp::serve(filter).run(addr).await;
        }
        Command::Migrate => {
            run_migrations(&pool).await?;
            log::info!("migrations are up to date");
        }
        Command::SeedTags => {
            run_migrations(&pool).await?;

            let created = tags::seed_tags(&pool).await?;
            invalidate_catalog(&cli.redis_url, CacheKey::Tags).await;

            log::info!("created {created} tags");
        }
        Command::ImportIngredients { path } => {
            run_migrations(&pool).await?;

            let format = import::ImportFormat::from_path(&path)
                .ok_or("unsupported file extension, expected .csv or .json")?;
            let data = tokio::fs::read(&path).await?;

            let rows = match format {
                import::ImportFormat::Csv => import::parse_ingredients_csv(&data)?,
                import::ImportFormat::Json => import::parse_ingredients_json(&data)?,
            };

            let inserted = import::import_ingredients(&pool, &rows).await?;
            invalidate_catalog(&cli.redis_url, CacheKey::IngredientCatalog).await;

            log::info!("imported {inserted} of {} catalog rows", rows.len());
        }
    }

    Ok(())
}

/// Catalog commands drop the matching cache entry; a missing redis
/// only costs one stale read-through, so it is not fatal here.
async fn invalidate_catalog(redis_url: &str, key: CacheKey) {
    let client = match redis::Client::open(redis_url) {
        Ok(client) => client,
        Err(e) => {
            log::warn!("skipping cache invalidation: {e}");
            return;
        }
    };

    let mut cache = match client.get_multiplexed_tokio_connection().await {
        Ok(cache) => cache,
        Err(e) => {
            log::warn!("skipping cache invalidation: {e}");
            return;
        }
    };

    if let Err(e) = invalidate(key, &mut cache).await {
        log::warn!("cache invalidation failed: {e}");
    }
}
