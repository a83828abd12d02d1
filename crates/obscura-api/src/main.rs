use std::net::Ipv4Addr;

use anyhow::Context;
use clap::Parser;
use obscura_core::config::{
    DEFAULT_HASH_CACHE_CAPACITY, DEFAULT_LINK_CACHE_CAPACITY, DEFAULT_META_CACHE_CAPACITY,
    DEFAULT_PORT,
};
use obscura_core::Config;
use tracing_subscriber::EnvFilter;

// Mimalloc keeps allocation cheap under many small chunk copies, especially
// on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Image ingestion and retrieval behind ephemeral upload links.
#[derive(Parser, Debug)]
#[command(name = "obscura", version)]
struct Args {
    /// Listening port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Cache capacity for upload links
    #[arg(long = "cache-links", default_value_t = DEFAULT_LINK_CACHE_CAPACITY)]
    cache_links: usize,

    /// Cache capacity for image metadata
    #[arg(long = "cache-meta", default_value_t = DEFAULT_META_CACHE_CAPACITY)]
    cache_meta: usize,

    /// Cache capacity for the content-hash index
    #[arg(long = "cache-hashes", default_value_t = DEFAULT_HASH_CACHE_CAPACITY)]
    cache_hashes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obscura_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    config.port = args.port;
    config.link_cache_capacity = args.cache_links;
    config.meta_cache_capacity = args.cache_meta;
    config.hash_cache_capacity = args.cache_hashes;

    let (_state, router) = obscura_api::setup::initialize_app(config.clone())
        .await
        .context("error initializing repositories")?;

    let listener = tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    tracing::info!(port = config.port, "listening");

    axum::serve(listener, router).await?;
    Ok(())
}
