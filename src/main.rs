//! Domus back office server
//!
//! Invoice numbering, exchange rates, contracts, monthly invoices and rent
//! indexation over HTTP. Runs on PostgreSQL when a database URL is
//! configured and on local JSON files otherwise.

use std::env;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use domus_api::AppServices;
use domus_cache::{RedisCache, RedisRateMemo};
use domus_core::traits::{InvoiceSequenceRepository, RateMemo};
use domus_core::AppConfig;
use domus_db::{create_pool, run_migrations, JsonFileStore, Repositories};
use domus_services::{
    ContractService, ExchangeRateResolver, HttpRateFetcher, IndexationService, InvoiceService,
    MemoryRateMemo, SequenceAllocator,
};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "domus_backoffice={lvl},domus_api={lvl},domus_services={lvl},domus_db={lvl},domus_cache={lvl},actix_web=info,sqlx=warn",
            lvl = log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Select the storage backend
///
/// Returns the repositories used by the services and, when PostgreSQL is
/// configured, the sequence store the allocator should try first.
async fn init_storage(
    config: &AppConfig,
    local: Arc<JsonFileStore>,
) -> anyhow::Result<(Repositories, Option<Arc<dyn InvoiceSequenceRepository>>)> {
    let Some(url) = config.database.url.as_deref() else {
        info!(
            "No database configured, using JSON files in {}",
            local.dir().display()
        );
        return Ok((Repositories::file(local), None));
    };

    info!("Connecting to database...");
    let pool = create_pool(url, Some(config.database.max_connections))
        .await
        .context("Failed to create database pool")?;

    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    info!(
        "Database connection established with {} max connections",
        config.database.max_connections
    );

    let repositories = Repositories::postgres(pool);
    let primary = repositories.sequences.clone();
    Ok((repositories, Some(primary)))
}

/// Shared rate memo when Redis is configured, per-process otherwise
async fn init_rate_memo(config: &AppConfig) -> Arc<dyn RateMemo> {
    let Some(url) = config.redis.url.as_deref() else {
        return Arc::new(MemoryRateMemo::new());
    };

    let connected = match RedisCache::new(url).await {
        Ok(cache) => cache.ping().await.map(|_| cache),
        Err(e) => Err(e),
    };

    match connected {
        Ok(cache) => {
            info!("Sharing last fetched exchange rates through Redis");
            Arc::new(RedisRateMemo::with_ttl(cache, config.redis.default_ttl_secs))
        }
        Err(e) => {
            warn!("Redis unavailable, keeping exchange rates in memory: {}", e);
            Arc::new(MemoryRateMemo::new())
        }
    }
}

async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let local = Arc::new(JsonFileStore::new(config.storage.data_dir.clone()));
    let (repos, primary_sequences) = init_storage(config, local.clone()).await?;

    let sequences = Arc::new(SequenceAllocator::from_config(
        primary_sequences,
        local,
        &config.invoicing,
    )?);

    let fetcher = HttpRateFetcher::new(&config.exchange).context("Invalid exchange source")?;
    let exchange = Arc::new(ExchangeRateResolver::new(
        repos.exchange_rates.clone(),
        Arc::new(fetcher),
        init_rate_memo(config).await,
        &config.exchange,
        config.invoicing.tz()?,
    ));

    let invoices = Arc::new(InvoiceService::new(
        repos.contracts.clone(),
        repos.invoices.clone(),
        sequences.clone(),
        exchange.clone(),
        &config.invoicing,
    )?);

    Ok(AppServices {
        sequences,
        exchange,
        contracts: Arc::new(ContractService::new(repos.contracts.clone())),
        invoices,
        indexation: Arc::new(IndexationService::new(
            repos.hicp.clone(),
            repos.contracts.clone(),
            &config.indexation,
        )),
    })
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Domus back office v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("Failed to load configuration")?;
    let services = build_services(&config).await?;

    let bind_addr = config.server_addr();
    let workers = config.server.workers.max(1);
    let cors_origins = config.server.cors_origins.clone();

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                origin
                    .to_str()
                    .map(|origin| {
                        cors_origins_inner
                            .split(',')
                            .any(|allowed| allowed.trim() == origin)
                    })
                    .unwrap_or(false)
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        let services = services.clone();
        App::new()
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(move |cfg| services.configure(cfg))
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await?;

    Ok(())
}
