use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blogstats::{api, cache::AppCache, config::Settings, db, geo::GeoIpLookup, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let settings = Settings::new()?;
    let site_tz = settings.timezone()?;
    info!("Configuration loaded (site timezone {})", site_tz);

    // Determine database URL
    let db_url = settings
        .database_url
        .clone()
        .or_else(|| {
            settings
                .database_path
                .as_ref()
                .map(|p| format!("sqlite:{}?mode=rwc", p))
        })
        .unwrap_or_else(|| {
            #[cfg(feature = "postgres")]
            {
                "postgres://localhost/blogstats".to_string()
            }
            #[cfg(all(feature = "sqlite", not(feature = "postgres")))]
            {
                "sqlite:blogstats.db?mode=rwc".to_string()
            }
        });

    info!("Connecting to database...");
    let pool = db::create_pool(&db_url).await?;
    info!("Database connected");

    // Run migrations
    info!("Running migrations...");
    db::run_migrations(&pool).await?;
    info!("Migrations complete");

    // Initialize GeoIP
    let geo = GeoIpLookup::new(
        settings.maxmind_city_db.as_deref(),
        settings.maxmind_asn_db.as_deref(),
    )?;
    if geo.is_available() {
        info!("GeoIP lookup available");
    } else {
        info!("GeoIP lookup not available (no database files)");
    }

    let cache = AppCache::new(&settings);
    let state = AppState::new(pool, cache, settings.clone(), geo)?;
    if !state.local_sources.networks().is_empty() {
        info!(
            "Treating {} configured network(s) as local traffic",
            state.local_sources.networks().len()
        );
    }

    // CORS layer
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::new(
        settings.host.parse().unwrap_or([0, 0, 0, 0].into()),
        settings.port,
    );
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
