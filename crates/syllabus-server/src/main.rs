//! Syllabus Server - learning-content catalogue over HTTP
//!
//! Serves the Class → Subject → Unit → SubUnit → Lesson hierarchy, lesson
//! content, uploads and files under `/api`, backed by MongoDB.

mod auth;
mod config;
mod state;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use syllabus::MongoDb;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::middleware::auth_middleware;
use crate::auth::service::AuthService;
use crate::config::Config;
use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "syllabus-server", version, about = "Learning-content catalogue server")]
struct Cli {
    /// TOML configuration file; environment variables are used when absent
    #[arg(short, long, env = "SYLLABUS_CONFIG")]
    config: Option<String>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "syllabus_server=info,syllabus=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config.as_deref() {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    info!("Starting Syllabus Server on {}:{}", config.host, config.port);

    let catalog_config = config.catalog();
    tokio::fs::create_dir_all(catalog_config.temp_dir())
        .await
        .with_context(|| format!("Failed to create upload root {:?}", catalog_config.upload_root))?;

    info!("Connecting to MongoDB: {}", config.database_name);
    let db = Arc::new(MongoDb::connect(&config.database_url, &config.database_name).await?);

    if let (Some(username), Some(password)) = (
        config.webmaster_username.as_deref(),
        config.webmaster_password.as_deref(),
    ) {
        AuthService::new(db.clone(), config.session_ttl_hours)
            .seed_webmaster(username, password)
            .await?;
    }
    if !config.enforce_auth {
        warn!("ENFORCE_AUTH is off: mutations are accepted without a token");
    }

    let state = Arc::new(AppState::new(db, config.clone()));
    let app = build_router(state, catalog_config)?;

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: Arc<AppState>, catalog_config: syllabus::CatalogConfig) -> Result<Router> {
    let catalog_state = Arc::new(syllabus::routes::AppState {
        db: state.db.clone(),
        config: Arc::new(catalog_config),
    });

    let api = syllabus::routes::configure(catalog_state)
        .merge(auth::routes::router().with_state(state.clone()));

    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .with_state(state.clone());

    Ok(Router::new()
        .merge(public_routes)
        .nest("/api", api)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config)?))
}

fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let origin = match config.cors_origins() {
        Some(origins) => {
            let values = origins
                .iter()
                .map(|o| HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o)))
                .collect::<Result<Vec<_>>>()?;
            AllowOrigin::list(values)
        }
        None => AllowOrigin::from(Any),
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn root() -> &'static str {
    "Syllabus Server"
}

async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.db.ping().await {
        Ok(_) => Ok(Json(serde_json::json!({
            "status": "healthy",
            "database": "connected",
            "version": env!("CARGO_PKG_VERSION")
        }))),
        Err(e) => {
            warn!("Health check failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_banner() {
        let app: Router = Router::new().route("/", get(root));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Syllabus Server");
    }

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        let mut config = Config::default();
        assert!(cors_layer(&config).is_ok());

        config.cors_allowed_origins = Some("http://ok.test".into());
        assert!(cors_layer(&config).is_ok());

        config.cors_allowed_origins = Some("bad\norigin".into());
        assert!(cors_layer(&config).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["syllabus-server", "--port", "9000", "--host", "127.0.0.1"]);
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.host.as_deref(), Some("127.0.0.1"));
    }
}
