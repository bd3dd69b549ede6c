//! Alahas catalog server.
//!
//! Serves the storefront read API and the admin back-office API.

use std::net::SocketAddr;
use std::time::Duration;

use alahas_server::config::Config;
use alahas_server::models::User;
use alahas_server::models::user::{CreateUser, ROLE_ADMIN};
use alahas_server::routes;
use alahas_server::state::AppState;
use alahas_server::validation::{PASSWORD_MIN, is_valid_email};
use anyhow::{Context, Result, bail};
use axum::Router;
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often stale rate limit windows are dropped.
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Create an admin user.
    CreateAdmin {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        #[arg(long, default_value = "Administrator")]
        full_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CreateAdmin {
            email,
            password,
            full_name,
        } => create_admin(config, email, password, full_name).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!(port = config.port, "Starting Alahas catalog server");

    // Connects, migrates and wires services.
    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    info!("Database connection established");

    let limiter_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            limiter_state.contact_limiter().prune();
        }
    });

    let cors = build_cors_layer(&config);
    let uploads = ServeDir::new(&config.uploads_dir);

    let app = Router::new()
        .merge(routes::api_router(&state))
        .nest_service(&config.files_url, uploads)
        // Last added = first executed: TraceLayer → CORS → routes
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}

async fn create_admin(
    config: Config,
    email: String,
    password: String,
    full_name: String,
) -> Result<()> {
    if !is_valid_email(email.trim()) {
        bail!("invalid email address: {email}");
    }
    if password.chars().count() < PASSWORD_MIN {
        bail!("password must be at least {PASSWORD_MIN} characters");
    }

    let pool = alahas_server::db::create_pool(&config).await?;
    alahas_server::db::run_migrations(&pool).await?;

    if User::find_by_email(&pool, &email).await?.is_some() {
        bail!("a user with email {email} already exists");
    }

    let user = User::create(
        &pool,
        CreateUser {
            email,
            password,
            full_name,
            role: Some(ROLE_ADMIN.to_string()),
        },
    )
    .await?;

    info!(user_id = user.id, email = %user.email, "admin user created");
    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ])
            .allow_credentials(true)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
