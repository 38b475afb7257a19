mod config;
mod database;
mod email;
mod error;
mod filters;
mod handlers;
mod middleware;
mod models;
mod pricing;
mod utils;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use dotenvy::dotenv;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::Config;
use database::{create_database_pool, Database};
use email::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub mailer: Mailer,
    pub http: reqwest::Client,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let config = Config::from_env();

    let db = create_database_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    println!("Database connection successful!");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client");
    let mailer = Mailer::new(&config, http.clone());

    let addr = format!("0.0.0.0:{}", config.port);
    let state = AppState {
        db,
        config: Arc::new(config),
        mailer,
        http,
    };

    let app = create_router(state);

    println!("🚀 QuoteDesk server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn create_router(state: AppState) -> Router {
    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health))
        .route("/accept-quote", post(handlers::public::accept_quote))
        .route("/public-quote", get(handlers::public::public_quote))
        .route("/company-logo", get(handlers::public::company_logo))
        // Customer routes
        .route("/api/customers", get(handlers::customers::list_customers))
        .route("/api/customers", post(handlers::customers::create_customer))
        .route("/api/customers/:id", get(handlers::customers::get_customer))
        .route("/api/customers/:id", put(handlers::customers::update_customer))
        .route("/api/customers/:id", delete(handlers::customers::delete_customer))
        .route("/api/customers/:id/quotes", get(handlers::customers::customer_quotes))
        // Product catalog routes
        .route("/api/products", get(handlers::products::list_products))
        .route("/api/products", post(handlers::products::create_product))
        .route("/api/products/:id", get(handlers::products::get_product))
        .route("/api/products/:id", put(handlers::products::update_product))
        .route("/api/products/:id", delete(handlers::products::delete_product))
        // Quote routes
        .route("/api/quotes", get(handlers::quotes::list_quotes))
        .route("/api/quotes", post(handlers::quotes::create_quote))
        .route("/api/quotes/:id", get(handlers::quotes::get_quote))
        .route("/api/quotes/:id", put(handlers::quotes::update_quote))
        .route("/api/quotes/:id/cancel", post(handlers::quotes::cancel_quote))
        .route("/api/quotes/:id/duplicate", post(handlers::quotes::duplicate_quote))
        .route("/api/send-quote-link", post(handlers::quotes::send_quote_link))
        // Company settings
        .route("/api/company", get(handlers::company::get_company))
        .route("/api/company", put(handlers::company::update_company))
        // Team management
        .route("/api/team/members", get(handlers::team::list_members))
        .route("/api/invite-user", post(handlers::team::invite_user))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(10 * 1024 * 1024)), // signature data URLs
        )
        .with_state(state)
}
