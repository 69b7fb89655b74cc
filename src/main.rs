mod api;
mod database;
mod middleware;
mod models;
mod services;
mod state;
#[cfg(test)]
mod testing;
mod utils;
mod validation;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use services::auth_service::{AuthPolicy, HttpCredentialProvider};
use services::user_service::MongoUserStore;
use state::AppState;
use std::env;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Get configuration from environment
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    log::info!("🚀 Starting Identity Service...");

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&database_url)
        .await
        .expect("Failed to connect to MongoDB");

    log::info!("✅ MongoDB connected successfully");

    let policy = AuthPolicy::from_env();
    log::info!(
        "🔐 Auth policy: duplicate_check={}, token_exchange={}, protect_users={}",
        policy.duplicate_check,
        policy.token_exchange,
        policy.protect_users
    );

    let app_state = web::Data::new(AppState::new(
        Arc::new(MongoUserStore::new(db)),
        Arc::new(HttpCredentialProvider::from_env()),
        policy,
    ));

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .supports_credentials()
            .max_age(3600);

        // Malformed bodies answer with the uniform envelope instead of the
        // framework's default error text
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            actix_web::error::InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(api::Envelope::fail("Invalid request body")),
            )
            .into()
        });

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(app_state.clone())
            .app_data(json_config)
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi),
            )
            .configure(api::routes(policy))
    })
    .bind(format!("{}:{}", host, port))?
    .run()
    .await
}
