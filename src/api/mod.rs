pub mod auth;
pub mod health;
pub mod swagger;
pub mod users;

use crate::middleware::AuthMiddleware;
use crate::services::auth_service::AuthPolicy;
use crate::utils::error::ServiceError;
use actix_web::{middleware::Condition, web, HttpResponse};
use serde::Serialize;

/// Uniform JSON response wrapper used by every route.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct Envelope {
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "sessionToken", skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl Envelope {
    pub fn data(value: impl Serialize) -> Self {
        Envelope {
            error: false,
            message: None,
            data: Some(serde_json::to_value(value).unwrap_or(serde_json::Value::Null)),
            token: None,
            session_token: None,
        }
    }

    pub fn message(msg: &str) -> Self {
        Envelope {
            error: false,
            message: Some(msg.to_string()),
            data: None,
            token: None,
            session_token: None,
        }
    }

    pub fn message_with_data(msg: &str, value: impl Serialize) -> Self {
        Envelope {
            error: false,
            message: Some(msg.to_string()),
            data: Some(serde_json::to_value(value).unwrap_or(serde_json::Value::Null)),
            token: None,
            session_token: None,
        }
    }

    pub fn fail(msg: &str) -> Self {
        Envelope {
            error: true,
            message: Some(msg.to_string()),
            data: None,
            token: None,
            session_token: None,
        }
    }
}

/// Maps a service failure onto the wire: validation and conflict become 400,
/// not-found 404, anything else 500 with `fallback` as the message while the
/// underlying cause stays in the server log.
pub fn error_response(err: ServiceError, fallback: &str) -> HttpResponse {
    match err {
        ServiceError::Validation(msg) | ServiceError::Conflict(msg) => {
            HttpResponse::BadRequest().json(Envelope::fail(&msg))
        }
        ServiceError::NotFound(msg) => HttpResponse::NotFound().json(Envelope::fail(&msg)),
        other => {
            log::error!("❌ {}: {}", fallback, other);
            HttpResponse::InternalServerError().json(Envelope::fail(fallback))
        }
    }
}

/// Route table, shared by `main` and the handler tests. The bearer middleware
/// guards /users only when the policy asks for it.
pub fn routes(policy: AuthPolicy) -> impl Fn(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.route("/health", web::get().to(health::health_check))
            .route("/auth", web::post().to(auth::create_account))
            .service(
                web::scope("/users")
                    .wrap(Condition::new(policy.protect_users, AuthMiddleware))
                    .route("", web::post().to(users::create_user))
                    .route("", web::get().to(users::list_users))
                    .route("/{id}", web::get().to(users::get_user))
                    .route("/{id}", web::put().to(users::update_user))
                    .route("/{id}", web::delete().to(users::delete_user)),
            );
    }
}
