use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Identity Service API",
        version = "1.0.0",
        description = "User identity and profile service.\n\nAccount creation and credential verification are delegated to a managed auth provider; profile records live in a managed document store. Every route answers with the uniform `{error, message?, data?, token?}` envelope.",
    ),
    paths(
        crate::api::auth::create_account,
        crate::api::users::create_user,
        crate::api::users::list_users,
        crate::api::users::get_user,
        crate::api::users::update_user,
        crate::api::users::delete_user,
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::api::Envelope,
            crate::api::health::HealthResponse,
            crate::models::UserRecord,
            crate::services::auth_service::SignupRequest,
            crate::services::user_service::CreateUserRequest,
            crate::services::user_service::UpdateUserRequest,
        )
    ),
    tags(
        (name = "Auth", description = "Account creation. Issues a bearer credential and, when enabled, exchanges it for a session-ready token."),
        (name = "Users", description = "Profile record CRUD. Field values are validated and sanitized at the boundary."),
        (name = "Health", description = "Health check endpoint for monitoring service status."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Enter your bearer token"))
                        .build(),
                ),
            );
        }
    }
}
