use crate::api::{error_response, Envelope};
use crate::services::auth_service::{self, SignupRequest};
use crate::state::AppState;
use crate::validation;
use actix_web::{web, HttpResponse};

const CREATE_FAILED: &str = "Failed to create user";

/// POST /auth - consolidated account creation (the two historical variants
/// collapsed behind `AuthPolicy`): validate, optional duplicate lookup,
/// provider account + mirrored profile, bearer credential, optional exchange
/// for a session token.
#[utoipa::path(
    post,
    path = "/auth",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = Envelope),
        (status = 400, description = "Validation failure or duplicate email", body = Envelope),
        (status = 500, description = "Provider or store failure", body = Envelope)
    )
)]
pub async fn create_account(
    state: web::Data<AppState>,
    request: web::Json<SignupRequest>,
) -> HttpResponse {
    log::info!(
        "🔐 POST /auth - email: {}",
        request.email.as_deref().unwrap_or("<missing>")
    );

    let valid = match validation::validate_signup(&request) {
        Ok(valid) => valid,
        Err(e) => return error_response(e, CREATE_FAILED),
    };

    match auth_service::signup(
        state.credentials.as_ref(),
        state.store.as_ref(),
        &state.policy,
        valid,
    )
    .await
    {
        Ok(outcome) => {
            let mut envelope = Envelope::message("Successfully created user");
            envelope.token = Some(outcome.token);
            envelope.session_token = outcome.session_token;
            HttpResponse::Created().json(envelope)
        }
        Err(e) => error_response(e, CREATE_FAILED),
    }
}
