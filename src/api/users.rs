use crate::api::{error_response, Envelope};
use crate::models::UserRecord;
use crate::services::user_service::{self, CreateUserRequest, UpdateUserRequest};
use crate::state::AppState;
use crate::validation;
use actix_web::{web, HttpResponse};

/// POST /users - create a profile. The account itself is registered with the
/// auth provider (which owns the passphrase and enforces email uniqueness);
/// only sanitized profile fields reach the store.
#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = Envelope),
        (status = 400, description = "Validation failure or duplicate email", body = Envelope),
        (status = 500, description = "Provider or store failure", body = Envelope)
    )
)]
pub async fn create_user(
    state: web::Data<AppState>,
    request: web::Json<CreateUserRequest>,
) -> HttpResponse {
    log::info!(
        "📝 POST /users - email: {}",
        request.email.as_deref().unwrap_or("<missing>")
    );

    let valid = match validation::validate_new_user(&request) {
        Ok(valid) => valid,
        Err(e) => return error_response(e, "Failed to create user"),
    };

    match user_service::create_user(state.credentials.as_ref(), state.store.as_ref(), valid).await
    {
        Ok(_) => HttpResponse::Created().json(Envelope::message("Successfully created user")),
        Err(e) => error_response(e, "Failed to create user"),
    }
}

/// GET /users - list every profile record.
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    responses(
        (status = 200, description = "All user records", body = Envelope),
        (status = 500, description = "Store failure", body = Envelope)
    )
)]
pub async fn list_users(state: web::Data<AppState>) -> HttpResponse {
    log::info!("📋 GET /users");

    match state.store.list().await {
        Ok(users) => {
            let records: Vec<UserRecord> = users.into_iter().map(UserRecord::from).collect();
            HttpResponse::Ok().json(Envelope::data(records))
        }
        Err(e) => error_response(e, "Failed to fetch users"),
    }
}

/// GET /users/{id}
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "Record identifier")),
    responses(
        (status = 200, description = "User record", body = Envelope),
        (status = 404, description = "User not found", body = Envelope)
    )
)]
pub async fn get_user(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    log::info!("🔍 GET /users/{}", id);

    // The identifier is bounded before any store lookup happens
    let id = match validation::validate_record_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(e, "Failed to fetch user"),
    };

    match state.store.get(&id).await {
        Ok(Some(user)) => HttpResponse::Ok().json(Envelope::data(UserRecord::from(user))),
        Ok(None) => HttpResponse::NotFound().json(Envelope::fail("User not found")),
        Err(e) => error_response(e, "Failed to fetch user"),
    }
}

/// PUT /users/{id} - field-level partial update; existence is checked first
/// and the post-update snapshot is returned.
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    request_body = UpdateUserRequest,
    params(("id" = String, Path, description = "Record identifier")),
    responses(
        (status = 200, description = "Updated record", body = Envelope),
        (status = 400, description = "Validation failure", body = Envelope),
        (status = 404, description = "User not found", body = Envelope)
    )
)]
pub async fn update_user(
    state: web::Data<AppState>,
    id: web::Path<String>,
    request: web::Json<UpdateUserRequest>,
) -> HttpResponse {
    log::info!("🔧 PUT /users/{}", id);

    let id = match validation::validate_record_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(e, "Failed to update user"),
    };
    let patch = match validation::validate_user_patch(&request) {
        Ok(patch) => patch,
        Err(e) => return error_response(e, "Failed to update user"),
    };

    match user_service::update_user(state.credentials.as_ref(), state.store.as_ref(), &id, patch)
        .await
    {
        Ok(Some(user)) => HttpResponse::Ok().json(Envelope::message_with_data(
            "User updated successfully",
            UserRecord::from(user),
        )),
        Ok(None) => HttpResponse::NotFound().json(Envelope::fail("User not found")),
        Err(e) => error_response(e, "Failed to update user"),
    }
}

/// DELETE /users/{id}
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "Record identifier")),
    responses(
        (status = 200, description = "User deleted", body = Envelope),
        (status = 404, description = "User not found", body = Envelope)
    )
)]
pub async fn delete_user(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    log::info!("🗑️  DELETE /users/{}", id);

    let id = match validation::validate_record_id(&id) {
        Ok(id) => id,
        Err(e) => return error_response(e, "Failed to delete user"),
    };

    match state.store.delete(&id).await {
        Ok(true) => HttpResponse::Ok().json(Envelope::message("User deleted successfully")),
        Ok(false) => HttpResponse::NotFound().json(Envelope::fail("User not found")),
        Err(e) => error_response(e, "Failed to delete user"),
    }
}

#[cfg(test)]
mod tests {
    use crate::api;
    use crate::services::auth_service::{AuthPolicy, CredentialProvider};
    use crate::services::user_service::{NewUserRecord, UserStore};
    use crate::testing::test_state;
    use actix_web::{test, App};

    async fn seed(store: &crate::testing::MemoryUserStore, email: &str, firstname: &str) -> String {
        store
            .create(NewUserRecord {
                email: email.to_string(),
                firstname: Some(firstname.to_string()),
                lastname: None,
            })
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn get_missing_user_is_404_with_fixed_message() {
        let (state, _, _) = test_state();
        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::get().uri("/users/nope").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 404);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body, serde_json::json!({ "error": true, "message": "User not found" }));
    }

    #[actix_web::test]
    async fn oversized_id_is_rejected_before_any_store_lookup() {
        let (state, store, _) = test_state();
        // A store call would surface as a 500; the validator must fire first.
        store.fail_next_ops();

        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::get()
            .uri("/users/abcdefghijklmnopqrstu")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 400);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["message"], "ID must be at most 20 characters long");
    }

    #[actix_web::test]
    async fn update_capitalizes_and_returns_snapshot_with_updated_at() {
        let (state, store, _) = test_state();
        let id = seed(&store, "jane@example.com", "Jane").await;

        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::put()
            .uri(&format!("/users/{}", id))
            .set_json(serde_json::json!({ "firstname": "bob" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], false);
        assert_eq!(body["message"], "User updated successfully");
        assert_eq!(body["data"]["firstname"], "Bob");
        assert!(body["data"]["updatedAt"].as_str().is_some());
    }

    #[actix_web::test]
    async fn update_of_missing_user_is_404() {
        let (state, _, _) = test_state();
        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::put()
            .uri("/users/nope")
            .set_json(serde_json::json!({ "firstname": "bob" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 404);
    }

    #[actix_web::test]
    async fn update_forwards_passphrase_to_the_provider_not_the_store() {
        let (state, store, provider) = test_state();
        provider
            .create_account("jane@example.com", "secret1")
            .await
            .unwrap();
        let id = seed(&store, "jane@example.com", "Jane").await;

        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::put()
            .uri(&format!("/users/{}", id))
            .set_json(serde_json::json!({ "passphrase": "new-secret" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);

        assert!(provider.verify_passphrase("jane@example.com", "new-secret"));
    }

    #[actix_web::test]
    async fn update_rekeys_provider_account_when_email_changes() {
        let (state, store, provider) = test_state();
        provider
            .create_account("jane@example.com", "secret1")
            .await
            .unwrap();
        let id = seed(&store, "jane@example.com", "Jane").await;

        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::put()
            .uri(&format!("/users/{}", id))
            .set_json(serde_json::json!({ "email": "janet@example.com" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        // A later credential patch is keyed by the stored email, which is now
        // the new address; the provider account must have moved with it.
        let req = test::TestRequest::put()
            .uri(&format!("/users/{}", id))
            .set_json(serde_json::json!({ "passphrase": "fresh-secret" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        assert!(provider.verify_passphrase("janet@example.com", "fresh-secret"));
        assert!(!provider.verify_passphrase("jane@example.com", "fresh-secret"));
    }

    #[actix_web::test]
    async fn create_validates_then_registers_account_and_profile() {
        let (state, store, provider) = test_state();
        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::post()
            .uri("/users")
            .set_json(serde_json::json!({
                "email": "jane@example.com",
                "firstname": "john paul",
                "lastname": "jones",
                "passphrase": "secret1",
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 201);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["message"], "Successfully created user");

        let users = store.all();
        assert_eq!(users[0].firstname.as_deref(), Some("John Paul"));
        assert_eq!(users[0].lastname.as_deref(), Some("Jones"));
        assert!(provider.verify_passphrase("jane@example.com", "secret1"));
    }

    #[actix_web::test]
    async fn create_with_taken_email_is_400_user_already_exists() {
        let (state, store, _) = test_state();
        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let body = serde_json::json!({
            "email": "jane@example.com",
            "firstname": "jane",
            "passphrase": "secret1",
        });

        let req = test::TestRequest::post().uri("/users").set_json(&body).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);

        // The provider rejects the second registration; no second profile
        // reaches the store.
        let req = test::TestRequest::post().uri("/users").set_json(&body).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 400);

        let json: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(json["error"], true);
        assert_eq!(json["message"], "User already exists");
        assert_eq!(store.all().len(), 1);
    }

    #[actix_web::test]
    async fn create_missing_firstname_is_400_with_required_message() {
        let (state, _, _) = test_state();
        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::post()
            .uri("/users")
            .set_json(serde_json::json!({
                "email": "jane@example.com",
                "passphrase": "secret1",
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 400);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["message"], "First name is required");
    }

    #[actix_web::test]
    async fn list_returns_envelope_with_record_array() {
        let (state, store, _) = test_state();
        seed(&store, "a@example.com", "A").await;
        seed(&store, "b@example.com", "B").await;

        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::get().uri("/users").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], false);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert!(body["data"][0]["createdAt"].as_str().is_some());
    }

    #[actix_web::test]
    async fn delete_is_200_then_404() {
        let (state, store, _) = test_state();
        let id = seed(&store, "jane@example.com", "Jane").await;

        let app =
            test::init_service(App::new().app_data(state).configure(api::routes(
                AuthPolicy::default(),
            )))
            .await;

        let req = test::TestRequest::delete()
            .uri(&format!("/users/{}", id))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["message"], "User deleted successfully");

        let req = test::TestRequest::delete()
            .uri(&format!("/users/{}", id))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 404);
    }
}
