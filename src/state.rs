use crate::services::auth_service::{AuthPolicy, CredentialProvider};
use crate::services::user_service::UserStore;
use std::sync::Arc;

/// Process-wide external-service handles, injected into every handler via
/// `web::Data` instead of ambient globals so tests can substitute fakes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub policy: AuthPolicy,
}

impl AppState {
    pub fn new(
        store: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialProvider>,
        policy: AuthPolicy,
    ) -> Self {
        AppState {
            store,
            credentials,
            policy,
        }
    }
}
