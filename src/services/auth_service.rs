// ==================== CREDENTIAL SERVICE ADAPTER ====================
// Thin pass-through to the managed auth provider. Accounts and passphrases
// live at the provider; this service only mints/verifies bearer credentials
// locally (HS256, issuer and audience pinned) and relays account calls over
// its REST API.

use crate::utils::error::ServiceError;
use crate::validation::ValidSignup;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

// Bearer credential claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // provider account uid
    pub email: String,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

/// Canonical account record as the provider reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccount {
    pub uid: String,
    pub email: String,
}

/// Session-ready token minted by the provider's token-exchange endpoint.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<String>,
}

// Request/Response structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub passphrase: Option<String>,
}

#[derive(Debug)]
pub struct SignupOutcome {
    pub token: String,
    pub session_token: Option<String>,
}

/// Feature switches for the consolidated account-creation handler. The two
/// historical variants collapse into one flow: duplicate-check and
/// token-exchange are toggled here instead of living in parallel files.
#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    pub duplicate_check: bool,
    pub token_exchange: bool,
    /// Wire the bearer-verification middleware onto the /users scope.
    pub protect_users: bool,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        AuthPolicy {
            duplicate_check: true,
            token_exchange: true,
            protect_users: false,
        }
    }
}

impl AuthPolicy {
    pub fn from_env() -> Self {
        fn flag(name: &str, default: bool) -> bool {
            std::env::var(name)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        }

        AuthPolicy {
            duplicate_check: flag("AUTH_DUPLICATE_CHECK", true),
            token_exchange: flag("AUTH_TOKEN_EXCHANGE", true),
            protect_users: flag("AUTH_PROTECT_USERS", false),
        }
    }
}

/// Managed auth provider operations. Object-safe so handlers can hold the
/// adapter behind `Arc<dyn CredentialProvider>` and tests can substitute a
/// fake implementation.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        passphrase: &str,
    ) -> Result<ProviderAccount, ServiceError>;

    /// `Ok(None)` means the account does not exist - a valid negative result,
    /// explicitly distinguished from transport/provider failures (`Err`).
    async fn lookup_by_email(&self, email: &str) -> Result<Option<ProviderAccount>, ServiceError>;

    async fn mint_custom_token(&self, account: &ProviderAccount) -> Result<String, ServiceError>;

    async fn verify_id_token(&self, token: &str) -> Result<Claims, ServiceError>;

    async fn exchange_custom_token(&self, token: &str) -> Result<SessionToken, ServiceError>;

    async fn update_passphrase(&self, email: &str, passphrase: &str) -> Result<(), ServiceError>;

    /// Re-key the provider account; the new address must be free.
    async fn update_email(&self, email: &str, new_email: &str) -> Result<(), ServiceError>;
}

fn get_jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "default-secret-change-me".to_string())
}

fn get_jwt_issuer() -> String {
    std::env::var("JWT_ISSUER").unwrap_or_else(|_| "identity-service".to_string())
}

fn get_jwt_audience() -> String {
    std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "identity-api".to_string())
}

// Mint a bearer credential for a provider account
pub fn mint_bearer(uid: &str, email: &str) -> Result<String, ServiceError> {
    let iat = Utc::now().timestamp() as usize;
    let exp = (Utc::now() + Duration::hours(24)).timestamp() as usize;
    let jti = Uuid::new_v4().to_string();

    let claims = Claims {
        sub: uid.to_string(),
        email: email.to_string(),
        iat,
        exp,
        jti,
        aud: get_jwt_audience(),
        iss: get_jwt_issuer(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(get_jwt_secret().as_ref()),
    )
    .map_err(|e| ServiceError::Provider(format!("Failed to generate token: {}", e)))
}

// Verify a bearer credential
pub fn verify_bearer(token: &str) -> Result<Claims, ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[get_jwt_audience()]);

    let mut issuers = HashSet::new();
    issuers.insert(get_jwt_issuer());
    validation.iss = Some(issuers);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(get_jwt_secret().as_ref()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::Provider(format!("Invalid token: {}", e)))
}

/// REST-backed adapter for an identity-toolkit-style provider. The API key
/// authorizes the token-exchange endpoint.
pub struct HttpCredentialProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCredentialProvider {
    pub fn from_env() -> Self {
        let base_url = std::env::var("IDENTITY_BASE_URL")
            .unwrap_or_else(|_| "https://identitytoolkit.googleapis.com/v1".to_string());
        let api_key = std::env::var("IDENTITY_API_KEY").unwrap_or_default();

        if api_key.is_empty() {
            log::warn!("⚠️  IDENTITY_API_KEY not set - provider calls will be rejected");
        }

        HttpCredentialProvider {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/accounts:{}?key={}", self.base_url, action, self.api_key)
    }

    async fn post(
        &self,
        action: &str,
        body: serde_json::Value,
    ) -> Result<(reqwest::StatusCode, serde_json::Value), ServiceError> {
        let response = self
            .http
            .post(self.endpoint(action))
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Provider(format!("{} response unreadable: {}", action, e)))?;

        Ok((status, payload))
    }
}

/// Provider error codes arrive as `{"error": {"message": "CODE"}}`.
fn provider_error_code(payload: &serde_json::Value) -> &str {
    payload["error"]["message"].as_str().unwrap_or("")
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn create_account(
        &self,
        email: &str,
        passphrase: &str,
    ) -> Result<ProviderAccount, ServiceError> {
        let (status, payload) = self
            .post(
                "signUp",
                serde_json::json!({
                    "email": email,
                    "password": passphrase,
                    "returnSecureToken": false,
                }),
            )
            .await?;

        if !status.is_success() {
            let code = provider_error_code(&payload);
            if code.starts_with("EMAIL_EXISTS") {
                return Err(ServiceError::Conflict("User already exists".to_string()));
            }
            return Err(ServiceError::Provider(format!(
                "signUp rejected ({}): {}",
                status, code
            )));
        }

        let uid = payload["localId"]
            .as_str()
            .ok_or_else(|| ServiceError::Provider("signUp response missing localId".to_string()))?;

        Ok(ProviderAccount {
            uid: uid.to_string(),
            email: email.to_string(),
        })
    }

    async fn lookup_by_email(&self, email: &str) -> Result<Option<ProviderAccount>, ServiceError> {
        let (status, payload) = self
            .post("lookup", serde_json::json!({ "email": [email] }))
            .await?;

        if !status.is_success() {
            let code = provider_error_code(&payload);
            // Absent account is a valid negative result, not a failure
            if code.starts_with("EMAIL_NOT_FOUND") || code.starts_with("USER_NOT_FOUND") {
                return Ok(None);
            }
            return Err(ServiceError::Provider(format!(
                "lookup rejected ({}): {}",
                status, code
            )));
        }

        let account = payload["users"].as_array().and_then(|users| users.first());
        match account {
            Some(user) => {
                let uid = user["localId"].as_str().ok_or_else(|| {
                    ServiceError::Provider("lookup response missing localId".to_string())
                })?;
                Ok(Some(ProviderAccount {
                    uid: uid.to_string(),
                    email: user["email"].as_str().unwrap_or(email).to_string(),
                }))
            }
            None => Ok(None),
        }
    }

    async fn mint_custom_token(&self, account: &ProviderAccount) -> Result<String, ServiceError> {
        mint_bearer(&account.uid, &account.email)
    }

    async fn verify_id_token(&self, token: &str) -> Result<Claims, ServiceError> {
        verify_bearer(token)
    }

    async fn exchange_custom_token(&self, token: &str) -> Result<SessionToken, ServiceError> {
        let (status, payload) = self
            .post(
                "signInWithCustomToken",
                serde_json::json!({ "token": token, "returnSecureToken": true }),
            )
            .await?;

        if !status.is_success() {
            return Err(ServiceError::Provider(format!(
                "token exchange rejected ({}): {}",
                status,
                provider_error_code(&payload)
            )));
        }

        let id_token = payload["idToken"].as_str().ok_or_else(|| {
            ServiceError::Provider("token exchange response missing idToken".to_string())
        })?;

        Ok(SessionToken {
            id_token: id_token.to_string(),
            refresh_token: payload["refreshToken"].as_str().map(String::from),
            expires_in: payload["expiresIn"].as_str().map(String::from),
        })
    }

    async fn update_passphrase(&self, email: &str, passphrase: &str) -> Result<(), ServiceError> {
        let account = self.lookup_by_email(email).await?.ok_or_else(|| {
            ServiceError::Provider(format!("no provider account for {}", email))
        })?;

        let (status, payload) = self
            .post(
                "update",
                serde_json::json!({ "localId": account.uid, "password": passphrase }),
            )
            .await?;

        if !status.is_success() {
            return Err(ServiceError::Provider(format!(
                "passphrase update rejected ({}): {}",
                status,
                provider_error_code(&payload)
            )));
        }

        Ok(())
    }

    async fn update_email(&self, email: &str, new_email: &str) -> Result<(), ServiceError> {
        let account = self.lookup_by_email(email).await?.ok_or_else(|| {
            ServiceError::Provider(format!("no provider account for {}", email))
        })?;

        let (status, payload) = self
            .post(
                "update",
                serde_json::json!({ "localId": account.uid, "email": new_email }),
            )
            .await?;

        if !status.is_success() {
            let code = provider_error_code(&payload);
            if code.starts_with("EMAIL_EXISTS") {
                return Err(ServiceError::Conflict("User already exists".to_string()));
            }
            return Err(ServiceError::Provider(format!(
                "email update rejected ({}): {}",
                status, code
            )));
        }

        Ok(())
    }
}

/// Consolidated account creation: optional duplicate lookup, provider account,
/// mirrored profile (names start null), bearer credential, optional exchange
/// for a session-ready token.
pub async fn signup(
    credentials: &dyn CredentialProvider,
    store: &dyn super::user_service::UserStore,
    policy: &AuthPolicy,
    request: ValidSignup,
) -> Result<SignupOutcome, ServiceError> {
    if policy.duplicate_check {
        if credentials.lookup_by_email(&request.email).await?.is_some() {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }
    }

    let account = credentials
        .create_account(&request.email, &request.passphrase)
        .await?;

    store
        .create(super::user_service::NewUserRecord {
            email: account.email.clone(),
            firstname: None,
            lastname: None,
        })
        .await?;

    let token = credentials.mint_custom_token(&account).await?;

    let session_token = if policy.token_exchange {
        Some(credentials.exchange_custom_token(&token).await?.id_token)
    } else {
        None
    };

    log::info!("✅ Account created: {}", account.email);

    Ok(SignupOutcome {
        token,
        session_token,
    })
}
