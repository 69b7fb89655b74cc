// Test doubles for the external platform: an in-memory record store and a
// bcrypt-hashing fake of the managed auth provider.

use crate::models::User;
use crate::services::auth_service::{
    mint_bearer, verify_bearer, AuthPolicy, Claims, CredentialProvider, ProviderAccount,
    SessionToken,
};
use crate::services::user_service::{new_record_id, NewUserRecord, UserPatch, UserStore};
use crate::state::AppState;
use crate::utils::error::ServiceError;
use actix_web::web;
use async_trait::async_trait;
use mongodb::bson::DateTime as BsonDateTime;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
    fail: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent store call fail, to simulate a platform outage.
    pub fn fail_next_ops(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<User> {
        self.users.read().unwrap().values().cloned().collect()
    }

    fn check_available(&self) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(ServiceError::Database("simulated store outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, record: NewUserRecord) -> Result<String, ServiceError> {
        self.check_available()?;
        let user_id = new_record_id();
        let user = User {
            _id: None,
            user_id: user_id.clone(),
            email: record.email,
            firstname: record.firstname,
            lastname: record.lastname,
            created_at: Some(BsonDateTime::now()),
            updated_at: None,
        };
        self.users.write().unwrap().insert(user_id.clone(), user);
        Ok(user_id)
    }

    async fn get(&self, id: &str) -> Result<Option<User>, ServiceError> {
        self.check_available()?;
        Ok(self.users.read().unwrap().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, ServiceError> {
        self.check_available()?;
        Ok(self.all())
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>, ServiceError> {
        self.check_available()?;
        let mut users = self.users.write().unwrap();
        let user = match users.get_mut(id) {
            Some(user) => user,
            None => return Ok(None),
        };
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(firstname) = patch.firstname {
            user.firstname = Some(firstname);
        }
        if let Some(lastname) = patch.lastname {
            user.lastname = Some(lastname);
        }
        user.updated_at = Some(BsonDateTime::now());
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        self.check_available()?;
        Ok(self.users.write().unwrap().remove(id).is_some())
    }
}

struct MockAccount {
    uid: String,
    passphrase_hash: String,
}

/// Fake managed auth provider: accounts keyed by email, passphrases bcrypt
/// hashed the way the real platform would hash them.
#[derive(Default)]
pub struct MockCredentialProvider {
    accounts: RwLock<HashMap<String, MockAccount>>,
}

impl MockCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify_passphrase(&self, email: &str, passphrase: &str) -> bool {
        let accounts = self.accounts.read().unwrap();
        accounts
            .get(email)
            .map(|account| bcrypt::verify(passphrase, &account.passphrase_hash).unwrap_or(false))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CredentialProvider for MockCredentialProvider {
    async fn create_account(
        &self,
        email: &str,
        passphrase: &str,
    ) -> Result<ProviderAccount, ServiceError> {
        let mut accounts = self.accounts.write().unwrap();
        if accounts.contains_key(email) {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }
        let uid = new_record_id();
        // Minimal cost, these hashes only live for one test
        let hash = bcrypt::hash(passphrase, 4)
            .map_err(|e| ServiceError::Provider(format!("hash failed: {}", e)))?;
        accounts.insert(
            email.to_string(),
            MockAccount {
                uid: uid.clone(),
                passphrase_hash: hash,
            },
        );
        Ok(ProviderAccount {
            uid,
            email: email.to_string(),
        })
    }

    async fn lookup_by_email(&self, email: &str) -> Result<Option<ProviderAccount>, ServiceError> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.get(email).map(|account| ProviderAccount {
            uid: account.uid.clone(),
            email: email.to_string(),
        }))
    }

    async fn mint_custom_token(&self, account: &ProviderAccount) -> Result<String, ServiceError> {
        mint_bearer(&account.uid, &account.email)
    }

    async fn verify_id_token(&self, token: &str) -> Result<Claims, ServiceError> {
        verify_bearer(token)
    }

    async fn exchange_custom_token(&self, token: &str) -> Result<SessionToken, ServiceError> {
        let claims = verify_bearer(token)?;
        Ok(SessionToken {
            id_token: format!("session-{}", claims.sub),
            refresh_token: None,
            expires_in: Some("3600".to_string()),
        })
    }

    async fn update_passphrase(&self, email: &str, passphrase: &str) -> Result<(), ServiceError> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts.get_mut(email).ok_or_else(|| {
            ServiceError::Provider(format!("no provider account for {}", email))
        })?;
        account.passphrase_hash = bcrypt::hash(passphrase, 4)
            .map_err(|e| ServiceError::Provider(format!("hash failed: {}", e)))?;
        Ok(())
    }

    async fn update_email(&self, email: &str, new_email: &str) -> Result<(), ServiceError> {
        let mut accounts = self.accounts.write().unwrap();
        if accounts.contains_key(new_email) {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }
        let account = accounts.remove(email).ok_or_else(|| {
            ServiceError::Provider(format!("no provider account for {}", email))
        })?;
        accounts.insert(new_email.to_string(), account);
        Ok(())
    }
}

pub fn test_state_with_policy(
    policy: AuthPolicy,
) -> (
    web::Data<AppState>,
    Arc<MemoryUserStore>,
    Arc<MockCredentialProvider>,
) {
    let store = Arc::new(MemoryUserStore::new());
    let provider = Arc::new(MockCredentialProvider::new());
    let state = web::Data::new(AppState::new(store.clone(), provider.clone(), policy));
    (state, store, provider)
}

pub fn test_state() -> (
    web::Data<AppState>,
    Arc<MemoryUserStore>,
    Arc<MockCredentialProvider>,
) {
    test_state_with_policy(AuthPolicy::default())
}
