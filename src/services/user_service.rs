// ==================== RECORD STORE ADAPTER ====================
// Straight-through profile CRUD against the document store. Updates check
// existence first and return the post-update snapshot.

use crate::database::MongoDB;
use crate::models::User;
use crate::services::auth_service::CredentialProvider;
use crate::utils::error::ServiceError;
use crate::validation::{ValidNewUser, ValidUserPatch};
use async_trait::async_trait;
use futures::stream::StreamExt;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use serde::Deserialize;
use uuid::Uuid;

const USERS_COLLECTION: &str = "users";

// Request structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub passphrase: Option<String>,
}

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub passphrase: Option<String>,
}

/// Profile fields for a new record. The passphrase never reaches the store;
/// it belongs to the auth provider.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

/// Field-level partial update.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

/// Document store operations, behind a trait so tests can swap in an
/// in-memory implementation.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the new record's identifier.
    async fn create(&self, record: NewUserRecord) -> Result<String, ServiceError>;

    async fn get(&self, id: &str) -> Result<Option<User>, ServiceError>;

    async fn list(&self) -> Result<Vec<User>, ServiceError>;

    /// `Ok(None)` when the target does not exist; otherwise the post-update
    /// snapshot with `updated_at` set.
    async fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>, ServiceError>;

    /// `Ok(false)` when the target does not exist.
    async fn delete(&self, id: &str) -> Result<bool, ServiceError>;
}

/// Opaque 20-char identifier, the shape the managed store hands out.
pub(crate) fn new_record_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..20].to_string()
}

pub struct MongoUserStore {
    db: MongoDB,
}

impl MongoUserStore {
    pub fn new(db: MongoDB) -> Self {
        MongoUserStore { db }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn create(&self, record: NewUserRecord) -> Result<String, ServiceError> {
        let collection = self.db.collection::<User>(USERS_COLLECTION);

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

        collection
            .insert_one(&user)
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to insert user: {}", e)))?;

        Ok(user_id)
    }

    async fn get(&self, id: &str) -> Result<Option<User>, ServiceError> {
        let collection = self.db.collection::<User>(USERS_COLLECTION);

        collection
            .find_one(doc! { "user_id": id })
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to fetch user: {}", e)))
    }

    async fn list(&self) -> Result<Vec<User>, ServiceError> {
        let collection = self.db.collection::<User>(USERS_COLLECTION);

        let mut cursor = collection
            .find(doc! {})
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to query users: {}", e)))?;

        let mut users = Vec::new();
        while let Some(user) = cursor.next().await {
            users.push(
                user.map_err(|e| ServiceError::Database(format!("Failed to read user: {}", e)))?,
            );
        }

        Ok(users)
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<Option<User>, ServiceError> {
        let collection = self.db.collection::<User>(USERS_COLLECTION);

        // Existence check before applying the partial update
        let existing = collection
            .find_one(doc! { "user_id": id })
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to fetch user: {}", e)))?;

        if existing.is_none() {
            return Ok(None);
        }

        let mut set = Document::new();
        if let Some(email) = patch.email {
            set.insert("email", email);
        }
        if let Some(firstname) = patch.firstname {
            set.insert("firstname", firstname);
        }
        if let Some(lastname) = patch.lastname {
            set.insert("lastname", lastname);
        }
        set.insert("updated_at", BsonDateTime::now());

        collection
            .update_one(doc! { "user_id": id }, doc! { "$set": set })
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to update user: {}", e)))?;

        // Post-update snapshot
        collection
            .find_one(doc! { "user_id": id })
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to fetch updated user: {}", e)))
    }

    async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        let collection = self.db.collection::<User>(USERS_COLLECTION);

        let result = collection
            .delete_one(doc! { "user_id": id })
            .await
            .map_err(|e| ServiceError::Database(format!("Failed to delete user: {}", e)))?;

        Ok(result.deleted_count > 0)
    }
}

/// Registers the account with the provider (which enforces email uniqueness)
/// and mirrors the sanitized profile into the store. Returns the record id.
pub async fn create_user(
    credentials: &dyn CredentialProvider,
    store: &dyn UserStore,
    request: ValidNewUser,
) -> Result<String, ServiceError> {
    let account = credentials
        .create_account(&request.email, &request.passphrase)
        .await?;

    let user_id = store
        .create(NewUserRecord {
            email: account.email,
            firstname: Some(request.firstname),
            lastname: request.lastname,
        })
        .await?;

    log::info!("✅ User created: {}", user_id);

    Ok(user_id)
}

/// Existence-checked partial update. Credential fields in the patch are
/// forwarded to the auth provider, keyed by the record's current email; the
/// store never sees a passphrase, and an email change re-keys the provider
/// account so later credential patches still find it.
pub async fn update_user(
    credentials: &dyn CredentialProvider,
    store: &dyn UserStore,
    id: &str,
    patch: ValidUserPatch,
) -> Result<Option<User>, ServiceError> {
    let existing = match store.get(id).await? {
        Some(user) => user,
        None => return Ok(None),
    };

    if let Some(passphrase) = &patch.passphrase {
        credentials
            .update_passphrase(&existing.email, passphrase)
            .await?;
    }

    if let Some(new_email) = &patch.email {
        if *new_email != existing.email {
            credentials.update_email(&existing.email, new_email).await?;
        }
    }

    store
        .update(
            id,
            UserPatch {
                email: patch.email,
                firstname: patch.firstname,
                lastname: patch.lastname,
            },
        )
        .await
}
