use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// Profile document as stored in MongoDB. The credential itself lives at the
/// auth provider; no passphrase field exists here, raw or hashed.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub user_id: String, // PRIMARY IDENTIFIER - opaque 20-char string, immutable
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub created_at: Option<BsonDateTime>,
    pub updated_at: Option<BsonDateTime>,
}

/// Wire representation of a profile. `updatedAt` only appears after the
/// record has been modified at least once.
#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<User> for UserRecord {
    fn from(user: User) -> Self {
        UserRecord {
            id: user.user_id,
            email: user.email,
            firstname: user.firstname,
            lastname: user.lastname,
            created_at: user
                .created_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
            updated_at: user
                .updated_at
                .and_then(|dt| dt.try_to_rfc3339_string().ok()),
        }
    }
}
