use async_trait::async_trait;
use futures_util::StreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::{Collection, Database};

use crate::{error::StoreError, models::User};

pub const USERS_COLLECTION: &str = "users";

/// Read-only view of the registered users the scheduler notifies.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_recipients(&self) -> Result<Vec<User>, StoreError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError>;
}

#[derive(Clone)]
pub struct MongoUserDirectory {
    users: Collection<User>,
}

impl MongoUserDirectory {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection::<User>(USERS_COLLECTION),
        }
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn list_recipients(&self) -> Result<Vec<User>, StoreError> {
        let mut cursor = self
            .users
            .find(doc! { "email": { "$exists": true, "$ne": "" } }, None)
            .await?;

        let mut users = Vec::new();
        while let Some(res) = cursor.next().await {
            match res {
                Ok(u) => users.push(u),
                // one malformed user document must not hide everyone else
                Err(e) => tracing::warn!("skipping unreadable user document: {}", e),
            }
        }

        Ok(users)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<User>, StoreError> {
        Ok(self.users.find_one(doc! { "_id": id }, None).await?)
    }
}
