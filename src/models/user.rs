use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub email: String,

    #[serde(default)]
    pub name: Option<String>,
}

impl User {
    /// Name used to address the user in emails; falls back to the mailbox name.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// The caller resolved by the `inject_current_user` middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: ObjectId,
    pub email: String,
    pub name: String,
}

impl From<User> for CurrentUser {
    fn from(u: User) -> Self {
        Self {
            name: u.display_name(),
            id: u.id,
            email: u.email,
        }
    }
}
