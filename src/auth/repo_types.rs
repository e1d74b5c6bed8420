use serde::{Deserialize, Serialize};

/// Stored credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub username: String,
    pub password: String, // argon2 PHC hash, never plaintext
}

impl User {
    pub fn redacted(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            password: String::new(),
        }
    }
}
