//! User domain entity and related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Password;

/// User domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a freshly assigned id
    pub fn new(username: String, name: String, email: String, password: Password) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            name,
            email,
            password_hash: password.into_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the profile fields that were supplied, keep the rest
    pub fn update_profile(
        &mut self,
        username: Option<String>,
        name: Option<String>,
        email: Option<String>,
    ) {
        if let Some(username) = username {
            self.username = username;
        }
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(email) = email {
            self.email = email;
        }
        self.updated_at = Utc::now();
    }

    /// Replace the stored password hash
    pub fn update_password(&mut self, password: Password) {
        self.password_hash = password.into_string();
        self.updated_at = Utc::now();
    }

    /// Check a plain text password against the stored hash
    pub fn verify_password(&self, plain_text: &str) -> bool {
        Password::from_hash(self.password_hash.clone()).verify(plain_text)
    }
}

/// User creation data transfer object
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub name: String,
    pub email: String,
    /// Plain text; hashed before it reaches the store
    pub password: String,
}

/// Partial update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// User response (safe to return to client)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    /// Unique user identifier
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    /// Unique login name
    #[schema(example = "jdoe")]
    pub username: String,
    /// User display name
    #[schema(example = "John Doe")]
    pub name: String,
    /// User email address
    #[schema(example = "user@example.com")]
    pub email: String,
    /// Account creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        User::new(
            "ada".to_string(),
            "Ada Lovelace".to_string(),
            "ada@example.com".to_string(),
            Password::from_hash("hash".to_string()),
        )
    }

    #[test]
    fn test_update_profile_keeps_absent_fields() {
        let mut user = sample();
        user.update_profile(None, Some("Ada King".to_string()), None);

        assert_eq!(user.username, "ada");
        assert_eq!(user.name, "Ada King");
        assert_eq!(user.email, "ada@example.com");
    }

    #[test]
    fn test_update_bumps_timestamp() {
        let mut user = sample();
        let before = user.updated_at;
        user.update_profile(Some("countess".to_string()), None, None);

        assert!(user.updated_at >= before);
        assert_eq!(user.created_at, before);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "ada");
    }

    #[test]
    fn test_response_omits_password() {
        let response = UserResponse::from(sample());
        let json = serde_json::to_value(response).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "ada@example.com");
    }
}
