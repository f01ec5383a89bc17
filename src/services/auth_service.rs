//! Authentication service - login and bearer token handling.
//!
//! Issues the JWTs whose claims become the `AuthContext` of every
//! `/api/users` request.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::{Config, SECONDS_PER_HOUR, TOKEN_TYPE_BEARER};
use crate::domain::{Password, User};
use crate::errors::{AppError, AppResult};
use crate::infra::UserRepository;

/// Hash verified when the e-mail is unknown, so both paths cost one Argon2 run.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| {
    Password::new("timing-equalizer")
        .ok()
        .map(Password::into_string)
});

/// JWT claims payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Login and return JWT token
    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse>;

    /// Sign a token for an already authenticated user
    fn issue_token(&self, user: &User) -> AppResult<TokenResponse>;

    /// Verify JWT token and extract claims
    fn verify_token(&self, token: &str) -> AppResult<Claims>;
}

/// Concrete implementation of AuthService.
pub struct Authenticator<R: UserRepository> {
    users: Arc<R>,
    config: Config,
}

impl<R: UserRepository> Authenticator<R> {
    /// Create new auth service instance
    pub fn new(users: Arc<R>, config: Config) -> Self {
        Self { users, config }
    }
}

#[async_trait]
impl<R: UserRepository> AuthService for Authenticator<R> {
    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse> {
        let user = self.users.find_by_email(&email).await?;

        let password_valid = match (&user, DUMMY_HASH.as_ref()) {
            (Some(user), _) => user.verify_password(&password),
            (None, Some(dummy)) => {
                Password::from_hash(dummy.clone()).verify(&password);
                false
            }
            (None, None) => false,
        };

        match user {
            Some(user) if password_valid => {
                tracing::info!(user_id = %user.id, "User logged in");
                self.issue_token(&user)
            }
            _ => Err(AppError::InvalidCredentials),
        }
    }

    fn issue_token(&self, user: &User) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.jwt_expiration_hours);

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret_bytes()),
        )?;

        Ok(TokenResponse {
            access_token: token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.config.jwt_expiration_hours * SECONDS_PER_HOUR,
        })
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEV_JWT_SECRET;
    use crate::infra::MockUserRepository;

    fn config() -> Config {
        Config::new("postgres://localhost/test", DEV_JWT_SECRET).unwrap()
    }

    fn stored_user(password: &str) -> User {
        User::new(
            "ada".to_string(),
            "Ada Lovelace".to_string(),
            "ada@example.com".to_string(),
            Password::new(password).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_login_success_issues_verifiable_token() {
        let user = stored_user("secret");
        let user_id = user.id;

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let auth = Authenticator::new(Arc::new(repo), config());
        let token = auth
            .login("ada@example.com".to_string(), "secret".to_string())
            .await
            .unwrap();

        assert_eq!(token.token_type, "Bearer");
        let claims = auth.verify_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "ada");
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let user = stored_user("secret");

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let auth = Authenticator::new(Arc::new(repo), config());
        let result = auth
            .login("ada@example.com".to_string(), "wrong".to_string())
            .await;

        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_email().returning(|_| Ok(None));

        let auth = Authenticator::new(Arc::new(repo), config());
        let result = auth
            .login("nobody@example.com".to_string(), "secret".to_string())
            .await;

        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let auth = Authenticator::new(Arc::new(MockUserRepository::new()), config());
        assert!(matches!(
            auth.verify_token("not-a-token"),
            Err(AppError::Jwt(_))
        ));
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let user = stored_user("secret");
        let other = Config::new("postgres://localhost/test", "another-secret-that-is-32-chars-long").unwrap();

        let issuer = Authenticator::new(Arc::new(MockUserRepository::new()), other);
        let token = issuer.issue_token(&user).unwrap();

        let verifier = Authenticator::new(Arc::new(MockUserRepository::new()), config());
        assert!(verifier.verify_token(&token.access_token).is_err());
    }
}
