//! User service - account lifecycle and the business rules around it.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{ERR_EMAIL_TAKEN, ERR_SELF_DELETE, ERR_USERNAME_TAKEN, FIELD_USER};
use crate::domain::{CreateUser, Password, UpdateUser, User};
use crate::errors::{AppError, AppResult, OptionExt};
use crate::infra::UserRepository;
use crate::validation::FieldErrors;

const ENTITY: &str = "User";

/// User service trait for dependency injection.
///
/// Inputs are expected to have passed the rule table already; the service
/// adds the checks that need the store.
#[async_trait]
pub trait UserService: Send + Sync {
    /// List every user
    async fn list_users(&self) -> AppResult<Vec<User>>;

    /// Get user by ID
    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    /// Create a user after checking username/email uniqueness
    async fn create_user(&self, input: CreateUser) -> AppResult<User>;

    /// Apply the supplied fields to an existing user
    async fn update_user(&self, id: Uuid, changes: UpdateUser) -> AppResult<User>;

    /// Delete a user on behalf of `actor`, who may not delete themselves
    async fn delete_user(&self, actor: Uuid, id: Uuid) -> AppResult<()>;
}

/// Concrete implementation of UserService.
pub struct UserManager<R: UserRepository> {
    users: Arc<R>,
}

impl<R: UserRepository> UserManager<R> {
    /// Create new user service instance
    pub fn new(users: Arc<R>) -> Self {
        Self { users }
    }

    /// Collect a field error for each value already owned by someone other
    /// than `owner`.
    async fn ensure_unique(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        owner: Option<Uuid>,
    ) -> AppResult<()> {
        let mut errors = FieldErrors::new();

        if let Some(username) = username {
            if is_taken(self.users.find_by_username(username).await?, owner) {
                errors.add("username", ERR_USERNAME_TAKEN);
            }
        }
        if let Some(email) = email {
            if is_taken(self.users.find_by_email(email).await?, owner) {
                errors.add("email", ERR_EMAIL_TAKEN);
            }
        }

        errors.into_result()
    }
}

fn is_taken(existing: Option<User>, owner: Option<Uuid>) -> bool {
    existing.is_some_and(|user| Some(user.id) != owner)
}

#[async_trait]
impl<R: UserRepository> UserService for UserManager<R> {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        self.users.list().await
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.users.find_by_id(id).await?.ok_or_not_found(ENTITY)
    }

    async fn create_user(&self, input: CreateUser) -> AppResult<User> {
        self.ensure_unique(Some(input.username.as_str()), Some(input.email.as_str()), None)
            .await?;

        let password = Password::new(&input.password)?;
        let user = self
            .users
            .create(User::new(input.username, input.name, input.email, password))
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: UpdateUser) -> AppResult<User> {
        let mut user = self.get_user(id).await?;

        self.ensure_unique(changes.username.as_deref(), changes.email.as_deref(), Some(id))
            .await?;

        let password = changes.password.as_deref().map(Password::new).transpose()?;
        user.update_profile(changes.username, changes.name, changes.email);
        if let Some(password) = password {
            user.update_password(password);
        }

        let user = self.users.update(user).await?;

        tracing::info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    async fn delete_user(&self, actor: Uuid, id: Uuid) -> AppResult<()> {
        let user = self.get_user(id).await?;

        if user.id == actor {
            return Err(AppError::field(FIELD_USER, ERR_SELF_DELETE));
        }

        self.users.delete(user.id).await?;

        tracing::info!(user_id = %id, deleted_by = %actor, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    use crate::infra::MockUserRepository;

    fn create_test_user(username: &str, email: &str) -> User {
        User::new(
            username.to_string(),
            "Test User".to_string(),
            email.to_string(),
            Password::from_hash("hashed".to_string()),
        )
    }

    fn service(repo: MockUserRepository) -> UserManager<MockUserRepository> {
        UserManager::new(Arc::new(repo))
    }

    fn validation_errors(result: AppResult<impl std::fmt::Debug>) -> FieldErrors {
        match result {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    fn new_user_input() -> CreateUser {
        CreateUser {
            username: "ada".to_string(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_user_success() {
        let user = create_test_user("ada", "ada@example.com");
        let user_id = user.id;

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .with(eq(user_id))
            .returning(move |_| Ok(Some(user.clone())));

        let result = service(repo).get_user(user_id).await;
        assert_eq!(result.unwrap().id, user_id);
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));

        let result = service(repo).get_user(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_users_success() {
        let mut repo = MockUserRepository::new();
        repo.expect_list().returning(|| {
            Ok(vec![
                create_test_user("one", "one@example.com"),
                create_test_user("two", "two@example.com"),
            ])
        });

        let result = service(repo).list_users().await;
        assert_eq!(result.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_user_hashes_password() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_username().returning(|_| Ok(None));
        repo.expect_find_by_email().returning(|_| Ok(None));
        repo.expect_create().times(1).returning(Ok);

        let user = service(repo).create_user(new_user_input()).await.unwrap();

        assert_eq!(user.username, "ada");
        assert_eq!(user.email, "ada@example.com");
        assert_ne!(user.password_hash, "secret");
        assert!(user.verify_password("secret"));
    }

    #[tokio::test]
    async fn test_create_user_reports_both_conflicts() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_username()
            .returning(|name| Ok(Some(create_test_user(name, "other@example.com"))));
        repo.expect_find_by_email()
            .returning(|email| Ok(Some(create_test_user("other", email))));
        repo.expect_create().never();

        let errors = validation_errors(service(repo).create_user(new_user_input()).await);

        assert_eq!(errors.get("username").unwrap(), ["Username already exists"]);
        assert_eq!(errors.get("email").unwrap(), ["Email already exists"]);
    }

    #[tokio::test]
    async fn test_update_email_taken_by_other_user() {
        let target = create_test_user("ada", "ada@example.com");
        let target_id = target.id;

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_find_by_email()
            .returning(|email| Ok(Some(create_test_user("grace", email))));
        repo.expect_update().never();

        let changes = UpdateUser {
            email: Some("grace@example.com".to_string()),
            ..Default::default()
        };
        let errors = validation_errors(service(repo).update_user(target_id, changes).await);

        assert_eq!(errors, FieldErrors::single("email", "Email already exists"));
    }

    #[tokio::test]
    async fn test_update_own_email_succeeds() {
        let target = create_test_user("ada", "ada@example.com");
        let target_id = target.id;
        let owner = target.clone();

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_find_by_email()
            .returning(move |_| Ok(Some(owner.clone())));
        repo.expect_update().times(1).returning(Ok);

        let changes = UpdateUser {
            email: Some("ada@example.com".to_string()),
            ..Default::default()
        };
        let user = service(repo).update_user(target_id, changes).await.unwrap();

        assert_eq!(user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_update_username_taken_by_other_user() {
        let target = create_test_user("ada", "ada@example.com");
        let target_id = target.id;

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_find_by_username()
            .returning(|username| Ok(Some(create_test_user(username, "grace@example.com"))));
        repo.expect_update().never();

        let changes = UpdateUser {
            username: Some("grace".to_string()),
            ..Default::default()
        };
        let errors = validation_errors(service(repo).update_user(target_id, changes).await);

        assert_eq!(errors, FieldErrors::single("username", "Username already exists"));
    }

    #[tokio::test]
    async fn test_update_reports_username_and_email_conflicts_together() {
        let target = create_test_user("ada", "ada@example.com");
        let target_id = target.id;

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_find_by_username()
            .returning(|username| Ok(Some(create_test_user(username, "grace@example.com"))));
        repo.expect_find_by_email()
            .returning(|email| Ok(Some(create_test_user("hopper", email))));
        repo.expect_update().never();

        let changes = UpdateUser {
            username: Some("grace".to_string()),
            email: Some("hopper@example.com".to_string()),
            ..Default::default()
        };
        let errors = validation_errors(service(repo).update_user(target_id, changes).await);

        assert_eq!(errors.get("username").unwrap(), ["Username already exists"]);
        assert_eq!(errors.get("email").unwrap(), ["Email already exists"]);
    }

    #[tokio::test]
    async fn test_update_own_username_succeeds() {
        let target = create_test_user("ada", "ada@example.com");
        let target_id = target.id;
        let owner = target.clone();

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_find_by_username()
            .returning(move |_| Ok(Some(owner.clone())));
        repo.expect_update().times(1).returning(Ok);

        let changes = UpdateUser {
            username: Some("ada".to_string()),
            name: Some("Ada King".to_string()),
            ..Default::default()
        };
        let user = service(repo).update_user(target_id, changes).await.unwrap();

        assert_eq!(user.username, "ada");
        assert_eq!(user.name, "Ada King");
    }

    #[tokio::test]
    async fn test_update_keeps_absent_fields_and_password() {
        let target = create_test_user("ada", "ada@example.com");
        let target_id = target.id;

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_update().times(1).returning(Ok);

        let changes = UpdateUser {
            name: Some("Countess of Lovelace".to_string()),
            ..Default::default()
        };
        let user = service(repo).update_user(target_id, changes).await.unwrap();

        assert_eq!(user.username, "ada");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Countess of Lovelace");
        assert_eq!(user.password_hash, "hashed");
    }

    #[tokio::test]
    async fn test_update_rehashes_new_password() {
        let target = create_test_user("ada", "ada@example.com");
        let target_id = target.id;

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_update().times(1).returning(Ok);

        let changes = UpdateUser {
            password: Some("new-secret".to_string()),
            ..Default::default()
        };
        let user = service(repo).update_user(target_id, changes).await.unwrap();

        assert!(user.verify_password("new-secret"));
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        repo.expect_update().never();

        let result = service(repo)
            .update_user(Uuid::new_v4(), UpdateUser::default())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_self_rejected() {
        let me = create_test_user("ada", "ada@example.com");
        let my_id = me.id;

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(me.clone())));
        repo.expect_delete().never();

        let errors = validation_errors(service(repo).delete_user(my_id, my_id).await);
        assert_eq!(errors, FieldErrors::single("user", "You cannot delete yourself"));
    }

    #[tokio::test]
    async fn test_delete_other_user_success() {
        let target = create_test_user("grace", "grace@example.com");
        let target_id = target.id;

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_delete()
            .with(eq(target_id))
            .times(1)
            .returning(|_| Ok(()));

        let result = service(repo).delete_user(Uuid::new_v4(), target_id).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_delete_missing_user_is_not_found() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        repo.expect_delete().never();

        let result = service(repo).delete_user(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
