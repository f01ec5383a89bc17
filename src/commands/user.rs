//! User command - account management straight against the database.
//!
//! Goes through the same validation and service as `POST /api/users`, so
//! the first account can be created before anyone is able to log in.

use std::sync::Arc;

use validator::Validate;

use crate::api::handlers::user_handler::CreateUserRequest;
use crate::cli::args::{UserAction, UserArgs};
use crate::config::Config;
use crate::domain::User;
use crate::errors::{AppError, AppResult};
use crate::infra::{Database, UserStore};
use crate::services::{UserManager, UserService};
use crate::validation::FieldErrors;

/// Execute the user command
pub async fn execute(args: UserArgs, config: Config) -> AppResult<()> {
    let db = Database::connect(&config).await?;
    let service = UserManager::new(Arc::new(UserStore::new(db.get_connection())));

    match args.action {
        UserAction::Create {
            username,
            name,
            email,
            password,
        } => {
            let request = CreateUserRequest {
                username: Some(username.trim().to_string()).filter(|v| !v.is_empty()),
                name: Some(name.trim().to_string()).filter(|v| !v.is_empty()),
                email: Some(email.trim().to_string()).filter(|v| !v.is_empty()),
                confirm_password: Some(password.clone()).filter(|v| !v.is_empty()),
                password: Some(password).filter(|v| !v.is_empty()),
            };
            let user = match create(&service, request).await {
                Ok(user) => user,
                Err(AppError::Validation(errors)) => {
                    for field in errors.fields() {
                        for message in errors.get(field).unwrap_or_default() {
                            eprintln!("{}: {}", field, message);
                        }
                    }
                    return Err(AppError::Validation(errors));
                }
                Err(e) => return Err(e),
            };

            println!("Created user {} ({})", user.username, user.id);
        }
    }

    Ok(())
}

async fn create(service: &impl UserService, request: CreateUserRequest) -> AppResult<User> {
    request
        .validate()
        .map_err(|e| AppError::Validation(FieldErrors::from(e)))?;

    service.create_user(request.into()).await
}
