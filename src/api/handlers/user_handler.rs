//! User resource handlers: list, create, show, update, destroy.

use axum::{
    extract::{Extension, State},
    routing::get,
    Router,
};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::api::extractors::{UserId, ValidatedJson};
use crate::api::middleware::AuthContext;
use crate::api::AppState;
use crate::config::{
    MSG_USERS_RETRIEVED, MSG_USER_CREATED, MSG_USER_DELETED, MSG_USER_RETRIEVED,
    MSG_USER_UPDATED,
};
use crate::domain::{CreateUser, UpdateUser, UserResponse};
use crate::errors::AppResult;
use crate::types::ApiResponse;
use crate::validation::{secret, trimmed, FieldSource, Rule, RuleTable};

static CREATE_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new()
        .field("username", &[Rule::Required])
        .field("name", &[Rule::Required])
        .field("email", &[Rule::Required, Rule::Email])
        .field("password", &[Rule::Required])
        .field("confirm_password", &[Rule::Required, Rule::Same("password")])
});

static UPDATE_RULES: Lazy<RuleTable> = Lazy::new(|| {
    RuleTable::new()
        .field("username", &[Rule::Nullable])
        .field("name", &[Rule::Nullable])
        .field("email", &[Rule::Nullable, Rule::Email])
        .field("password", &[Rule::Nullable])
        .field(
            "confirm_password",
            &[Rule::RequiredWith("password"), Rule::Same("password")],
        )
});

/// User creation request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    /// Unique login name
    #[serde(default, deserialize_with = "trimmed")]
    #[schema(example = "jdoe")]
    pub username: Option<String>,
    /// Display name
    #[serde(default, deserialize_with = "trimmed")]
    #[schema(example = "John Doe")]
    pub name: Option<String>,
    /// Unique email address
    #[serde(default, deserialize_with = "trimmed")]
    #[schema(example = "user@example.com")]
    pub email: Option<String>,
    /// Plain text password
    #[serde(default, deserialize_with = "secret")]
    #[schema(example = "SecurePass123!")]
    pub password: Option<String>,
    /// Must equal `password`
    #[serde(default, deserialize_with = "secret")]
    #[schema(example = "SecurePass123!")]
    pub confirm_password: Option<String>,
}

impl FieldSource for CreateUserRequest {
    fn value(&self, field: &str) -> Option<&str> {
        match field {
            "username" => self.username.as_deref(),
            "name" => self.name.as_deref(),
            "email" => self.email.as_deref(),
            "password" => self.password.as_deref(),
            "confirm_password" => self.confirm_password.as_deref(),
            _ => None,
        }
    }
}

impl Validate for CreateUserRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        CREATE_RULES.evaluate(self)
    }
}

// Only reached after validation, so every required field is present.
impl From<CreateUserRequest> for CreateUser {
    fn from(request: CreateUserRequest) -> Self {
        Self {
            username: request.username.unwrap_or_default(),
            name: request.name.unwrap_or_default(),
            email: request.email.unwrap_or_default(),
            password: request.password.unwrap_or_default(),
        }
    }
}

/// Partial user update request; omitted fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    /// New login name
    #[serde(default, deserialize_with = "trimmed")]
    #[schema(example = "jane")]
    pub username: Option<String>,
    /// New display name
    #[serde(default, deserialize_with = "trimmed")]
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
    /// New email address
    #[serde(default, deserialize_with = "trimmed")]
    #[schema(example = "jane@example.com")]
    pub email: Option<String>,
    /// New password
    #[serde(default, deserialize_with = "secret")]
    pub password: Option<String>,
    /// Required with `password`, must equal it
    #[serde(default, deserialize_with = "secret")]
    pub confirm_password: Option<String>,
}

impl FieldSource for UpdateUserRequest {
    fn value(&self, field: &str) -> Option<&str> {
        match field {
            "username" => self.username.as_deref(),
            "name" => self.name.as_deref(),
            "email" => self.email.as_deref(),
            "password" => self.password.as_deref(),
            "confirm_password" => self.confirm_password.as_deref(),
            _ => None,
        }
    }
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        UPDATE_RULES.evaluate(self)
    }
}

impl From<UpdateUserRequest> for UpdateUser {
    fn from(request: UpdateUserRequest) -> Self {
        Self {
            username: request.username,
            name: request.name,
            email: request.email,
            password: request.password,
        }
    }
}

/// Create user routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:id",
            get(get_user)
                .put(update_user)
                .patch(update_user)
                .delete(delete_user),
        )
}

/// List all users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users retrieved successfully.", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<UserResponse>>> {
    let users = state.user_service.list_users().await?;

    Ok(ApiResponse::success(
        users.into_iter().map(UserResponse::from).collect(),
        MSG_USERS_RETRIEVED,
    ))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created successfully.", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 422, description = "Validation error or username/email already exists")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateUserRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.create_user(payload.into()).await?;

    Ok(ApiResponse::success(UserResponse::from(user), MSG_USER_CREATED))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User retrieved successfully.", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found.")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    UserId(id): UserId,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.get_user(id).await?;

    Ok(ApiResponse::success(UserResponse::from(user), MSG_USER_RETRIEVED))
}

/// Update user; only the supplied fields change
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully.", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found."),
        (status = 422, description = "Validation error or username/email already exists")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    UserId(id): UserId,
    ValidatedJson(payload): ValidatedJson<UpdateUserRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.update_user(id, payload.into()).await?;

    Ok(ApiResponse::success(UserResponse::from(user), MSG_USER_UPDATED))
}

/// Delete user (cannot delete self)
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted successfully."),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found."),
        (status = 422, description = "You cannot delete yourself")
    )
)]
pub async fn delete_user(
    Extension(auth): Extension<AuthContext>,
    State(state): State<AppState>,
    UserId(id): UserId,
) -> AppResult<ApiResponse<Value>> {
    state.user_service.delete_user(auth.user_id, id).await?;

    Ok(ApiResponse::success(json!([]), MSG_USER_DELETED))
}
