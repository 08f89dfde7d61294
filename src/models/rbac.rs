// src/models/rbac.rs

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*$").expect("identifier pattern is valid")
});

/// Represents the 'permissions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub resource: String,
    pub action: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl fmt::Display for PermissionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// Represents the 'roles' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: RoleRecord,
    pub permissions: Vec<PermissionRecord>,
}

#[derive(Debug, Serialize)]
pub struct UserWithRoles {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub roles: Vec<RoleRecord>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub description: String,
    #[validate(length(max = 50), custom(function = validate_identifier))]
    pub resource: String,
    #[validate(length(max = 50), custom(function = validate_identifier))]
    pub action: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub permission_ids: Vec<i64>,
}

/// DTO for updating a role. `permission_ids`, when present, replaces the whole set.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub is_default: Option<bool>,
    pub permission_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub user_id: i64,
    pub role_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserRolesResponse {
    pub user_id: i64,
    pub roles: Vec<RoleRecord>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckPermissionRequest {
    pub resource: String,
    pub action: String,
    /// Whose permissions to resolve; the caller's when absent.
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CheckPermissionResponse {
    pub user_id: i64,
    pub resource: String,
    pub action: String,
    pub has_permission: bool,
}

/// Query parameters for paginated listings.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

fn validate_identifier(value: &str) -> Result<(), validator::ValidationError> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_identifier"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_display() {
        let perm = PermissionRecord {
            id: 1,
            name: "read quizzes".to_string(),
            description: String::new(),
            resource: "quiz".to_string(),
            action: "read".to_string(),
            created_at: None,
        };
        assert_eq!(perm.to_string(), "quiz:read");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("quiz").is_ok());
        assert!(validate_identifier("quiz_attempt2").is_ok());
        assert!(validate_identifier("Quiz").is_err());
        assert!(validate_identifier("quiz:read").is_err());
        assert!(validate_identifier("").is_err());
    }
}
