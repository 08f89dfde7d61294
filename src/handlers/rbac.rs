// src/handlers/rbac.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{FromRow, SqlitePool};
use validator::Validate;

use crate::{
    config::MAX_PAGE_SIZE,
    error::{AppError, is_unique_violation},
    models::rbac::{
        AssignRolesRequest, CheckPermissionRequest, CheckPermissionResponse,
        CreatePermissionRequest, CreateRoleRequest, PaginationParams, PermissionRecord,
        RoleRecord, RoleWithPermissions, UpdateRoleRequest, UserRolesResponse, UserWithRoles,
    },
    services::rbac,
    utils::jwt::Claims,
};

// ------------------------------------------------------------------
// Permissions
// ------------------------------------------------------------------

/// Creates a permission. Admin only.
pub async fn create_permission(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreatePermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let permission = sqlx::query_as::<_, PermissionRecord>(
        r#"
        INSERT INTO permissions (name, description, resource, action)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.resource)
    .bind(&payload.action)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::BadRequest(format!(
                "Permission '{}' or '{}:{}' already exists",
                payload.name, payload.resource, payload.action
            ))
        } else {
            tracing::error!("Failed to create permission: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!("Permission {} created", permission);
    Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn list_permissions(
    State(pool): State<SqlitePool>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    let skip = params.skip.unwrap_or(0).max(0);
    let limit = params.limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let permissions = sqlx::query_as::<_, PermissionRecord>(
        "SELECT * FROM permissions ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(&pool)
    .await?;

    Ok(Json(permissions))
}

/// Deletes a permission. Roles holding it lose it immediately.
pub async fn delete_permission(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM permissions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Permission {} not found", id)));
    }

    Ok(Json(json!({ "message": "Permission deleted successfully" })))
}

// ------------------------------------------------------------------
// Roles
// ------------------------------------------------------------------

/// Creates a role with an initial permission set.
pub async fn create_role(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let role = sqlx::query_as::<_, RoleRecord>(
        r#"
        INSERT INTO roles (name, description, is_default)
        VALUES (?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.is_default)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::BadRequest(format!("Role '{}' already exists", payload.name))
        } else {
            tracing::error!("Failed to create role: {:?}", e);
            AppError::from(e)
        }
    })?;

    rbac::set_role_permissions(&mut tx, role.id, &payload.permission_ids).await?;
    let created = rbac::role_with_permissions(&mut tx, role.id).await?;
    tx.commit().await?;

    tracing::info!(
        "Role '{}' created with {} permissions",
        created.role.name,
        created.permissions.len()
    );
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_roles(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let roles = sqlx::query_as::<_, RoleRecord>("SELECT * FROM roles ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;

    let mut detailed = Vec::with_capacity(roles.len());
    for role in roles {
        let permissions = rbac::role_permissions(&mut conn, role.id).await?;
        detailed.push(RoleWithPermissions { role, permissions });
    }

    Ok(Json(detailed))
}

pub async fn get_role(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let role = rbac::role_with_permissions(&mut conn, id).await?;
    Ok(Json(role))
}

/// Updates a role. A present `permission_ids` replaces the whole permission set.
pub async fn update_role(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;
    let current = rbac::find_role(&mut tx, id).await?;

    sqlx::query("UPDATE roles SET description = ?, is_default = ? WHERE id = ?")
        .bind(payload.description.unwrap_or(current.description))
        .bind(payload.is_default.unwrap_or(current.is_default))
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if let Some(permission_ids) = &payload.permission_ids {
        rbac::set_role_permissions(&mut tx, id, permission_ids).await?;
    }

    let updated = rbac::role_with_permissions(&mut tx, id).await?;
    tx.commit().await?;

    Ok(Json(updated))
}

/// Deletes a role. Users holding it lose its permissions immediately.
pub async fn delete_role(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Role {} not found", id)));
    }

    tracing::info!("Role {} deleted", id);
    Ok(Json(json!({ "message": "Role deleted successfully" })))
}

// ------------------------------------------------------------------
// User roles
// ------------------------------------------------------------------

async fn ensure_user_exists(pool: &SqlitePool, user_id: i64) -> Result<(), AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    exists
        .map(|_| ())
        .ok_or(AppError::NotFound(format!("User {} not found", user_id)))
}

/// Replaces the roles of a user.
pub async fn assign_user_roles(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
    Json(payload): Json<AssignRolesRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.user_id != user_id {
        return Err(AppError::BadRequest(
            "User id in path and body mismatch".to_string(),
        ));
    }

    ensure_user_exists(&pool, user_id).await?;

    let mut tx = pool.begin().await?;
    let roles = rbac::assign_roles(&mut tx, user_id, &payload.role_ids).await?;
    tx.commit().await?;

    tracing::info!("User {} now holds {} roles", user_id, roles.len());
    Ok(Json(UserRolesResponse {
        user_id,
        roles,
        message: "Roles assigned successfully".to_string(),
    }))
}

pub async fn get_user_roles(
    State(pool): State<SqlitePool>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_user_exists(&pool, user_id).await?;

    let mut conn = pool.acquire().await?;
    let roles = rbac::user_roles(&mut conn, user_id).await?;

    Ok(Json(UserRolesResponse {
        user_id,
        roles,
        message: "Roles retrieved successfully".to_string(),
    }))
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    is_admin: bool,
}

pub async fn list_users_with_roles(
    State(pool): State<SqlitePool>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, AppError> {
    let skip = params.skip.unwrap_or(0).max(0);
    let limit = params.limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let mut conn = pool.acquire().await?;

    let users = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, is_admin FROM users ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(limit)
    .bind(skip)
    .fetch_all(&mut *conn)
    .await?;

    let mut listed = Vec::with_capacity(users.len());
    for user in users {
        let roles = rbac::user_roles(&mut conn, user.id).await?;
        listed.push(UserWithRoles {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            roles,
        });
    }

    Ok(Json(listed))
}

// ------------------------------------------------------------------
// Resolution
// ------------------------------------------------------------------

/// Resolves `resource:action` for the caller, or for `user_id` when given.
pub async fn check_permission(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CheckPermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let caller_id = claims.user_id()?;
    let user_id = payload.user_id.unwrap_or(caller_id);

    if user_id != caller_id && !claims.is_admin {
        return Err(AppError::Forbidden(
            "Only administrators can check permissions of other users".to_string(),
        ));
    }

    let mut conn = pool.acquire().await?;
    let has_permission =
        rbac::user_has_permission(&mut conn, user_id, &payload.resource, &payload.action).await?;

    Ok(Json(CheckPermissionResponse {
        user_id,
        resource: payload.resource,
        action: payload.action,
        has_permission,
    }))
}
