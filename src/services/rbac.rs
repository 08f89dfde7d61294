// src/services/rbac.rs

use std::fmt;

use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    error::AppError,
    models::rbac::{PermissionRecord, RoleRecord, RoleWithPermissions},
};

/// Resource/action pair of the permission that grants everything.
pub const WILDCARD_RESOURCE: &str = "admin";
pub const WILDCARD_ACTION: &str = "all";

/// A permission as the resolver sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// `admin:all`: satisfies every check.
    WildcardAdmin,
    Specific { resource: String, action: String },
}

impl Permission {
    pub fn from_parts(resource: &str, action: &str) -> Self {
        if resource == WILDCARD_RESOURCE && action == WILDCARD_ACTION {
            Permission::WildcardAdmin
        } else {
            Permission::Specific {
                resource: resource.to_string(),
                action: action.to_string(),
            }
        }
    }

    pub fn grants(&self, resource: &str, action: &str) -> bool {
        match self {
            Permission::WildcardAdmin => true,
            Permission::Specific {
                resource: r,
                action: a,
            } => r == resource && a == action,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::WildcardAdmin => write!(f, "{}:{}", WILDCARD_RESOURCE, WILDCARD_ACTION),
            Permission::Specific { resource, action } => write!(f, "{}:{}", resource, action),
        }
    }
}

/// Admin users pass every check; everyone else needs a granting permission
/// in one of their roles.
pub fn resolve(is_admin: bool, granted: &[Permission], resource: &str, action: &str) -> bool {
    is_admin || granted.iter().any(|p| p.grants(resource, action))
}

#[derive(FromRow)]
struct PermissionPair {
    resource: String,
    action: String,
}

/// Union of the permissions of every role assigned to `user_id`.
pub async fn effective_permissions(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<Permission>, AppError> {
    let pairs = sqlx::query_as::<_, PermissionPair>(
        r#"
        SELECT DISTINCT p.resource, p.action
        FROM user_roles ur
        JOIN role_permissions rp ON rp.role_id = ur.role_id
        JOIN permissions p ON p.id = rp.permission_id
        WHERE ur.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(pairs
        .into_iter()
        .map(|p| Permission::from_parts(&p.resource, &p.action))
        .collect())
}

/// Looks the user up and resolves `resource:action` for them. No caching.
pub async fn user_has_permission(
    conn: &mut SqliteConnection,
    user_id: i64,
    resource: &str,
    action: &str,
) -> Result<bool, AppError> {
    let is_admin: bool = sqlx::query_scalar("SELECT is_admin FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if is_admin {
        return Ok(true);
    }

    let granted = effective_permissions(conn, user_id).await?;
    Ok(resolve(false, &granted, resource, action))
}

pub async fn find_role(conn: &mut SqliteConnection, role_id: i64) -> Result<RoleRecord, AppError> {
    sqlx::query_as::<_, RoleRecord>("SELECT * FROM roles WHERE id = ?")
        .bind(role_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::NotFound(format!("Role {} not found", role_id)))
}

pub async fn role_permissions(
    conn: &mut SqliteConnection,
    role_id: i64,
) -> Result<Vec<PermissionRecord>, AppError> {
    let permissions = sqlx::query_as::<_, PermissionRecord>(
        r#"
        SELECT p.*
        FROM permissions p
        JOIN role_permissions rp ON rp.permission_id = p.id
        WHERE rp.role_id = ?
        ORDER BY p.id
        "#,
    )
    .bind(role_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(permissions)
}

pub async fn role_with_permissions(
    conn: &mut SqliteConnection,
    role_id: i64,
) -> Result<RoleWithPermissions, AppError> {
    let role = find_role(conn, role_id).await?;
    let permissions = role_permissions(conn, role_id).await?;
    Ok(RoleWithPermissions { role, permissions })
}

/// Replaces the permission set of a role. Unknown permission ids are rejected
/// before anything is written.
pub async fn set_role_permissions(
    conn: &mut SqliteConnection,
    role_id: i64,
    permission_ids: &[i64],
) -> Result<(), AppError> {
    ensure_all_exist(conn, "permissions", permission_ids).await?;

    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(role_id)
        .execute(&mut *conn)
        .await?;

    if permission_ids.is_empty() {
        return Ok(());
    }

    let mut builder =
        QueryBuilder::<Sqlite>::new("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) ");
    builder.push_values(permission_ids, |mut row, permission_id| {
        row.push_bind(role_id).push_bind(*permission_id);
    });
    builder.build().execute(&mut *conn).await?;

    Ok(())
}

pub async fn user_roles(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<RoleRecord>, AppError> {
    let roles = sqlx::query_as::<_, RoleRecord>(
        r#"
        SELECT r.*
        FROM roles r
        JOIN user_roles ur ON ur.role_id = r.id
        WHERE ur.user_id = ?
        ORDER BY r.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(roles)
}

/// Replaces the role set of a user.
pub async fn assign_roles(
    conn: &mut SqliteConnection,
    user_id: i64,
    role_ids: &[i64],
) -> Result<Vec<RoleRecord>, AppError> {
    ensure_all_exist(conn, "roles", role_ids).await?;

    sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if !role_ids.is_empty() {
        let mut builder =
            QueryBuilder::<Sqlite>::new("INSERT OR IGNORE INTO user_roles (user_id, role_id) ");
        builder.push_values(role_ids, |mut row, role_id| {
            row.push_bind(user_id).push_bind(*role_id);
        });
        builder.build().execute(&mut *conn).await?;
    }

    user_roles(conn, user_id).await
}

/// Fails with `NotFound` naming the first id missing from `table`.
async fn ensure_all_exist(
    conn: &mut SqliteConnection,
    table: &'static str,
    ids: &[i64],
) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT id FROM {} WHERE id IN (", table));
    let mut separated = builder.separated(",");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let found: Vec<i64> = builder
        .build_query_scalar()
        .fetch_all(&mut *conn)
        .await?;

    match ids.iter().find(|id| !found.contains(*id)) {
        Some(missing) => Err(AppError::NotFound(format!(
            "{} {} not found",
            table.trim_end_matches('s'),
            missing
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specific(resource: &str, action: &str) -> Permission {
        Permission::from_parts(resource, action)
    }

    #[test]
    fn test_admin_flag_bypasses_check() {
        assert!(resolve(true, &[], "user", "read"));
        assert!(resolve(true, &[], "anything", "whatever"));
    }

    #[test]
    fn test_exact_match_required() {
        let granted = [specific("quiz", "read"), specific("quiz", "write")];
        assert!(resolve(false, &granted, "quiz", "read"));
        assert!(resolve(false, &granted, "quiz", "write"));
        assert!(!resolve(false, &granted, "quiz", "delete"));
        assert!(!resolve(false, &granted, "analytics", "read"));
    }

    #[test]
    fn test_no_roles_no_access() {
        assert!(!resolve(false, &[], "quiz", "read"));
    }

    #[test]
    fn test_admin_all_is_wildcard() {
        assert_eq!(specific("admin", "all"), Permission::WildcardAdmin);
        assert!(resolve(false, &[Permission::WildcardAdmin], "analytics", "read"));
    }

    #[test]
    fn test_admin_resource_with_other_action_is_specific() {
        let perm = specific("admin", "read");
        assert!(matches!(perm, Permission::Specific { .. }));
        assert!(!resolve(false, &[perm], "quiz", "read"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Permission::WildcardAdmin.to_string(), "admin:all");
        assert_eq!(specific("quiz", "read").to_string(), "quiz:read");
    }
}
