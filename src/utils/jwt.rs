// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{config::Config, error::AppError, models::user::UserRole};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Academic role ('student' or 'teacher').
    pub role: UserRole,
    /// Whether the user holds administrator rights.
    pub is_admin: bool,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }

    /// Fails with 403 unless the caller is a student.
    pub fn require_student(&self) -> Result<i64, AppError> {
        if self.role != UserRole::Student {
            return Err(AppError::Forbidden(
                "Only students can attempt quizzes.".to_string(),
            ));
        }
        self.user_id()
    }

    /// Fails with 403 unless the caller is a teacher.
    pub fn require_teacher(&self) -> Result<i64, AppError> {
        if self.role != UserRole::Teacher {
            return Err(AppError::Forbidden(
                "Only teachers can manage quizzes.".to_string(),
            ));
        }
        self.user_id()
    }
}

/// Signs a new JWT for the user.
///
/// Arguments:
/// * `id`: User ID.
/// * `role`: User role.
/// * `is_admin`: Administrator flag at sign-in time, refreshed by `auth_middleware`.
pub fn sign_jwt(
    id: i64,
    role: UserRole,
    is_admin: bool,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(), // Store User ID in 'sub' claim
        role,
        is_admin,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header
/// and re-reads the account from the database, so revoked rights, deactivated
/// accounts and deleted users take effect on the next request.
/// If valid, injects `Claims` carrying the stored role and admin flag.
/// If invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    State(pool): State<SqlitePool>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = auth_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::AuthError("Missing credentials".to_string()))?;

    let mut claims = verify_jwt(token, &config.jwt_secret)?;
    let user_id = claims.user_id()?;

    let account = sqlx::query_as::<_, (UserRole, bool, bool)>(
        "SELECT role, is_admin, is_active FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?;

    let Some((role, is_admin, is_active)) = account else {
        tracing::warn!("Token presented for missing user {}", user_id);
        return Err(AppError::AuthError("User no longer exists".to_string()));
    };
    if !is_active {
        tracing::warn!("Token presented for disabled user {}", user_id);
        return Err(AppError::AuthError("Account is disabled".to_string()));
    }

    claims.role = role;
    claims.is_admin = is_admin;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`, which refreshes the admin flag from the database.
/// If not set, returns 403 Forbidden.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(AppError::AuthError("Missing credentials".to_string()))?;

    if !claims.is_admin {
        tracing::warn!("User {} denied admin route {}", claims.sub, req.uri().path());
        return Err(AppError::Forbidden(
            "Administrator privileges required".to_string(),
        ));
    }

    Ok(next.run(req).await)
}
