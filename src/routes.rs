// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, analytics, attempt, auth, profile, quiz, rbac},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, me, quizzes, attempts, rbac, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool and Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let me_routes = Router::new()
        .route("/", get(profile::get_me))
        .route("/profile", put(profile::update_profile))
        .route("/attempts", get(profile::list_my_attempts))
        .layer(auth_layer.clone());

    let quiz_routes = Router::new()
        .route("/", post(quiz::create_quiz))
        .route("/eligible", get(quiz::list_eligible_quizzes))
        .route("/mine", get(quiz::list_my_quizzes))
        .route(
            "/{id}",
            get(quiz::get_quiz)
                .put(quiz::update_quiz)
                .delete(quiz::delete_quiz),
        )
        .route("/{id}/questions", post(quiz::add_question))
        .route("/{id}/attempts", post(attempt::start_attempt))
        .route("/{id}/analytics", get(analytics::get_quiz_analytics))
        .layer(auth_layer.clone());

    let attempt_routes = Router::new()
        .route(
            "/{id}",
            get(attempt::take_attempt).delete(attempt::delete_attempt),
        )
        .route("/{id}/responses", post(attempt::submit_answer))
        .route("/{id}/submit", post(attempt::submit_attempt))
        .route("/{id}/result", get(attempt::get_result))
        .layer(auth_layer.clone());

    let rbac_routes = Router::new()
        .route(
            "/permissions",
            get(rbac::list_permissions).post(rbac::create_permission),
        )
        .route("/permissions/{id}", delete(rbac::delete_permission))
        .route("/roles", get(rbac::list_roles).post(rbac::create_role))
        .route(
            "/roles/{id}",
            get(rbac::get_role)
                .put(rbac::update_role)
                .delete(rbac::delete_role),
        )
        .route("/users", get(rbac::list_users_with_roles))
        .route(
            "/users/{id}/roles",
            get(rbac::get_user_roles).post(rbac::assign_user_roles),
        )
        // Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer.clone())
        // Any authenticated user may resolve their own permissions
        .merge(
            Router::new()
                .route("/check-permission", post(rbac::check_permission))
                .layer(auth_layer.clone()),
        );

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/me", me_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/rbac", rbac_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
