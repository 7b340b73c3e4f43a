// src/routes.rs

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, auth, category, comment, follow, notification, post, profile},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, optional_auth_middleware},
};

/// Assembles the main application router.
///
/// * Public reads pass through `optional_auth_middleware` so NSFW preferences apply.
/// * Writes sit behind `auth_middleware`; moderation behind `admin_middleware` too.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            "http://localhost:3000".parse().expect("static origin"),
            "http://127.0.0.1:3000".parse().expect("static origin"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);
    let maybe_auth = middleware::from_fn_with_state(state.clone(), optional_auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let post_routes = Router::new()
        .route("/", get(post::list_posts))
        .route("/{id}", get(post::get_post))
        .route("/{id}/comments", get(comment::list_comments))
        .route_layer(maybe_auth.clone())
        .merge(
            Router::new()
                .route("/", post(post::create_post))
                .route("/feed", get(post::feed))
                .route("/{id}", put(post::update_post).delete(post::delete_post))
                .route("/{id}/like", post(post::toggle_like))
                .route("/{id}/comments", post(comment::create_comment))
                .route_layer(require_auth.clone()),
        );

    let comment_routes = Router::new()
        .route(
            "/{id}",
            put(comment::update_comment).delete(comment::delete_comment),
        )
        .route_layer(require_auth.clone());

    let user_routes = Router::new()
        .route("/{id}", get(profile::get_user))
        .route("/{id}/posts", get(post::list_user_posts))
        .route("/{id}/followers", get(follow::list_followers))
        .route("/{id}/following", get(follow::list_following))
        .route_layer(maybe_auth)
        .merge(
            Router::new()
                .route("/me", get(profile::get_me).put(profile::update_me))
                .route("/{id}/follow", post(follow::toggle_follow))
                .route_layer(require_auth.clone()),
        );

    let category_routes = Router::new()
        .route("/", get(category::list_categories))
        .merge(
            Router::new()
                .route("/", post(category::create_category))
                .route_layer(middleware::from_fn(admin_middleware))
                .route_layer(require_auth.clone()),
        );

    let notification_routes = Router::new()
        .route("/", get(notification::list_notifications))
        .route("/read-all", put(notification::mark_all_read))
        .route("/{id}/read", put(notification::mark_read))
        .route_layer(require_auth.clone());

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", axum::routing::delete(admin::delete_user))
        .route("/users/{id}/block", put(admin::set_blocked))
        .route("/users/{id}/censor", put(admin::set_censored))
        // Double middleware protection: Auth first, then Admin check
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(require_auth);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/posts", post_routes)
        .nest("/api/comments", comment_routes)
        .nest("/api/users", user_routes)
        .nest("/api/categories", category_routes)
        .nest("/api/notifications", notification_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
