//! Authentication and authorization core for a multi-tenant workspace
//! backend: signed session tokens with revocation, scoped API keys, team
//! role gating and persisted sliding-window rate limits.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AuthConfig;
use crate::db::CredentialStore;
use crate::services::{
    ApiKeyService, AuthService, Authenticator, JwtService, RateCategory, RateLimitService,
    RevocationStore, TeamService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AuthConfig>,
    pub store: Arc<dyn CredentialStore>,
    pub revocation: Arc<dyn RevocationStore>,
    pub authenticator: Authenticator,
    pub auth: AuthService,
    pub keys: ApiKeyService,
    pub teams: TeamService,
    pub rate_limiter: RateLimitService,
}

impl AppState {
    pub fn new(
        config: Arc<AuthConfig>,
        store: Arc<dyn CredentialStore>,
        revocation: Arc<dyn RevocationStore>,
        rate_limiter: RateLimitService,
    ) -> Result<Self, anyhow::Error> {
        let jwt = JwtService::new(&config.jwt, revocation.clone())?;
        Ok(Self {
            config,
            store: store.clone(),
            revocation,
            authenticator: Authenticator::new(store.clone(), jwt.clone()),
            auth: AuthService::new(store.clone(), jwt),
            keys: ApiKeyService::new(store.clone()),
            teams: TeamService::new(store),
            rate_limiter,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // Anonymous credential endpoints get the strict auth budget, keyed by
    // client IP.
    let public = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            (state.clone(), RateCategory::Auth),
            middleware::rate_limit_middleware,
        ));

    // Authentication runs first on protected routes, then the general
    // budget keyed by the authenticated user id.
    let protected = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/switch-team", post(handlers::auth::switch_team))
        .route(
            "/api-keys",
            post(handlers::keys::create).get(handlers::keys::list),
        )
        .route("/api-keys/:key_id", delete(handlers::keys::revoke))
        .route(
            "/team/members",
            get(handlers::team::list_members).post(handlers::team::add_member),
        )
        .route(
            "/team/members/:user_id",
            patch(handlers::team::change_member_role).delete(handlers::team::remove_member),
        )
        .route("/team/leave", post(handlers::team::leave))
        .layer(from_fn_with_state(
            (state.clone(), RateCategory::General),
            middleware::rate_limit_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .route("/health", get(handlers::health::health))
        .merge(public)
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &AuthConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
