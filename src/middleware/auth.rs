//! Request authentication middleware and the handler-side extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::error::AuthError;
use crate::services::{AuthContext, AuthOptions};
use crate::AppState;

/// Authenticate the request and stash the resulting context as a request
/// extension for handlers and downstream middleware.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let ctx = state
        .authenticator
        .authenticate(
            req.headers(),
            req.method(),
            req.uri().path(),
            AuthOptions::default(),
        )
        .await?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

/// Extractor for the authenticated caller's context.
pub struct AuthUser(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AuthError::unauthorized("Missing or invalid Authorization header"))
    }
}
