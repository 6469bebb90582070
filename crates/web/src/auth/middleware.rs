//! Session guard middleware for Axum.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, warn};

use ecomos_common::Identity;

use crate::server::AppState;

use super::session::token_from_headers;

/// Extension holding the identity attached to the current session.
#[derive(Clone)]
pub struct CurrentIdentity(pub Identity);

/// Middleware guarding the post-login surfaces.
///
/// A request without a valid session never sees the guarded handler; it is
/// redirected to the login surface instead.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = token_from_headers(request.headers());

    let identity = match token {
        Some(token) => match lookup_identity(&state, &token).await {
            Some(identity) => identity,
            None => {
                debug!(path = %request.uri().path(), "stale session, redirecting to login");
                return Redirect::to("/auth/login").into_response();
            }
        },
        None => {
            debug!(path = %request.uri().path(), "no session, redirecting to login");
            return Redirect::to("/auth/login").into_response();
        }
    };

    request.extensions_mut().insert(CurrentIdentity(identity));
    next.run(request).await
}

async fn lookup_identity(state: &AppState, token: &str) -> Option<Identity> {
    let session = match state.sessions.validate(token) {
        Ok(session) => session?,
        Err(e) => {
            warn!(error = %e, "session validation failed, treating as unauthenticated");
            return None;
        }
    };

    match state.backend.identity_by_id(&session.user_id).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(user_id = %session.user_id, error = %e, "identity lookup failed, treating as unauthenticated");
            None
        }
    }
}
