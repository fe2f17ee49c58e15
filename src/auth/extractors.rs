use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{
    auth::{repo_types::User, session::SessionKeys},
    error::AppError,
    notice::{redirect_with_notice, Notice},
    state::AppState,
};

pub const LOGIN_REQUIRED: &str = "Please log in to access this page.";

/// The user bound to this request's session, if any.
pub struct CurrentUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = SessionKeys::session_token(&parts.headers) else {
            return Ok(CurrentUser(None));
        };
        let claims = match state.keys.verify_session(&token) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "invalid or expired session token");
                return Ok(CurrentUser(None));
            }
        };
        // Resolve directly; a deleted user simply means an anonymous request.
        let user = User::find_by_id(&state.db, claims.sub).await?;
        Ok(CurrentUser(user))
    }
}

/// Guard for pages that need a logged-in user; anonymous requests go to `/login`.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        user.map(AuthUser).ok_or_else(|| {
            redirect_with_notice(&state.keys, "/login", Notice::info(LOGIN_REQUIRED))
        })
    }
}
