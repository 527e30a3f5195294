//! Session gates for protected routes.

use crate::auth::SESSION_COOKIE;
use crate::db::User;
use crate::error::{AppError, Result};
use crate::server::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

/// The logged-in user, placed in request extensions by the gates.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Auth("Unauthorized, please log in".to_string()))
    }
}

/// Session token from the `Cookie` header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            c.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty())
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let token = session_token(headers)
        .ok_or_else(|| AppError::Auth("Unauthorized, please log in".to_string()))?;
    state.auth.authenticate(token)
}

async fn admit(
    state: &AppState,
    mut req: Request,
    next: Next,
    allowed: impl Fn(&User) -> bool,
    denial: &str,
) -> Result<Response> {
    let user = authenticate(state, req.headers())?;
    if !allowed(&user) {
        tracing::debug!(user = %user.name, path = %req.uri().path(), "Role check failed");
        return Err(AppError::Auth(denial.to_string()));
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Any valid session.
pub async fn require_login(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    admit(&state, req, next, |_| true, "Unauthorized, please log in").await
}

/// Librarians (and admins).
pub async fn require_librarian(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    admit(
        &state,
        req,
        next,
        |u| u.librarian || u.admin,
        "Unauthorized, you are not a librarian",
    )
    .await
}

/// Admins only.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    admit(
        &state,
        req,
        next,
        |u| u.admin,
        "Unauthorized, you are not an admin",
    )
    .await
}
