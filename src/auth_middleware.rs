use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    RequestPartsExt,
};
use axum_extra::{extract::CookieJar, TypedHeader};
use headers::{authorization::Bearer, Authorization};
use tracing::{debug, warn};

use crate::{
    error::AppError,
    models::{Role, User},
    AppState,
};

/// Access token from the session cookie, or from an `Authorization: Bearer` header.
async fn session_token(parts: &mut Parts, cookie_name: &str) -> Option<String> {
    let jar = parts.extract::<CookieJar>().await.ok()?;
    if let Some(cookie) = jar.get(cookie_name) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
        Ok(TypedHeader(Authorization(bearer))) => Some(bearer.token().to_string()),
        Err(_) => None,
    }
}

// A logged-in visitor: the token to forward to the backend and the user it belongs to
#[derive(Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = session_token(parts, &app_state.settings.session_cookie)
            .await
            .ok_or_else(|| {
                debug!("No session token on request to {}", parts.uri.path());
                AppError::LoginRequired
            })?;

        let user = app_state.sessions.current_user(&token).await.map_err(|e| {
            if crate::session::is_session_error(&e) {
                warn!("Session token rejected: {:?}", e);
                AppError::LoginRequired
            } else {
                e
            }
        })?;

        Ok(Session { token, user })
    }
}

// Session whose user has the admin role
pub struct AdminSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        if !session.is_admin() {
            warn!("User {} attempted to open an admin page", session.user.email);
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        Ok(AdminSession(session))
    }
}
