use askama::Template;
use axum::{
    extract::{Form, Query, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::{redirect_with, render, NavView, Notice, NoticeQuery};
use crate::{error::AppError, models::{LoginForm, Role}, AppState};

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    nav: NavView,
    notice: Notice,
}

pub async fn login_page(Query(query): Query<NoticeQuery>) -> Result<impl IntoResponse, AppError> {
    let template = LoginTemplate {
        nav: NavView::default(),
        notice: query.into_notice(),
    };
    render(&template, "login")
}

// Handler for POST /login
// The token is issued by the backend's auth service; we only keep it in the session cookie
pub async fn handle_login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<(CookieJar, Redirect), AppError> {
    let token = form.access_token.trim().to_string();
    tracing::info!("Received login token ({} chars)", token.chars().count());
    if token.is_empty() {
        return Ok((jar, redirect_with("/login", Notice::error("Access token is required"))));
    }

    match app_state.sessions.refresh(&token).await {
        Ok(user) => {
            tracing::info!("Session started for {}", user.email);
            let cookie = Cookie::build((app_state.settings.session_cookie.clone(), token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax);
            let landing = match user.role {
                Role::Admin => "/admin/dashboard",
                Role::User => "/user/dashboard",
            };
            Ok((jar.add(cookie), Redirect::to(landing)))
        }
        Err(e) => {
            tracing::warn!("Login rejected: {:?}", e);
            let message = match e {
                AppError::Backend(backend) => backend.user_message(),
                AppError::Unauthorized(message) => message,
                _ => "Login failed".to_string(),
            };
            Ok((jar, redirect_with("/login", Notice::error(message))))
        }
    }
}

pub async fn handle_logout(State(app_state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let cookie_name = app_state.settings.session_cookie.clone();
    if let Some(cookie) = jar.get(&cookie_name) {
        app_state.sessions.forget(cookie.value()).await;
    }
    (
        jar.remove(Cookie::build((cookie_name, "")).path("/")),
        redirect_with("/", Notice::success("Logged out")),
    )
}
