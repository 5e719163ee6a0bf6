// Route definitions and the view helpers shared by the page handlers

use askama::Template;
use axum::{
    response::{Html, Redirect},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::{
    auth_middleware::Session,
    error::{AppError, AppResult},
    models::{Car, Role},
    AppState,
};

mod admin;
mod api;
mod auth;
mod storefront;
mod user;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/cars", get(api::list_cars))
        .route("/booking/days", get(api::booking_days))
        .with_state(app_state.clone());

    let user_router = Router::new()
        .route("/dashboard", get(user::dashboard).post(user::update_profile))
        .route("/booking", get(user::bookings))
        .route("/booking/:id/complete", post(user::complete_booking))
        .route("/booking/:id/cancel", post(user::cancel_booking))
        .with_state(app_state.clone());

    let admin_router = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/manage_car", get(admin::manage_cars).post(admin::create_car))
        .route("/manage_car/:id/availability", post(admin::toggle_availability))
        .route("/manage_car/:id/delete", post(admin::delete_car))
        .route("/manage_booking", get(admin::manage_bookings))
        .route("/manage_booking/export.csv", get(admin::export_bookings))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(storefront::home))
        .route("/cars/:id", get(storefront::car_details))
        .route("/cars/:id/book", post(storefront::book_car))
        .route("/login", get(auth::login_page).post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .nest("/api", api_router)
        .nest("/user", user_router)
        .nest("/admin", admin_router)
        .with_state(app_state)
}

// --- Rendering ---

fn render<T: Template>(template: &T, name: &str) -> AppResult<Html<String>> {
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render {} template: {}", name, e);
            Err(AppError::from(e))
        }
    }
}

// --- Notices ---

/// The single outcome banner of a page.
#[derive(Debug, Clone, Default)]
pub struct Notice {
    pub kind: String,
    pub message: String,
}

impl Notice {
    pub fn none() -> Self {
        Notice::default()
    }

    pub fn success(message: impl Into<String>) -> Self {
        Notice { kind: "success".into(), message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice { kind: "error".into(), message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }
}

// `?notice=` / `?error=` carried across post/redirect/get
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
    pub error: Option<String>,
}

impl NoticeQuery {
    pub fn into_notice(self) -> Notice {
        match (self.error, self.notice) {
            (Some(error), _) if !error.is_empty() => Notice::error(error),
            (_, Some(notice)) if !notice.is_empty() => Notice::success(notice),
            _ => Notice::none(),
        }
    }
}

fn redirect_with(path: &str, notice: Notice) -> Redirect {
    let key = if notice.is_error() { "error" } else { "notice" };
    match serde_urlencoded::to_string([(key, notice.message.as_str())]) {
        Ok(query) if !notice.message.is_empty() => Redirect::to(&format!("{}?{}", path, query)),
        _ => Redirect::to(path),
    }
}

// --- Shared view models ---

/// Header navigation state.
#[derive(Debug, Clone, Default)]
pub struct NavView {
    pub logged_in: bool,
    pub is_admin: bool,
    pub name: String,
    pub dashboard_url: String,
}

impl NavView {
    pub fn from_session(session: Option<&Session>) -> Self {
        match session {
            Some(session) => NavView {
                logged_in: true,
                is_admin: session.user.role == Role::Admin,
                name: session.user.name.clone(),
                dashboard_url: match session.user.role {
                    Role::Admin => "/admin/dashboard".into(),
                    Role::User => "/user/dashboard".into(),
                },
            },
            None => NavView::default(),
        }
    }
}

/// A car as shown on cards and tables.
#[derive(Debug, Clone)]
pub struct CarView {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub category: String,
    pub category_label: String,
    pub fuel_type: String,
    pub seats: u32,
    pub mileage: f64,
    pub features: Vec<String>,
    pub top_features: Vec<String>,
    pub image: String,
    pub location: String,
    pub available: bool,
    // Empty when the backend did not send a price
    pub price: String,
}

impl From<&Car> for CarView {
    fn from(car: &Car) -> Self {
        CarView {
            id: car.id.clone(),
            name: car.name.clone(),
            brand: car.brand.clone(),
            model: car.model.clone(),
            year: car.year,
            color: car.color.clone(),
            category: car.category.as_str().to_string(),
            category_label: car.category.label().to_string(),
            fuel_type: car.fuel_type.label().to_string(),
            seats: car.seats,
            mileage: car.mileage,
            features: car.features.clone(),
            top_features: car.features.iter().take(3).cloned().collect(),
            image: car.image.clone(),
            location: car.location.clone(),
            available: car.is_available,
            price: car.price_per_day.map(|p| format!("{}", p)).unwrap_or_default(),
        }
    }
}

pub fn car_views(cars: &[Car]) -> Vec<CarView> {
    cars.iter().map(CarView::from).collect()
}
