use askama::Template;
use axum::{
    extract::{Form, Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;

use super::{car_views, redirect_with, render, CarView, NavView, Notice, NoticeQuery};
use crate::{
    auth_middleware::Session,
    booking::rental_days,
    catalog::{self, FilterCriteria, Selector, LOCATIONS},
    error::AppError,
    models::{BookingForm, Category, CreateBookingRequest, FuelType, Role},
    AppState,
};

pub struct FilterOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

fn options<T: PartialEq>(
    all_label: &str,
    selector: &Selector<T>,
    values: impl IntoIterator<Item = (T, String, String)>,
) -> Vec<FilterOption> {
    let mut options = vec![FilterOption {
        value: catalog::ALL.to_string(),
        label: all_label.to_string(),
        selected: selector.is_all(),
    }];
    options.extend(values.into_iter().map(|(value, raw, label)| FilterOption {
        selected: selector.accepts(&value) && !selector.is_all(),
        value: raw,
        label,
    }));
    options
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    nav: NavView,
    notice: Notice,
    featured: Vec<CarView>,
    cars: Vec<CarView>,
    available_now: usize,
    search: String,
    categories: Vec<FilterOption>,
    fuel_types: Vec<FilterOption>,
    locations: Vec<FilterOption>,
    active_filters: usize,
    filtered: bool,
}

// Which filter-form button was pressed
#[derive(Debug, Default, Deserialize)]
pub struct ApplyFlag {
    applied: Option<String>,
    clear: Option<String>,
}

pub async fn home(
    State(app_state): State<AppState>,
    session: Option<Session>,
    Query(criteria): Query<FilterCriteria>,
    Query(flag): Query<ApplyFlag>,
) -> Result<impl IntoResponse, AppError> {
    let criteria = if flag.clear.is_some() { FilterCriteria::cleared() } else { criteria };
    tracing::info!("[HANDLER] / - criteria: {:?}", criteria);

    let (all_cars, mut notice) = match app_state.catalog.cars().await {
        Ok(cars) => (cars.as_ref().clone(), Notice::none()),
        Err(e) => {
            tracing::error!("[HANDLER] / - failed to load catalog: {}", e);
            (Vec::new(), Notice::error("Failed to load cars"))
        }
    };

    let filtered = catalog::filter_cars(&all_cars, &criteria);
    if flag.applied.is_some() && flag.clear.is_none() && !notice.is_error() {
        notice = Notice::success(format!("Found {} cars matching your criteria", filtered.len()));
    }

    let template = HomeTemplate {
        nav: NavView::from_session(session.as_ref()),
        notice,
        featured: car_views(&catalog::featured_cars(&all_cars)),
        available_now: catalog::available_count(&filtered),
        cars: car_views(&filtered),
        search: criteria.search.clone(),
        categories: options(
            "All Categories",
            &criteria.category,
            Category::ALL.map(|c| (c, c.as_str().to_string(), c.label().to_string())),
        ),
        fuel_types: options(
            "All Types",
            &criteria.fuel_type,
            FuelType::ALL.map(|f| (f, f.as_str().to_string(), f.label().to_string())),
        ),
        locations: options(
            "All Locations",
            &criteria.location,
            LOCATIONS.map(|l| (l.to_string(), l.to_string(), l.to_string())),
        ),
        active_filters: criteria.active_count(),
        filtered: !criteria.is_cleared(),
    };
    render(&template, "home")
}

#[derive(Template)]
#[template(path = "car_details.html")]
struct CarDetailsTemplate {
    nav: NavView,
    notice: Notice,
    car: CarView,
    start: String,
    end: String,
    days: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailsQuery {
    start: Option<String>,
    end: Option<String>,
    #[serde(flatten)]
    notice: NoticeQuery,
}

pub async fn car_details(
    State(app_state): State<AppState>,
    session: Option<Session>,
    Path(car_id): Path<String>,
    Query(query): Query<DetailsQuery>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] /cars/:id - car: {}", car_id);

    let car = match app_state.backend.get_car(&car_id).await {
        Ok(car) => car,
        Err(e) if e.status() == Some(reqwest::StatusCode::NOT_FOUND) => {
            return Err(AppError::NotFound("Car Not Found".into()));
        }
        Err(e) => {
            tracing::error!("[HANDLER] /cars/:id - failed to load car {}: {}", car_id, e);
            return Err(AppError::Backend(e));
        }
    };

    let days = rental_days(query.start.as_deref(), query.end.as_deref());
    let template = CarDetailsTemplate {
        nav: NavView::from_session(session.as_ref()),
        notice: query.notice.into_notice(),
        car: CarView::from(&car),
        start: query.start.unwrap_or_default(),
        end: query.end.unwrap_or_default(),
        days,
    };
    render(&template, "car details")
}

pub async fn book_car(
    State(app_state): State<AppState>,
    session: Option<Session>,
    Path(car_id): Path<String>,
    Form(form): Form<BookingForm>,
) -> Result<Redirect, AppError> {
    let back = format!("/cars/{}", car_id);

    let Some(session) = session else {
        tracing::info!("[HANDLER] /cars/:id/book - anonymous visitor, sending to login");
        return Ok(redirect_with("/login", Notice::error("Please login to book this car")));
    };
    if session.user.role != Role::User {
        return Ok(redirect_with(&back, Notice::error("Only users can book cars")));
    }
    if form.start_date.trim().is_empty() || form.end_date.trim().is_empty() {
        return Ok(redirect_with(&back, Notice::error("Please select both pickup and return dates")));
    }

    // No price here: the backend prices the booking from the car's category
    let request = CreateBookingRequest {
        car: car_id.clone(),
        start_date: form.start_date,
        end_date: form.end_date,
    };

    match app_state.backend.create_booking(&session.token, &request).await {
        Ok(booking) => {
            tracing::info!(
                "[HANDLER] /cars/:id/book - booking {} created for {} ({} days)",
                booking.id,
                session.user.email,
                booking.total_days
            );
            Ok(redirect_with(&back, Notice::success("Booking created successfully!")))
        }
        Err(e) => {
            tracing::warn!("[HANDLER] /cars/:id/book - booking failed: {}", e);
            Ok(redirect_with(&back, Notice::error(e.user_message())))
        }
    }
}
