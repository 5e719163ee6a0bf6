// JSON endpoints backing the storefront widgets

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::{
    booking::rental_days,
    catalog::{self, FilterCriteria},
    error::AppError,
    models::Car,
    AppState,
};

#[derive(Serialize)]
struct CarListResponse {
    success: bool,
    total: usize,
    available: usize,
    active_filters: usize,
    cars: Vec<Car>,
}

#[derive(Deserialize)]
pub struct DaysQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Serialize)]
struct DaysResponse {
    days: i64,
}

pub async fn list_cars(
    State(app_state): State<AppState>,
    Query(criteria): Query<FilterCriteria>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] /api/cars - criteria: {:?}", criteria);

    let cars = app_state.catalog.cars().await?;
    let filtered = catalog::filter_cars(&cars, &criteria);

    tracing::info!("[HANDLER] /api/cars - {} of {} cars match.", filtered.len(), cars.len());
    Ok(Json(CarListResponse {
        success: true,
        total: filtered.len(),
        available: catalog::available_count(&filtered),
        active_filters: criteria.active_count(),
        cars: filtered,
    }))
}

pub async fn booking_days(Query(query): Query<DaysQuery>) -> impl IntoResponse {
    let days = rental_days(query.start.as_deref(), query.end.as_deref());
    tracing::debug!("[HANDLER] /api/booking/days - {:?}..{:?} = {}", query.start, query.end, days);
    Json(DaysResponse { days })
}
