// User panel: profile and own bookings

use askama::Template;
use axum::{
    extract::{Form, Path, Query, State},
    response::{IntoResponse, Redirect},
};
use validator::{Validate, ValidationErrors};

use super::{redirect_with, render, NavView, Notice, NoticeQuery};
use crate::{
    auth_middleware::Session,
    booking::{display_date, BookingSummary},
    error::AppError,
    models::{Booking, BookingStatus, ProfileUpdate, User},
    AppState,
};

#[derive(Template)]
#[template(path = "user_dashboard.html")]
struct UserDashboardTemplate {
    nav: NavView,
    notice: Notice,
    user: User,
    member_since: String,
}

pub async fn dashboard(
    session: Session,
    Query(query): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] /user/dashboard - user: {}", session.user.email);
    let template = UserDashboardTemplate {
        nav: NavView::from_session(Some(&session)),
        notice: query.into_notice(),
        member_since: session.user.created_at.as_deref().map(display_date).unwrap_or_default(),
        user: session.user,
    };
    render(&template, "user dashboard")
}

// First failing rule, in form order
fn first_error(errors: &ValidationErrors, fields: &[&str]) -> String {
    let by_field = errors.field_errors();
    fields
        .iter()
        .filter_map(|field| by_field.get(*field))
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Please check the form".to_string())
}

pub async fn update_profile(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<ProfileUpdate>,
) -> Result<Redirect, AppError> {
    let update = form.trimmed();
    if let Err(errors) = update.validate() {
        return Ok(redirect_with(
            "/user/dashboard",
            Notice::error(first_error(&errors, &["name", "email"])),
        ));
    }

    match app_state.backend.update_current_user(&session.token, &update).await {
        Ok(_) => {
            // Everything that reads the session sees the new profile
            app_state.sessions.refresh(&session.token).await?;
            Ok(redirect_with("/user/dashboard", Notice::success("Profile updated successfully!")))
        }
        Err(e) => {
            tracing::warn!("[HANDLER] /user/dashboard - profile update failed: {}", e);
            Ok(redirect_with("/user/dashboard", Notice::error(e.user_message())))
        }
    }
}

/// A booking row as displayed in the tables.
pub struct BookingRow {
    pub id: String,
    pub car_name: String,
    pub car_brand: String,
    pub car_model: String,
    pub car_image: String,
    pub location: String,
    pub user_name: String,
    pub user_email: String,
    pub start: String,
    pub end: String,
    pub total_days: i64,
    pub total_price: f64,
    pub status: String,
    pub status_label: String,
    pub is_active: bool,
}

impl From<&Booking> for BookingRow {
    fn from(booking: &Booking) -> Self {
        BookingRow {
            id: booking.id.clone(),
            car_name: booking.car.name.clone(),
            car_brand: booking.car.brand.clone(),
            car_model: booking.car.model.clone(),
            car_image: booking.car.image.clone(),
            location: booking.car.location.clone(),
            user_name: booking.user.name.clone(),
            user_email: booking.user.email.clone(),
            start: display_date(&booking.start_date),
            end: display_date(&booking.end_date),
            total_days: booking.total_days,
            total_price: booking.total_price,
            status: booking.status.as_str().to_string(),
            status_label: booking.status.label().to_string(),
            is_active: booking.status == BookingStatus::Active,
        }
    }
}

#[derive(Template)]
#[template(path = "user_bookings.html")]
struct UserBookingsTemplate {
    nav: NavView,
    notice: Notice,
    bookings: Vec<BookingRow>,
    summary: BookingSummary,
    load_failed: bool,
}

pub async fn bookings(
    State(app_state): State<AppState>,
    session: Session,
    Query(query): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] /user/booking - user: {}", session.user.email);

    let mut notice = query.into_notice();
    let (bookings, load_failed) = match app_state.backend.bookings_for_user(&session.token).await {
        Ok(bookings) => (bookings, false),
        Err(e) => {
            tracing::error!("[HANDLER] /user/booking - failed to fetch bookings: {}", e);
            notice = Notice::error("An error occurred while fetching bookings");
            (Vec::new(), true)
        }
    };

    let template = UserBookingsTemplate {
        nav: NavView::from_session(Some(&session)),
        notice,
        summary: BookingSummary::from_bookings(&bookings),
        bookings: bookings.iter().map(BookingRow::from).collect(),
        load_failed,
    };
    render(&template, "user bookings")
}

pub async fn complete_booking(
    State(app_state): State<AppState>,
    session: Session,
    Path(booking_id): Path<String>,
) -> Redirect {
    match app_state.backend.complete_booking(&session.token, &booking_id).await {
        Ok(_) => redirect_with("/user/booking", Notice::success("Booking marked as completed")),
        Err(e) => {
            tracing::warn!("[HANDLER] complete booking {} failed: {}", booking_id, e);
            redirect_with("/user/booking", Notice::error("Failed to complete booking"))
        }
    }
}

pub async fn cancel_booking(
    State(app_state): State<AppState>,
    session: Session,
    Path(booking_id): Path<String>,
) -> Redirect {
    match app_state.backend.cancel_booking(&session.token, &booking_id).await {
        Ok(_) => redirect_with("/user/booking", Notice::success("Booking cancelled")),
        Err(e) => {
            tracing::warn!("[HANDLER] cancel booking {} failed: {}", booking_id, e);
            redirect_with("/user/booking", Notice::error("Failed to cancel booking"))
        }
    }
}
