// Admin panel: analysis dashboard, fleet management and all bookings

use askama::Template;
use axum::{
    extract::{Form, Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Redirect},
};
use chrono::Datelike;
use serde::Deserialize;
use std::collections::HashMap;
use validator::Validate;

use super::{car_views, redirect_with, render, user::BookingRow, CarView, NavView, Notice, NoticeQuery};
use crate::{
    auth_middleware::AdminSession,
    booking::display_date,
    error::AppError,
    models::{AdminAnalysis, BookingStatus, CarImage, Category, FuelType, NewCar, User},
    AppState,
};

const MANAGE_CARS: &str = "/admin/manage_car";

// --- Dashboard ---

pub struct MostRentedView {
    pub name: String,
    pub brand: String,
    pub model: String,
    pub image: String,
    pub total_bookings: u64,
}

pub struct AnalysisView {
    pub total_users: u64,
    pub total_cars: u64,
    pub total_bookings: u64,
    pub active: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub available: u64,
    pub unavailable: u64,
    pub available_percent: u64,
    pub unavailable_percent: u64,
    pub current_revenue: f64,
    pub has_most_rented: bool,
    pub most_rented: MostRentedView,
}

impl From<&AdminAnalysis> for AnalysisView {
    fn from(analysis: &AdminAnalysis) -> Self {
        let most_rented = analysis.most_rented_car.as_ref();
        AnalysisView {
            total_users: analysis.total_users,
            total_cars: analysis.total_cars,
            total_bookings: analysis.total_bookings,
            active: analysis.status_count(BookingStatus::Active),
            completed: analysis.status_count(BookingStatus::Completed),
            cancelled: analysis.status_count(BookingStatus::Cancelled),
            available: analysis.available_cars(),
            unavailable: analysis.unavailable_cars(),
            available_percent: analysis.percent_of_fleet(analysis.available_cars()),
            unavailable_percent: analysis.percent_of_fleet(analysis.unavailable_cars()),
            current_revenue: analysis.current_revenue(),
            has_most_rented: most_rented.is_some(),
            most_rented: MostRentedView {
                name: most_rented.map(|m| m.car.name.clone()).unwrap_or_default(),
                brand: most_rented.map(|m| m.car.brand.clone()).unwrap_or_default(),
                model: most_rented.map(|m| m.car.model.clone()).unwrap_or_default(),
                image: most_rented.map(|m| m.car.image.clone()).unwrap_or_default(),
                total_bookings: most_rented.map_or(0, |m| m.total_bookings),
            },
        }
    }
}

#[derive(Template)]
#[template(path = "admin_dashboard.html")]
struct AdminDashboardTemplate {
    nav: NavView,
    notice: Notice,
    admin: User,
    member_since: String,
    analysis: AnalysisView,
}

pub async fn dashboard(
    State(app_state): State<AppState>,
    AdminSession(session): AdminSession,
    Query(query): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("[HANDLER] /admin/dashboard - admin: {}", session.user.email);

    // Analysis and a fresh profile are independent; fetch both at once
    let (analysis, profile) = futures::join!(
        app_state.backend.admin_analysis(&session.token),
        app_state.sessions.refresh(&session.token)
    );
    let analysis = analysis?;
    let admin = profile?;

    let template = AdminDashboardTemplate {
        nav: NavView::from_session(Some(&session)),
        notice: query.into_notice(),
        member_since: admin.created_at.as_deref().map(display_date).unwrap_or_default(),
        admin,
        analysis: AnalysisView::from(&analysis),
    };
    render(&template, "admin dashboard")
}

// --- Fleet management ---

pub struct ChoiceView {
    pub value: String,
    pub label: String,
}

#[derive(Template)]
#[template(path = "admin_cars.html")]
struct ManageCarsTemplate {
    nav: NavView,
    notice: Notice,
    cars: Vec<CarView>,
    categories: Vec<ChoiceView>,
    fuel_types: Vec<ChoiceView>,
    current_year: i32,
}

pub async fn manage_cars(
    State(app_state): State<AppState>,
    AdminSession(session): AdminSession,
    Query(query): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut notice = query.into_notice();
    let cars = match app_state.backend.list_cars().await {
        Ok(page) => page.result,
        Err(e) => {
            tracing::error!("[HANDLER] /admin/manage_car - failed to load cars: {}", e);
            notice = Notice::error("Failed to load cars");
            Vec::new()
        }
    };

    let template = ManageCarsTemplate {
        nav: NavView::from_session(Some(&session)),
        notice,
        cars: car_views(&cars),
        categories: Category::ALL
            .iter()
            .map(|c| ChoiceView { value: c.as_str().into(), label: c.label().into() })
            .collect(),
        fuel_types: FuelType::ALL
            .iter()
            .map(|f| ChoiceView { value: f.as_str().into(), label: f.label().into() })
            .collect(),
        current_year: chrono::Utc::now().year(),
    };
    render(&template, "manage cars")
}

// Text fields of the "Add car" form, validated before anything is uploaded
#[derive(Debug, Validate)]
pub struct CarForm {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Brand is required"))]
    pub brand: String,
    #[validate(length(min = 1, message = "Model is required"))]
    pub model: String,
    #[validate(range(min = 1886, message = "Year must be 1886 or later"))]
    pub year: i32,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
    pub category: Category,
    pub fuel_type: FuelType,
    #[validate(range(min = 1, max = 50, message = "Seats must be between 1 and 50"))]
    pub seats: u32,
    pub features: String,
    #[validate(range(min = 0.0, message = "Mileage cannot be negative"))]
    pub mileage: f64,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
}

const CAR_FORM_FIELDS: [&str; 9] = ["name", "brand", "model", "year", "color", "seats", "mileage", "location", "features"];

impl CarForm {
    fn from_fields(fields: &HashMap<String, String>) -> Result<Self, String> {
        let text = |key: &str| fields.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        fn number<T: std::str::FromStr>(raw: String, label: &str) -> Result<T, String> {
            raw.parse().map_err(|_| format!("{} must be a number", label))
        }

        Ok(CarForm {
            name: text("name"),
            brand: text("brand"),
            model: text("model"),
            year: number(text("year"), "Year")?,
            color: text("color"),
            category: text("category").parse().map_err(|_| "Please choose a category".to_string())?,
            fuel_type: text("fuelType").parse().map_err(|_| "Please choose a fuel type".to_string())?,
            seats: number(text("seats"), "Seats")?,
            features: text("features"),
            mileage: number(text("mileage"), "Mileage")?,
            location: text("location"),
        })
    }

    // Field rules first, in form order, then the year ceiling which moves with the clock
    fn check(&self) -> Result<(), String> {
        if let Err(errors) = self.validate() {
            let by_field = errors.field_errors();
            return Err(CAR_FORM_FIELDS
                .iter()
                .filter_map(|field| by_field.get(*field))
                .flat_map(|errs| errs.iter())
                .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "Please check the car details".to_string()));
        }
        if self.year > chrono::Utc::now().year() + 1 {
            return Err("Year cannot be later than next year".to_string());
        }
        Ok(())
    }

    // New cars start available; the backend attaches the price
    fn into_new_car(self) -> NewCar {
        NewCar {
            features: self
                .features
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
            name: self.name,
            brand: self.brand,
            model: self.model,
            year: self.year,
            color: self.color,
            category: self.category,
            fuel_type: self.fuel_type,
            seats: self.seats,
            mileage: self.mileage,
            location: self.location,
            is_available: true,
            is_deleted: false,
        }
    }
}

async fn read_car_upload(mut multipart: Multipart) -> Result<(HashMap<String, String>, Option<CarImage>), AppError> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(|c| c.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid image upload: {}", e)))?;
            if !file_name.is_empty() && !bytes.is_empty() {
                image = Some(CarImage { file_name, content_type, bytes: bytes.to_vec() });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid form field {}: {}", name, e)))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, image))
}

pub async fn create_car(
    State(app_state): State<AppState>,
    AdminSession(session): AdminSession,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let (fields, image) = read_car_upload(multipart).await?;

    let Some(image) = image else {
        return Ok(redirect_with(MANAGE_CARS, Notice::error("Please upload a car image")));
    };

    let form = match CarForm::from_fields(&fields) {
        Ok(form) => form,
        Err(message) => return Ok(redirect_with(MANAGE_CARS, Notice::error(message))),
    };
    if let Err(message) = form.check() {
        return Ok(redirect_with(MANAGE_CARS, Notice::error(message)));
    }

    let new_car = form.into_new_car();
    tracing::info!("[HANDLER] /admin/manage_car - adding {} ({})", new_car.name, image.file_name);
    match app_state.backend.create_car(&session.token, &new_car, image).await {
        Ok(car) => {
            app_state.catalog.invalidate().await;
            tracing::info!("[HANDLER] /admin/manage_car - car {} created", car.id);
            Ok(redirect_with(MANAGE_CARS, Notice::success("Car added successfully")))
        }
        Err(e) => Ok(redirect_with(MANAGE_CARS, Notice::error(e.user_message()))),
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityForm {
    // Availability as currently displayed; the request flips it
    current: bool,
}

pub async fn toggle_availability(
    State(app_state): State<AppState>,
    AdminSession(session): AdminSession,
    Path(car_id): Path<String>,
    Form(form): Form<AvailabilityForm>,
) -> Redirect {
    match app_state.backend.set_car_availability(&session.token, &car_id, !form.current).await {
        Ok(_) => {
            app_state.catalog.invalidate().await;
            redirect_with(MANAGE_CARS, Notice::success("Status updated"))
        }
        Err(e) => {
            tracing::warn!("[HANDLER] availability of {} not updated: {}", car_id, e);
            redirect_with(MANAGE_CARS, Notice::error("Failed to update status"))
        }
    }
}

pub async fn delete_car(
    State(app_state): State<AppState>,
    AdminSession(session): AdminSession,
    Path(car_id): Path<String>,
) -> Redirect {
    match app_state.backend.delete_car(&session.token, &car_id).await {
        Ok(_) => {
            app_state.catalog.invalidate().await;
            redirect_with(MANAGE_CARS, Notice::success("Car deleted successfully"))
        }
        Err(e) => {
            tracing::warn!("[HANDLER] car {} not deleted: {}", car_id, e);
            redirect_with(MANAGE_CARS, Notice::error("Failed to delete car"))
        }
    }
}

// --- Bookings ---

#[derive(Template)]
#[template(path = "admin_bookings.html")]
struct ManageBookingsTemplate {
    nav: NavView,
    notice: Notice,
    bookings: Vec<BookingRow>,
}

pub async fn manage_bookings(
    State(app_state): State<AppState>,
    AdminSession(session): AdminSession,
    Query(query): Query<NoticeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut notice = query.into_notice();
    let bookings = match app_state.backend.all_bookings(&session.token).await {
        Ok(bookings) => bookings,
        Err(e) => {
            tracing::error!("[HANDLER] /admin/manage_booking - failed to load bookings: {}", e);
            notice = Notice::error("Failed to load bookings");
            Vec::new()
        }
    };

    let template = ManageBookingsTemplate {
        nav: NavView::from_session(Some(&session)),
        notice,
        bookings: bookings.iter().map(BookingRow::from).collect(),
    };
    render(&template, "manage bookings")
}

fn bookings_csv(rows: &[BookingRow]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Booking", "Customer", "Email", "Car", "Location", "Start", "End", "Days", "Total", "Status",
    ])?;
    for row in rows {
        writer.write_record([
            row.id.as_str(),
            row.user_name.as_str(),
            row.user_email.as_str(),
            row.car_name.as_str(),
            row.location.as_str(),
            row.start.as_str(),
            row.end.as_str(),
            &row.total_days.to_string(),
            &row.total_price.to_string(),
            row.status.as_str(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to finish CSV export: {}", e))
}

pub async fn export_bookings(
    State(app_state): State<AppState>,
    AdminSession(session): AdminSession,
) -> Result<impl IntoResponse, AppError> {
    let bookings = app_state.backend.all_bookings(&session.token).await?;
    let rows: Vec<BookingRow> = bookings.iter().map(BookingRow::from).collect();
    let body = bookings_csv(&rows)?;

    tracing::info!("[HANDLER] booking export: {} rows for {}", rows.len(), session.user.email);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"bookings.csv\""),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_router;
    use axum::{body::Body, http::{Request, StatusCode}};
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn admin_backend() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/user/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "message": "ok",
                "data": {"_id": "a1", "name": "Admin", "email": "admin@example.com", "role": "admin",
                         "createdAt": "2025-06-01T10:00:00.000Z"}
            })))
            .mount(&server)
            .await;
        server
    }

    fn admin_request(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("cookie", "accessToken=admin-tok")
    }

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn valid_fields() -> HashMap<String, String> {
        fields(&[
            ("name", "Toyota Prius"),
            ("brand", "Toyota"),
            ("model", "Prius"),
            ("year", "2022"),
            ("color", "White"),
            ("category", "sedan"),
            ("fuelType", "hybrid"),
            ("seats", "5"),
            ("features", "Bluetooth, , Cruise Control "),
            ("mileage", "20"),
            ("location", "Uttara"),
        ])
    }

    #[test]
    fn car_form_builds_new_car_with_split_features() {
        let form = CarForm::from_fields(&valid_fields()).unwrap();
        assert!(form.check().is_ok());
        let car = form.into_new_car();
        assert_eq!(car.features, vec!["Bluetooth", "Cruise Control"]);
        assert!(car.is_available);
        assert_eq!(car.category, Category::Sedan);
    }

    #[test]
    fn car_form_rejects_out_of_range_values() {
        let mut raw = valid_fields();
        raw.insert("seats".into(), "0".into());
        assert_eq!(
            CarForm::from_fields(&raw).unwrap().check().unwrap_err(),
            "Seats must be between 1 and 50"
        );

        let mut raw = valid_fields();
        raw.insert("year".into(), (chrono::Utc::now().year() + 2).to_string());
        assert_eq!(
            CarForm::from_fields(&raw).unwrap().check().unwrap_err(),
            "Year cannot be later than next year"
        );

        let mut raw = valid_fields();
        raw.insert("category".into(), "van".into());
        assert_eq!(CarForm::from_fields(&raw).unwrap_err(), "Please choose a category");
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let booking: crate::models::Booking = serde_json::from_value(json!({
            "_id": "b1", "user": {"_id": "u1", "name": "Rahim", "email": "rahim@example.com"},
            "car": {"_id": "c1", "name": "BMW 5 Series", "location": "Banani"},
            "startDate": "2025-01-01", "endDate": "2025-01-03",
            "totalDays": 2, "totalPrice": 4000, "status": "cancelled"
        }))
        .unwrap();
        let csv = String::from_utf8(bookings_csv(&[BookingRow::from(&booking)]).unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "Booking,Customer,Email,Car,Location,Start,End,Days,Total,Status");
        assert_eq!(
            lines.next().unwrap(),
            "b1,Rahim,rahim@example.com,BMW 5 Series,Banani,\"Jan 01, 2025\",\"Jan 03, 2025\",2,4000,cancelled"
        );
    }

    #[tokio::test]
    async fn dashboard_renders_analysis() {
        let server = admin_backend().await;
        Mock::given(method("GET"))
            .and(path("/analysis/admin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "message": "ok",
                "data": {
                    "totalUsers": 42, "totalCars": 4, "totalBookings": 7,
                    "bookingStatus": [{"_id": "active", "count": 5}],
                    "mostRentedCar": {"_id": "c1", "totalBookings": 4,
                                      "car": {"_id": "c1", "name": "Porsche 911", "brand": "Porsche", "model": "911"}},
                    "monthlyRevenue": [{"_id": {"year": 2025, "month": 12}, "revenue": 12500}],
                    "carAvailability": [{"_id": true, "count": 3}, {"_id": false, "count": 1}]
                }
            })))
            .mount(&server)
            .await;

        let response = create_router(crate::test_state(&server.uri()))
            .oneshot(admin_request("GET", "/admin/dashboard").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Total Users"));
        assert!(html.contains("42"));
        assert!(html.contains("3/4"));
        assert!(html.contains("75%"));
        assert!(html.contains("Porsche 911"));
    }

    #[tokio::test]
    async fn toggle_flips_current_availability() {
        let server = admin_backend().await;
        Mock::given(method("PATCH"))
            .and(path("/car/update-available/c1"))
            .and(body_json(json!({"isAvailable": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "message": "updated", "data": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = create_router(crate::test_state(&server.uri()))
            .oneshot(
                admin_request("POST", "/admin/manage_car/c1/availability")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("current=true"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/admin/manage_car?notice=Status+updated");
    }

    #[tokio::test]
    async fn upload_without_image_is_refused() {
        let server = admin_backend().await;
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nToyota Prius\r\n--{b}--\r\n",
            b = boundary
        );

        let response = create_router(crate::test_state(&server.uri()))
            .oneshot(
                admin_request("POST", "/admin/manage_car")
                    .header("content-type", format!("multipart/form-data; boundary={}", boundary))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["location"],
            "/admin/manage_car?error=Please+upload+a+car+image"
        );
    }

    #[tokio::test]
    async fn export_is_csv_attachment() {
        let server = admin_backend().await;
        Mock::given(method("GET"))
            .and(path("/booking"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "message": "ok", "data": []
            })))
            .mount(&server)
            .await;

        let response = create_router(crate::test_state(&server.uri()))
            .oneshot(admin_request("GET", "/admin/manage_booking/export.csv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/csv; charset=utf-8");
    }
}
