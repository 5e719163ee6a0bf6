// Client for the rental backend REST API.
// Every response is wrapped in { success, message, data }.

use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{
    AdminAnalysis, ApiResponse, AvailabilityUpdate, Booking, Car, CarImage, CarPage,
    CreateBookingRequest, NewCar, ProfileUpdate, User,
};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend responded with {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("backend rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Text for the single notice shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Status { message, .. } | BackendError::Rejected(message) => message.clone(),
            BackendError::Transport(_) => "Could not reach the rental service".to_string(),
            BackendError::Decode(_) => "Unexpected response from the rental service".to_string(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

pub struct BackendClient {
    http: Arc<Client>,
    base_url: String,
}

impl BackendClient {
    pub fn new(http: Arc<Client>, base_url: impl Into<String>) -> Self {
        BackendClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // The session token is forwarded exactly as the backend issued it
    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header(AUTHORIZATION, token)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> BackendResult<ApiResponse<T>> {
        tracing::debug!("[BACKEND] {} - sending request", what);
        let response = request.send().await.map_err(|e| {
            tracing::error!("[BACKEND] {} - transport error: {}", what, e);
            BackendError::Transport(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiResponse<Value>>(&body)
                .ok()
                .map(|envelope| envelope.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
            tracing::warn!("[BACKEND] {} - status {}: {}", what, status, message);
            return Err(BackendError::Status { status, message });
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("[BACKEND] {} - malformed body: {}", what, e);
            BackendError::Decode(e.to_string())
        })?;

        if !envelope.success {
            tracing::warn!("[BACKEND] {} - rejected: {}", what, envelope.message);
            return Err(BackendError::Rejected(envelope.message));
        }

        tracing::info!("[BACKEND] {} - ok", what);
        Ok(envelope)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> BackendResult<T> {
        self.send::<T>(request, what)
            .await?
            .data
            .ok_or_else(|| BackendError::Decode(format!("{} returned no data", what)))
    }

    // For transitions whose payload we do not use; returns the backend message
    async fn acknowledge(&self, request: RequestBuilder, what: &str) -> BackendResult<String> {
        self.send::<Value>(request, what).await.map(|envelope| envelope.message)
    }

    // --- Cars ---

    pub async fn list_cars(&self) -> BackendResult<CarPage> {
        self.fetch(self.http.get(self.url("/car")), "GET /car").await
    }

    pub async fn get_car(&self, car_id: &str) -> BackendResult<Car> {
        let path = format!("/car/{}", car_id);
        self.fetch(self.http.get(self.url(&path)), &format!("GET {}", path)).await
    }

    pub async fn create_car(&self, token: &str, car: &NewCar, image: CarImage) -> BackendResult<Car> {
        let metadata = serde_json::to_string(car).map_err(|e| BackendError::Decode(e.to_string()))?;
        let mut file = Part::bytes(image.bytes).file_name(image.file_name);
        if let Some(content_type) = image.content_type.as_deref() {
            file = file.mime_str(content_type)?;
        }
        let form = Form::new().text("data", metadata).part("file", file);

        let request = self.authorized(self.http.post(self.url("/car")), token).multipart(form);
        self.fetch(request, "POST /car").await
    }

    pub async fn set_car_availability(&self, token: &str, car_id: &str, is_available: bool) -> BackendResult<String> {
        let path = format!("/car/update-available/{}", car_id);
        let request = self
            .authorized(self.http.patch(self.url(&path)), token)
            .json(&AvailabilityUpdate { is_available });
        self.acknowledge(request, &format!("PATCH {}", path)).await
    }

    pub async fn delete_car(&self, token: &str, car_id: &str) -> BackendResult<String> {
        let path = format!("/car/{}", car_id);
        let request = self.authorized(self.http.delete(self.url(&path)), token);
        self.acknowledge(request, &format!("DELETE {}", path)).await
    }

    // --- Bookings ---

    pub async fn create_booking(&self, token: &str, booking: &CreateBookingRequest) -> BackendResult<Booking> {
        let request = self
            .authorized(self.http.post(self.url("/booking")), token)
            .json(booking);
        self.fetch(request, "POST /booking").await
    }

    pub async fn bookings_for_user(&self, token: &str) -> BackendResult<Vec<Booking>> {
        let request = self.authorized(self.http.get(self.url("/booking/user")), token);
        self.fetch(request, "GET /booking/user").await
    }

    pub async fn all_bookings(&self, token: &str) -> BackendResult<Vec<Booking>> {
        let request = self.authorized(self.http.get(self.url("/booking")), token);
        self.fetch(request, "GET /booking").await
    }

    pub async fn complete_booking(&self, token: &str, booking_id: &str) -> BackendResult<String> {
        let path = format!("/booking/complete/{}", booking_id);
        let request = self.authorized(self.http.post(self.url(&path)), token);
        self.acknowledge(request, &format!("POST {}", path)).await
    }

    pub async fn cancel_booking(&self, token: &str, booking_id: &str) -> BackendResult<String> {
        let path = format!("/booking/{}", booking_id);
        let request = self.authorized(self.http.delete(self.url(&path)), token);
        self.acknowledge(request, &format!("DELETE {}", path)).await
    }

    // --- Users & analysis ---

    pub async fn current_user(&self, token: &str) -> BackendResult<User> {
        let request = self.authorized(self.http.get(self.url("/user/me")), token);
        self.fetch(request, "GET /user/me").await
    }

    pub async fn update_current_user(&self, token: &str, update: &ProfileUpdate) -> BackendResult<User> {
        let request = self
            .authorized(self.http.patch(self.url("/user/me")), token)
            .json(update);
        self.fetch(request, "PATCH /user/me").await
    }

    pub async fn admin_analysis(&self, token: &str) -> BackendResult<AdminAnalysis> {
        let request = self.authorized(self.http.get(self.url("/analysis/admin")), token);
        self.fetch(request, "GET /analysis/admin").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, Category, FuelType};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BackendClient {
        BackendClient::new(Arc::new(Client::new()), server.uri())
    }

    fn car_json(id: &str, name: &str) -> Value {
        json!({
            "_id": id, "name": name, "brand": "Tesla", "model": "Model 3", "year": 2023,
            "color": "White", "category": "electric", "fuelType": "electric", "seats": 5,
            "features": [], "image": "", "mileage": 0, "isAvailable": true,
            "location": "Gulshan", "isDeleted": false
        })
    }

    #[tokio::test]
    async fn list_cars_unwraps_envelope_and_meta() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/car"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Cars retrieved",
                "data": {
                    "result": [car_json("c1", "Tesla Model 3"), car_json("c2", "Tesla Model Y")],
                    "meta": {"totalData": 2, "page": 1, "limit": 10, "totalPage": 1}
                }
            })))
            .mount(&server)
            .await;

        let page = client_for(&server).list_cars().await.unwrap();
        assert_eq!(page.result.len(), 2);
        assert_eq!(page.result[1].name, "Tesla Model Y");
        assert_eq!(page.result[0].category, Category::Electric);
        assert_eq!(page.meta.total_data, 2);
    }

    #[tokio::test]
    async fn authorized_calls_forward_token_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/booking"))
            .and(header("authorization", "token-123"))
            .and(body_json(json!({"car": "c1", "startDate": "2025-01-01", "endDate": "2025-01-04"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true,
                "message": "Booking created",
                "data": {
                    "_id": "b1", "user": {"_id": "u1"}, "car": {"_id": "c1"},
                    "startDate": "2025-01-01", "endDate": "2025-01-04",
                    "totalDays": 3, "totalPrice": 9000, "status": "active"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let booking = client_for(&server)
            .create_booking(
                "token-123",
                &CreateBookingRequest {
                    car: "c1".into(),
                    start_date: "2025-01-01".into(),
                    end_date: "2025-01-04".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(booking.total_days, 3);
        assert_eq!(booking.status, BookingStatus::Active);
    }

    #[tokio::test]
    async fn error_status_carries_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/booking/b9"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "success": false, "message": "Booking not found", "data": null
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).cancel_booking("t", "b9").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.user_message(), "Booking not found");
    }

    #[tokio::test]
    async fn unsuccessful_envelope_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/car/update-available/c1"))
            .and(body_json(json!({"isAvailable": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false, "message": "Car is booked", "data": null
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .set_car_availability("t", "c1", false)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(ref m) if m == "Car is booked"));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/car/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_car("c1").await.unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
        assert_eq!(err.user_message(), "Unexpected response from the rental service");
    }

    #[tokio::test]
    async fn create_car_sends_multipart_without_price() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/car"))
            .and(header("authorization", "admin-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "success": true, "message": "Car created", "data": car_json("c3", "Tesla Model S")
            })))
            .expect(1)
            .mount(&server)
            .await;

        let new_car = NewCar {
            name: "Tesla Model S".into(),
            brand: "Tesla".into(),
            model: "Model S".into(),
            year: 2024,
            color: "Red".into(),
            category: Category::Electric,
            fuel_type: FuelType::Electric,
            seats: 5,
            features: vec!["Autopilot".into()],
            mileage: 0.0,
            location: "Gulshan".into(),
            is_available: true,
            is_deleted: false,
        };
        let image = CarImage {
            file_name: "car.jpg".into(),
            content_type: Some("image/jpeg".into()),
            bytes: vec![0xFF, 0xD8, 0xFF],
        };

        let created = client_for(&server).create_car("admin-token", &new_car, image).await.unwrap();
        assert_eq!(created.id, "c3");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(body.contains("name=\"data\""));
        assert!(body.contains("name=\"file\"; filename=\"car.jpg\""));
        assert!(body.contains("\"fuelType\":\"electric\""));
        assert!(!body.contains("price"));
    }
}
