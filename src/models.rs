// Records exchanged with the rental backend and the forms posted by the pages.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use validator::Validate;

// --- Enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sports,
    Luxury,
    Suv,
    Sedan,
    Electric,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Luxury,
        Category::Sports,
        Category::Suv,
        Category::Sedan,
        Category::Electric,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sports => "sports",
            Category::Luxury => "luxury",
            Category::Suv => "suv",
            Category::Sedan => "sedan",
            Category::Electric => "electric",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Sports => "Sports",
            Category::Luxury => "Luxury",
            Category::Suv => "SUV",
            Category::Sedan => "Sedan",
            Category::Electric => "Electric",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Electric,
    Petrol,
    Diesel,
    Hybrid,
}

impl FuelType {
    pub const ALL: [FuelType; 4] = [
        FuelType::Electric,
        FuelType::Petrol,
        FuelType::Diesel,
        FuelType::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::Electric => "electric",
            FuelType::Petrol => "petrol",
            FuelType::Diesel => "diesel",
            FuelType::Hybrid => "hybrid",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FuelType::Electric => "Electric",
            FuelType::Petrol => "Petrol",
            FuelType::Diesel => "Diesel",
            FuelType::Hybrid => "Hybrid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for FuelType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FuelType::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Active => "Active",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

// --- Backend envelope ---

// Every backend response: { success, message, data }
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_data: u64,
    pub page: u64,
    pub limit: u64,
    pub total_page: u64,
}

// Decodes each record on its own; records this client cannot represent
// (e.g. a category it does not know) are logged and skipped.
fn skip_undecodable<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| {
            let id = value.get("_id").and_then(|id| id.as_str()).unwrap_or("?").to_string();
            match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping record {} that failed to decode: {}", id, e);
                    None
                }
            }
        })
        .collect())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarPage {
    #[serde(deserialize_with = "skip_undecodable")]
    pub result: Vec<Car>,
    #[serde(default)]
    pub meta: PageMeta,
}

// --- Cars ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    #[serde(default)]
    pub color: String,
    pub category: Category,
    pub fuel_type: FuelType,
    pub seats: u32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub mileage: f64,
    pub is_available: bool,
    pub location: String,
    #[serde(default)]
    pub is_deleted: bool,
    // Computed by the backend from the category; never sent by us
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_day: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// Metadata part of the multipart POST /car
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCar {
    pub name: String,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub category: Category,
    pub fuel_type: FuelType,
    pub seats: u32,
    pub features: Vec<String>,
    pub mileage: f64,
    pub location: String,
    pub is_available: bool,
    pub is_deleted: bool,
}

#[derive(Debug, Clone)]
pub struct CarImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityUpdate {
    pub is_available: bool,
}

// --- Bookings ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub car: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub profile_image: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingCar {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user: BookingUser,
    #[serde(default)]
    pub car: BookingCar,
    pub start_date: String,
    pub end_date: String,
    pub total_days: i64,
    pub total_price: f64,
    pub status: BookingStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

// --- Users ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    pub role: Role,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub profile_image: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

// Profile form posted from /user/dashboard and forwarded as PATCH /user/me
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Please enter a valid email address")
    )]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

impl ProfileUpdate {
    pub fn trimmed(self) -> Self {
        ProfileUpdate {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
        }
    }
}

// --- Admin analysis ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    #[serde(rename = "_id")]
    pub status: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityCount {
    #[serde(rename = "_id")]
    pub available: bool,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    #[serde(rename = "_id")]
    pub period: YearMonth,
    pub revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MostRentedCar {
    #[serde(rename = "_id")]
    pub id: String,
    pub total_bookings: u64,
    pub car: BookingCar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAnalysis {
    pub total_users: u64,
    pub total_cars: u64,
    pub total_bookings: u64,
    #[serde(default)]
    pub booking_status: Vec<StatusCount>,
    #[serde(default)]
    pub most_rented_car: Option<MostRentedCar>,
    // Most recent month first
    #[serde(default)]
    pub monthly_revenue: Vec<MonthlyRevenue>,
    #[serde(default)]
    pub car_availability: Vec<AvailabilityCount>,
}

impl AdminAnalysis {
    pub fn status_count(&self, status: BookingStatus) -> u64 {
        self.booking_status
            .iter()
            .find(|s| s.status == status.as_str())
            .map_or(0, |s| s.count)
    }

    pub fn available_cars(&self) -> u64 {
        self.availability_count(true)
    }

    pub fn unavailable_cars(&self) -> u64 {
        self.availability_count(false)
    }

    fn availability_count(&self, available: bool) -> u64 {
        self.car_availability
            .iter()
            .find(|a| a.available == available)
            .map_or(0, |a| a.count)
    }

    pub fn current_revenue(&self) -> f64 {
        self.monthly_revenue.first().map_or(0.0, |m| m.revenue)
    }

    // Share of the fleet, 0 when there are no cars
    pub fn percent_of_fleet(&self, count: u64) -> u64 {
        if self.total_cars == 0 {
            return 0;
        }
        ((count as f64 / self.total_cars as f64) * 100.0).round() as u64
    }
}

// --- Forms ---

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingForm {
    pub start_date: String,
    pub end_date: String,
}
