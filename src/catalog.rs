// Car catalog: the storefront filter pipeline and the cached car list it runs over.

use cached::{Cached, TimedCache};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{str::FromStr, sync::Arc};
use tokio::sync::Mutex;

use crate::backend::{BackendClient, BackendError};
use crate::models::{Car, Category, FuelType};

pub const ALL: &str = "all";

// Location labels offered by the storefront filter
pub const LOCATIONS: [&str; 4] = ["Gulshan", "Banani", "Dhanmondi", "Uttara"];

const FEATURED_LIMIT: usize = 3;

/// A filter selector: either the `all` sentinel or one exact value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector<T> {
    All,
    Only(T),
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Selector::All
    }
}

impl<T: PartialEq> Selector<T> {
    /// `All` accepts every value.
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(wanted) => wanted == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }
}

impl<T: FromStr> FromStr for Selector<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == ALL {
            return Ok(Selector::All);
        }
        s.parse().map(Selector::Only)
    }
}

impl<'de, T> Deserialize<'de> for Selector<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl<T: ToString> Serialize for Selector<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Selector::All => serializer.serialize_str(ALL),
            Selector::Only(value) => serializer.serialize_str(&value.to_string()),
        }
    }
}

/// Storefront filter state. Lives in the query string of `/` and `/api/cars`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub search: String,
    pub category: Selector<Category>,
    pub fuel_type: Selector<FuelType>,
    pub location: Selector<String>,
}

impl FilterCriteria {
    /// Every field at its sentinel.
    pub fn cleared() -> Self {
        FilterCriteria::default()
    }

    pub fn is_cleared(&self) -> bool {
        self.active_count() == 0
    }

    /// Number of fields not at their sentinel, shown as "N Active".
    pub fn active_count(&self) -> usize {
        [
            !self.search.is_empty(),
            !self.category.is_all(),
            !self.fuel_type.is_all(),
            !self.location.is_all(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    pub fn matches(&self, car: &Car) -> bool {
        self.matches_search(car)
            && self.category.accepts(&car.category)
            && self.fuel_type.accepts(&car.fuel_type)
            && self.location.accepts(&car.location)
    }

    fn matches_search(&self, car: &Car) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        car.name.to_lowercase().contains(&needle) || car.brand.to_lowercase().contains(&needle)
    }
}

/// Stable filter: keeps the cars matching every active criterion, in input order.
pub fn filter_cars(cars: &[Car], criteria: &FilterCriteria) -> Vec<Car> {
    cars.iter().filter(|car| criteria.matches(car)).cloned().collect()
}

pub fn available_count(cars: &[Car]) -> usize {
    cars.iter().filter(|car| car.is_available).count()
}

/// First few available cars, in catalog order.
pub fn featured_cars(cars: &[Car]) -> Vec<Car> {
    cars.iter()
        .filter(|car| car.is_available)
        .take(FEATURED_LIMIT)
        .cloned()
        .collect()
}

// --- Catalog store ---

const CATALOG_KEY: &str = "cars";

/// Source of the storefront car list: the built-in sample fleet, or the
/// backend list kept for a short time-to-live.
pub struct Catalog {
    backend: Arc<BackendClient>,
    sample_only: bool,
    cache: Mutex<TimedCache<&'static str, Arc<Vec<Car>>>>,
}

impl Catalog {
    pub fn new(backend: Arc<BackendClient>, ttl_secs: u64, sample_only: bool) -> Self {
        Catalog {
            backend,
            sample_only,
            cache: Mutex::new(TimedCache::with_lifespan(ttl_secs)),
        }
    }

    pub async fn cars(&self) -> Result<Arc<Vec<Car>>, BackendError> {
        if self.sample_only {
            return Ok(Arc::new(SAMPLE_CARS.clone()));
        }

        let mut cache = self.cache.lock().await;
        if let Some(cars) = cache.cache_get(&CATALOG_KEY) {
            tracing::debug!("Using cached catalog ({} cars).", cars.len());
            return Ok(cars.clone());
        }

        let page = self.backend.list_cars().await?;
        let cars = Arc::new(page.result);
        tracing::info!("Catalog refreshed from backend: {} cars.", cars.len());
        cache.cache_set(CATALOG_KEY, cars.clone());
        Ok(cars)
    }

    /// Drops the cached list; the next read goes to the backend.
    pub async fn invalidate(&self) {
        self.cache.lock().await.cache_remove(&CATALOG_KEY);
        tracing::debug!("Catalog cache invalidated.");
    }
}

// --- Sample fleet ---

fn sample_car(
    id: &str,
    (name, brand, model): (&str, &str, &str),
    year: i32,
    color: &str,
    category: Category,
    fuel_type: FuelType,
    seats: u32,
    features: [&str; 3],
    image: &str,
    mileage: f64,
    is_available: bool,
    location: &str,
) -> Car {
    Car {
        id: id.to_string(),
        name: name.to_string(),
        brand: brand.to_string(),
        model: model.to_string(),
        year,
        color: color.to_string(),
        category,
        fuel_type,
        seats,
        features: features.iter().map(|f| f.to_string()).collect(),
        image: image.to_string(),
        mileage,
        is_available,
        location: location.to_string(),
        is_deleted: false,
        price_per_day: None,
        created_at: Some("2025-12-18T19:02:29.485Z".to_string()),
        updated_at: Some("2025-12-18T19:02:29.485Z".to_string()),
    }
}

pub static SAMPLE_CARS: Lazy<Vec<Car>> = Lazy::new(|| {
    vec![
        sample_car(
            "6944503606062a206341f663",
            ("Tesla Model 3", "Tesla", "Model 3"),
            2023,
            "White",
            Category::Sports,
            FuelType::Electric,
            5,
            ["Autopilot", "Touch Display", "Fast Charging"],
            "https://res.cloudinary.com/dzrsna1zx/image/upload/v1766084661/sjs9gapl2w-1766084660888-car7.jfif.jpg",
            0.0,
            true,
            "Gulshan",
        ),
        sample_car(
            "69444fc506062a206341f660",
            ("BMW 5 Series", "BMW", "530i"),
            2023,
            "Black",
            Category::Luxury,
            FuelType::Petrol,
            5,
            ["Leather Seats", "Sunroof", "Navigation"],
            "https://res.cloudinary.com/dzrsna1zx/image/upload/v1766084549/vjcy3toyt6-1766084548085-images.jfif.jpg",
            12.0,
            true,
            "Banani",
        ),
        sample_car(
            "69444fc506062a206341f661",
            ("Mercedes-Benz S-Class", "Mercedes-Benz", "S500"),
            2024,
            "Silver",
            Category::Luxury,
            FuelType::Hybrid,
            5,
            ["Massage Seats", "Panoramic Roof", "Ambient Lighting"],
            "https://images.unsplash.com/photo-1617531653332-bd46c24f2068?w=800",
            5.0,
            true,
            "Gulshan",
        ),
        sample_car(
            "69444fc506062a206341f662",
            ("Porsche 911", "Porsche", "911 Carrera"),
            2024,
            "Red",
            Category::Sports,
            FuelType::Petrol,
            4,
            ["Sport Exhaust", "Sport Chrono", "PASM"],
            "https://images.unsplash.com/photo-1503376780353-7e6692767b70?w=800",
            8.0,
            true,
            "Banani",
        ),
        sample_car(
            "69444fc506062a206341f664",
            ("Audi e-tron GT", "Audi", "e-tron GT"),
            2024,
            "Blue",
            Category::Electric,
            FuelType::Electric,
            5,
            ["Matrix LED", "Virtual Cockpit", "Air Suspension"],
            "https://images.unsplash.com/photo-1606664515524-ed2f786a0bd6?w=800",
            0.0,
            true,
            "Dhanmondi",
        ),
        sample_car(
            "69444fc506062a206341f665",
            ("Range Rover Sport", "Land Rover", "Sport"),
            2023,
            "Gray",
            Category::Suv,
            FuelType::Diesel,
            7,
            ["Terrain Response", "Meridian Audio", "Adaptive Cruise"],
            "https://images.unsplash.com/photo-1519641471654-76ce0107ad1b?w=800",
            15.0,
            false,
            "Uttara",
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    fn tesla_and_bmw() -> Vec<Car> {
        SAMPLE_CARS[..2].to_vec()
    }

    fn criteria(search: &str, category: &str, fuel_type: &str, location: &str) -> FilterCriteria {
        FilterCriteria {
            search: search.to_string(),
            category: category.parse().unwrap(),
            fuel_type: fuel_type.parse().unwrap(),
            location: location.parse().unwrap(),
        }
    }

    fn names(cars: &[Car]) -> Vec<&str> {
        cars.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn cleared_criteria_return_input_unchanged() {
        let cars = SAMPLE_CARS.clone();
        assert_eq!(filter_cars(&cars, &FilterCriteria::cleared()), cars);
        assert!(filter_cars(&[], &FilterCriteria::cleared()).is_empty());
    }

    #[test]
    fn fuel_type_filter_selects_electric() {
        let result = filter_cars(&tesla_and_bmw(), &criteria("", "all", "electric", "all"));
        assert_eq!(names(&result), vec!["Tesla Model 3"]);
    }

    #[test]
    fn search_is_case_insensitive_on_brand() {
        let result = filter_cars(&tesla_and_bmw(), &criteria("bmw", "all", "all", "all"));
        assert_eq!(names(&result), vec!["BMW 5 Series"]);
    }

    #[test]
    fn search_matches_name_substring() {
        let result = filter_cars(&SAMPLE_CARS, &criteria("SPORT", "all", "all", "all"));
        assert_eq!(names(&result), vec!["Range Rover Sport"]);
    }

    #[test]
    fn location_is_case_sensitive() {
        assert_eq!(
            names(&filter_cars(&SAMPLE_CARS, &criteria("", "all", "all", "Gulshan"))),
            vec!["Tesla Model 3", "Mercedes-Benz S-Class"]
        );
        assert!(filter_cars(&SAMPLE_CARS, &criteria("", "all", "all", "gulshan")).is_empty());
    }

    #[test]
    fn criteria_are_conjunctive() {
        let all = SAMPLE_CARS.clone();
        let k = criteria("e", "luxury", "all", "Gulshan");
        let result = filter_cars(&all, &k);
        assert_eq!(names(&result), vec!["Mercedes-Benz S-Class"]);

        for car in &all {
            let each = (car.name.to_lowercase().contains('e') || car.brand.to_lowercase().contains('e'))
                && car.category == Category::Luxury
                && car.location == "Gulshan";
            assert_eq!(result.contains(car), each, "{}", car.name);
        }
    }

    #[test]
    fn filtering_is_idempotent_and_stable() {
        let k = criteria("", "all", "petrol", "all");
        let once = filter_cars(&SAMPLE_CARS, &k);
        let twice = filter_cars(&once, &k);
        assert_eq!(once, twice);
        assert_eq!(names(&once), vec!["BMW 5 Series", "Porsche 911"]);
    }

    #[test]
    fn selector_parsing() {
        assert_eq!("".parse::<Selector<Category>>(), Ok(Selector::All));
        assert_eq!("all".parse::<Selector<Category>>(), Ok(Selector::All));
        assert_eq!("suv".parse::<Selector<Category>>(), Ok(Selector::Only(Category::Suv)));
        assert!("van".parse::<Selector<Category>>().is_err());
    }

    #[test]
    fn active_count_counts_non_sentinel_fields() {
        assert_eq!(FilterCriteria::cleared().active_count(), 0);
        assert!(FilterCriteria::cleared().is_cleared());
        assert_eq!(criteria("tes", "all", "electric", "all").active_count(), 2);
        assert_eq!(criteria("x", "suv", "diesel", "Uttara").active_count(), 4);
    }

    #[test]
    fn featured_skips_unavailable_and_caps_at_three() {
        let mut cars = SAMPLE_CARS.clone();
        cars[0].is_available = false;
        let featured = featured_cars(&cars);
        assert_eq!(
            names(&featured),
            vec!["BMW 5 Series", "Mercedes-Benz S-Class", "Porsche 911"]
        );
        assert_eq!(available_count(&SAMPLE_CARS), 5);
    }
}
