// Data model for the city pipelines: cities, coordinates, airport candidates,
// geocode results and the batch request that ties them together.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

// City identity: names compare case-insensitively
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

// A city selected by the user. `index` picks which filtered airport candidate
// is used as the ride start point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub index: usize,
}

impl City {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: 0,
        }
    }

    pub fn with_index(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// Case-insensitive identity check.
    pub fn is_named(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }

    // Moves to the next airport candidate, wrapping back to the first one.
    pub fn advance_airport(&mut self, airport_count: usize) {
        if airport_count == 0 {
            return;
        }
        self.index = (self.index + 1) % airport_count;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportCandidate {
    pub name: String,
    pub city: String,
    #[serde(flatten)]
    pub coordinate: Coordinate,
}

impl AirportCandidate {
    /// True when the candidate's reported city contains `city_name`,
    /// ignoring case. The airport API matches loosely, so "Austin" also
    /// returns airports in unrelated cities.
    pub fn serves(&self, city_name: &str) -> bool {
        self.city
            .to_lowercase()
            .contains(&city_name.to_lowercase())
    }
}

// Response of the airport-by-name endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AirportResponse {
    #[serde(default)]
    pub airports: Vec<AirportCandidate>,
}

impl AirportResponse {
    pub fn matching(self, city_name: &str) -> Vec<AirportCandidate> {
        self.airports
            .into_iter()
            .filter(|airport| airport.serves(city_name))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub coordinate: Coordinate,
}

// Forward geocoding response; results are ordered by confidence
#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub results: Vec<GeocodeMatch>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeMatch {
    pub geometry: Geometry,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    pub location: Coordinate,
}

impl GeocodeResponse {
    pub fn best_match(&self) -> Option<GeocodeResult> {
        self.results.first().map(|m| GeocodeResult {
            coordinate: m.geometry.location,
        })
    }
}

/// Opaque payload of the ride price/ETA endpoint.
pub type PriceEstimate = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonType {
    Price,
    Eta,
}

impl ComparisonType {
    // Path segment of the ride API endpoint
    pub fn path(&self) -> &'static str {
        match self {
            ComparisonType::Price => "estimates/price",
            ComparisonType::Eta => "estimates/time",
        }
    }

    // The price endpoint takes a start and end point, the ETA endpoint only a start
    pub fn needs_end_coordinate(&self) -> bool {
        matches!(self, ComparisonType::Price)
    }
}

impl Default for ComparisonType {
    fn default() -> Self {
        ComparisonType::Price
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for ComparisonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "price" | "estimates/price" => Ok(ComparisonType::Price),
            "eta" | "time" | "estimates/time" => Ok(ComparisonType::Eta),
            other => Err(format!("unknown comparison type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub cities: Vec<City>,
    pub comparison: ComparisonType,
    pub refresh_time: Option<String>,
}

impl BatchRequest {
    pub fn new(cities: Vec<City>, comparison: ComparisonType) -> Self {
        Self {
            cities,
            comparison,
            refresh_time: None,
        }
    }
}

// Result of one city pipeline
#[derive(Debug)]
pub enum CityOutcome {
    Succeeded {
        city: City,
        airports: Vec<AirportCandidate>,
        estimate: PriceEstimate,
    },
    // `airports` is set when the failure came after the airport lookup
    Failed {
        city: City,
        error: ResolveError,
        airports: Option<Vec<AirportCandidate>>,
    },
}

impl CityOutcome {
    pub fn city(&self) -> &City {
        match self {
            CityOutcome::Succeeded { city, .. } => city,
            CityOutcome::Failed { city, .. } => city,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CityOutcome::Succeeded { .. })
    }

    pub fn airports(&self) -> Option<&[AirportCandidate]> {
        match self {
            CityOutcome::Succeeded { airports, .. } => Some(airports),
            CityOutcome::Failed { airports, .. } => airports.as_deref(),
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<CityOutcome>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn outcome_for(&self, city_name: &str) -> Option<&CityOutcome> {
        self.outcomes.iter().find(|o| o.city().is_named(city_name))
    }
}
