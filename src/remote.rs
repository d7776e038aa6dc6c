// Remote services consumed by the resolvers: airport lookup, forward
// geocoding and the ride price/ETA API. Each call returns the raw response
// body so resolvers can cache exactly what the service sent.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Url};
use tracing::debug;

use crate::{
    config::FetchConfig,
    error::ApiError,
    model::{ComparisonType, Coordinate},
};

#[async_trait]
pub trait AirportApi: Send + Sync + 'static {
    async fn airports_by_name(&self, name: &str) -> Result<Bytes, ApiError>;
}

#[async_trait]
pub trait GeocodeApi: Send + Sync + 'static {
    async fn geocode(&self, address: &str) -> Result<Bytes, ApiError>;
}

#[async_trait]
pub trait RideApi: Send + Sync + 'static {
    // `end` is only sent when the caller provides it
    async fn estimate(
        &self,
        comparison: ComparisonType,
        start: Coordinate,
        end: Option<Coordinate>,
    ) -> Result<Bytes, ApiError>;
}

// reqwest-backed client for all three services
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: FetchConfig,
}

impl HttpClient {
    pub fn new(config: FetchConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent("ride-compare/0.1")
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn parse_url(base: &str) -> Result<Url, ApiError> {
        Url::parse(base).map_err(|e| ApiError::InvalidRequest(format!("{base}: {e}")))
    }

    fn push_segments(url: &mut Url, segments: &[&str]) -> Result<(), ApiError> {
        let base = url.to_string();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("{base} cannot be a base")))?
            .pop_if_empty()
            .extend(segments);
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Bytes, ApiError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.config.timeout_ms)
            } else {
                ApiError::from(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::ApiResponseError {
                status_code: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }

        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl AirportApi for HttpClient {
    async fn airports_by_name(&self, name: &str) -> Result<Bytes, ApiError> {
        let mut url = Self::parse_url(&self.config.airport.base_url)?;
        Self::push_segments(&mut url, &[name])?;
        debug!(%url, "airport lookup");

        let request = self
            .client
            .get(url)
            .query(&[("user_key", self.config.airport.token.as_str())]);
        self.send(request).await
    }
}

#[async_trait]
impl GeocodeApi for HttpClient {
    async fn geocode(&self, address: &str) -> Result<Bytes, ApiError> {
        let url = Self::parse_url(&self.config.geocode.base_url)?;
        debug!(%url, address, "geocode lookup");

        let request = self.client.get(url).query(&[
            ("address", address),
            ("key", self.config.geocode.token.as_str()),
        ]);
        self.send(request).await
    }
}

#[async_trait]
impl RideApi for HttpClient {
    async fn estimate(
        &self,
        comparison: ComparisonType,
        start: Coordinate,
        end: Option<Coordinate>,
    ) -> Result<Bytes, ApiError> {
        let mut url = Self::parse_url(&self.config.ride.base_url)?;
        let segments: Vec<&str> = comparison.path().split('/').collect();
        Self::push_segments(&mut url, &segments)?;

        let mut query = vec![
            ("start_latitude", start.lat.to_string()),
            ("start_longitude", start.lng.to_string()),
        ];
        if let Some(end) = end {
            query.push(("end_latitude", end.lat.to_string()));
            query.push(("end_longitude", end.lng.to_string()));
        }
        debug!(%url, ?query, "ride estimate");

        let request = self
            .client
            .get(url)
            .query(&query)
            .header("Authorization", format!("Token {}", self.config.ride.token));
        self.send(request).await
    }
}

// In-memory stand-in for the three services, with canned per-city responses,
// injected failures, artificial delay and call counters.
pub mod mock_server {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use serde_json::json;

    use crate::model::AirportCandidate;

    #[derive(Debug, Clone, PartialEq)]
    pub struct RideCall {
        pub comparison: ComparisonType,
        pub start: Coordinate,
        pub end: Option<Coordinate>,
    }

    #[derive(Default)]
    pub struct MockServer {
        airports: Mutex<HashMap<String, Bytes>>,
        geocodes: Mutex<HashMap<String, Bytes>>,
        estimates: Mutex<HashMap<String, Bytes>>,
        failing_airports: Mutex<HashSet<String>>,
        panicking_airports: Mutex<HashSet<String>>,
        failing_geocodes: Mutex<HashSet<String>>,
        failing_rides: Mutex<HashSet<String>>,
        fail_all_rides: Mutex<bool>,
        delays_ms: Mutex<HashMap<String, u64>>,
        ride_calls: Mutex<Vec<RideCall>>,
        pub airport_count: AtomicUsize,
        pub geocode_count: AtomicUsize,
        pub ride_count: AtomicUsize,
    }

    fn lat_key(lat: f64) -> String {
        lat.to_string()
    }

    impl MockServer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_airports(&self, city: &str, airports: &[AirportCandidate]) {
            let body = json!({ "airports": airports }).to_string();
            self.add_airport_response(city, Bytes::from(body));
        }

        pub fn add_airport_response(&self, city: &str, body: Bytes) {
            self.airports.lock().insert(city.to_string(), body);
        }

        pub fn add_geocode(&self, city: &str, center: Coordinate) {
            let body = json!({
                "results": [{ "geometry": { "location": { "lat": center.lat, "lng": center.lng } } }],
                "status": "OK",
            })
            .to_string();
            self.add_geocode_response(city, Bytes::from(body));
        }

        pub fn add_geocode_response(&self, city: &str, body: Bytes) {
            self.geocodes.lock().insert(city.to_string(), body);
        }

        // Estimates are keyed by the start latitude, which identifies the airport
        pub fn add_estimate(&self, start_lat: f64, body: serde_json::Value) {
            self.estimates
                .lock()
                .insert(lat_key(start_lat), Bytes::from(body.to_string()));
        }

        pub fn fail_airports_for(&self, city: &str) {
            self.failing_airports.lock().insert(city.to_string());
        }

        // The airport call for this city panics instead of returning
        pub fn panic_airports_for(&self, city: &str) {
            self.panicking_airports.lock().insert(city.to_string());
        }

        pub fn fail_geocode_for(&self, city: &str) {
            self.failing_geocodes.lock().insert(city.to_string());
        }

        pub fn fail_rides_from(&self, start_lat: f64) {
            self.failing_rides.lock().insert(lat_key(start_lat));
        }

        pub fn fail_all_rides(&self, fail: bool) {
            *self.fail_all_rides.lock() = fail;
        }

        // Delay applied to the airport and geocode lookups of one city
        pub fn set_delay(&self, city: &str, delay_ms: u64) {
            self.delays_ms.lock().insert(city.to_string(), delay_ms);
        }

        pub fn ride_calls(&self) -> Vec<RideCall> {
            self.ride_calls.lock().clone()
        }

        async fn simulate_delay(&self, city: &str) {
            let delay = self.delays_ms.lock().get(city).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        fn unavailable() -> ApiError {
            ApiError::ApiResponseError {
                status_code: 503,
                message: "Service temporarily unavailable".to_string(),
            }
        }
    }

    #[async_trait]
    impl AirportApi for MockServer {
        async fn airports_by_name(&self, name: &str) -> Result<Bytes, ApiError> {
            self.airport_count.fetch_add(1, Ordering::SeqCst);
            self.simulate_delay(name).await;

            let panicking = self.panicking_airports.lock().contains(name);
            if panicking {
                panic!("airport lookup for {name} panicked");
            }

            let failing = self.failing_airports.lock().contains(name);
            if failing {
                return Err(ApiError::NetworkError("Service unavailable".to_string()));
            }

            let body = self.airports.lock().get(name).cloned();
            Ok(body.unwrap_or_else(|| Bytes::from_static(br#"{"airports":[]}"#)))
        }
    }

    #[async_trait]
    impl GeocodeApi for MockServer {
        async fn geocode(&self, address: &str) -> Result<Bytes, ApiError> {
            self.geocode_count.fetch_add(1, Ordering::SeqCst);
            self.simulate_delay(address).await;

            let failing = self.failing_geocodes.lock().contains(address);
            if failing {
                return Err(Self::unavailable());
            }

            let body = self.geocodes.lock().get(address).cloned();
            Ok(body.unwrap_or_else(|| Bytes::from_static(br#"{"results":[],"status":"ZERO_RESULTS"}"#)))
        }
    }

    #[async_trait]
    impl RideApi for MockServer {
        async fn estimate(
            &self,
            comparison: ComparisonType,
            start: Coordinate,
            end: Option<Coordinate>,
        ) -> Result<Bytes, ApiError> {
            self.ride_count.fetch_add(1, Ordering::SeqCst);
            self.ride_calls.lock().push(RideCall {
                comparison,
                start,
                end,
            });

            let failing = *self.fail_all_rides.lock()
                || self.failing_rides.lock().contains(&lat_key(start.lat));
            if failing {
                return Err(Self::unavailable());
            }

            let body = self.estimates.lock().get(&lat_key(start.lat)).cloned();
            Ok(body.unwrap_or_else(|| {
                Bytes::from(
                    json!({ "start_latitude": start.lat, "estimates": [] }).to_string(),
                )
            }))
        }
    }
}
