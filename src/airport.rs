// Airport Resolver: airport candidates for a city, filtered to the ones that
// actually serve it. Entries never expire once cached.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    cache::{CacheKey, CacheStore},
    error::ResolveError,
    model::{AirportCandidate, AirportResponse, City},
    remote::AirportApi,
};

#[derive(Clone)]
pub struct AirportResolver {
    cache: Arc<dyn CacheStore>,
    api: Arc<dyn AirportApi>,
}

impl AirportResolver {
    pub fn new(cache: Arc<dyn CacheStore>, api: Arc<dyn AirportApi>) -> Self {
        Self { cache, api }
    }

    pub fn cache_key(city: &City) -> CacheKey {
        CacheKey::Airport {
            city: city.name.clone(),
        }
    }

    pub async fn lookup(&self, city: &City) -> Result<Vec<AirportCandidate>, ResolveError> {
        let key = Self::cache_key(city);

        let response = match self.cached(&key) {
            Some(response) => response,
            None => {
                let raw = self
                    .api
                    .airports_by_name(&city.name)
                    .await
                    .map_err(|e| ResolveError::remote(&city.name, e))?;
                let response: AirportResponse = serde_json::from_slice(&raw)
                    .map_err(|e| ResolveError::decode(&city.name, e))?;

                // The unfiltered response is cached so matching can change later
                self.cache.put(&key, raw, Utc::now());
                response
            }
        };

        let total = response.airports.len();
        let airports = response.matching(&city.name);
        debug!(city = %city.name, total, matching = airports.len(), "airports resolved");

        if airports.is_empty() {
            return Err(ResolveError::NoMatchingAirports(city.name.clone()));
        }
        Ok(airports)
    }

    fn cached(&self, key: &CacheKey) -> Option<AirportResponse> {
        let entry = self.cache.get(key)?;
        match serde_json::from_slice(&entry.payload) {
            Ok(response) => Some(response),
            Err(err) => {
                warn!(%key, error = %err, "discarding malformed cached airports");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::MemoryStore, model::Coordinate, remote::mock_server::MockServer};
    use bytes::Bytes;
    use std::sync::atomic::Ordering;
    use tokio_test::{assert_err, assert_ok};

    fn airport(name: &str, city: &str, lat: f64) -> AirportCandidate {
        AirportCandidate {
            name: name.to_string(),
            city: city.to_string(),
            coordinate: Coordinate { lat, lng: -97.0 },
        }
    }

    fn setup() -> (Arc<MemoryStore>, Arc<MockServer>, AirportResolver) {
        let cache = Arc::new(MemoryStore::new());
        let server = Arc::new(MockServer::new());
        let resolver = AirportResolver::new(cache.clone(), server.clone());
        (cache, server, resolver)
    }

    #[tokio::test]
    async fn test_filters_loosely_matched_airports() {
        let (_, server, resolver) = setup();
        server.add_airports(
            "Austin",
            &[
                airport("Austin Bergstrom Intl", "Austin", 30.19),
                airport("Austin Straubel Intl", "Green Bay", 44.48),
                airport("Executive", "austin", 30.39),
            ],
        );

        let airports = assert_ok!(resolver.lookup(&City::new("Austin")).await);

        assert_eq!(airports.len(), 2);
        assert!(airports.iter().all(|a| a.serves("Austin")));
    }

    #[tokio::test]
    async fn test_caches_unfiltered_response() {
        let (cache, server, resolver) = setup();
        server.add_airports(
            "Austin",
            &[
                airport("Austin Bergstrom Intl", "Austin", 30.19),
                airport("Austin Straubel Intl", "Green Bay", 44.48),
            ],
        );

        assert_ok!(resolver.lookup(&City::new("Austin")).await);

        let entry = cache.get(&AirportResolver::cache_key(&City::new("Austin"))).unwrap();
        let stored: AirportResponse = serde_json::from_slice(&entry.payload).unwrap();
        assert_eq!(stored.airports.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_remote_call() {
        let (cache, server, resolver) = setup();
        let city = City::new("Boston");
        let body = serde_json::json!({
            "airports": [
                airport("Logan Intl", "Boston", 42.36),
                airport("Boston Executive", "Norwood", 42.19),
            ]
        });
        cache.put(
            &AirportResolver::cache_key(&city),
            Bytes::from(body.to_string()),
            Utc::now() - chrono::Duration::days(365),
        );

        let airports = assert_ok!(resolver.lookup(&city).await);

        assert_eq!(airports.len(), 1);
        assert_eq!(airports[0].name, "Logan Intl");
        assert_eq!(server.airport_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_cache_entry_is_a_miss() {
        let (cache, server, resolver) = setup();
        let city = City::new("Denver");
        cache.put(
            &AirportResolver::cache_key(&city),
            Bytes::from_static(b"{broken"),
            Utc::now(),
        );
        server.add_airports("Denver", &[airport("Denver Intl", "Denver", 39.86)]);

        let airports = assert_ok!(resolver.lookup(&city).await);

        assert_eq!(airports[0].name, "Denver Intl");
        assert_eq!(server.airport_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_matching_airports_is_an_error() {
        let (cache, server, resolver) = setup();
        server.add_airports("Springfield", &[airport("Capital", "Peoria", 40.66)]);

        let err = assert_err!(resolver.lookup(&City::new("Springfield")).await);

        assert!(matches!(err, ResolveError::NoMatchingAirports(ref c) if c == "Springfield"));
        // The call itself succeeded, so the response is still cached
        assert_eq!(cache.stats().items_count, 1);
    }

    #[tokio::test]
    async fn test_remote_failure_carries_city() {
        let (cache, server, resolver) = setup();
        server.fail_airports_for("Austin");

        let err = assert_err!(resolver.lookup(&City::new("Austin")).await);

        assert!(matches!(err, ResolveError::RemoteCall { .. }));
        assert_eq!(err.city(), "Austin");
        assert_eq!(cache.stats().items_count, 0);
    }

    #[tokio::test]
    async fn test_malformed_remote_payload_is_not_cached() {
        let (cache, server, resolver) = setup();
        server.add_airport_response("Austin", Bytes::from_static(b"<html>"));

        let err = assert_err!(resolver.lookup(&City::new("Austin")).await);

        assert!(matches!(err, ResolveError::Decode { .. }));
        assert_eq!(cache.stats().write_count, 0);
    }
}
