// Geocode Resolver: the city-center coordinate, taken from the first
// (highest-confidence) geocoding match.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    cache::{CacheKey, CacheStore},
    error::ResolveError,
    model::{City, GeocodeResponse, GeocodeResult},
    remote::GeocodeApi,
};

#[derive(Clone)]
pub struct GeocodeResolver {
    cache: Arc<dyn CacheStore>,
    api: Arc<dyn GeocodeApi>,
}

impl GeocodeResolver {
    pub fn new(cache: Arc<dyn CacheStore>, api: Arc<dyn GeocodeApi>) -> Self {
        Self { cache, api }
    }

    pub fn cache_key(city: &City) -> CacheKey {
        CacheKey::Geocode {
            city: city.name.clone(),
        }
    }

    pub async fn lookup(&self, city: &City) -> Result<GeocodeResult, ResolveError> {
        let key = Self::cache_key(city);

        if let Some(entry) = self.cache.get(&key) {
            match serde_json::from_slice::<GeocodeResponse>(&entry.payload) {
                Ok(response) => return Self::first_match(city, &response),
                Err(err) => warn!(%key, error = %err, "discarding malformed cached geocode"),
            }
        }

        let raw = self
            .api
            .geocode(&city.name)
            .await
            .map_err(|e| ResolveError::remote(&city.name, e))?;
        let response: GeocodeResponse =
            serde_json::from_slice(&raw).map_err(|e| ResolveError::decode(&city.name, e))?;
        self.cache.put(&key, raw, Utc::now());

        Self::first_match(city, &response)
    }

    fn first_match(city: &City, response: &GeocodeResponse) -> Result<GeocodeResult, ResolveError> {
        let result = response
            .best_match()
            .ok_or_else(|| ResolveError::NoGeocodeResults(city.name.clone()))?;
        debug!(city = %city.name, lat = result.coordinate.lat, lng = result.coordinate.lng, "city center");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::MemoryStore, model::Coordinate, remote::mock_server::MockServer};
    use bytes::Bytes;
    use std::sync::atomic::Ordering;
    use tokio_test::{assert_err, assert_ok};

    fn setup() -> (Arc<MemoryStore>, Arc<MockServer>, GeocodeResolver) {
        let cache = Arc::new(MemoryStore::new());
        let server = Arc::new(MockServer::new());
        let resolver = GeocodeResolver::new(cache.clone(), server.clone());
        (cache, server, resolver)
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let (cache, server, resolver) = setup();
        let city = City::new("Seattle");
        let center = Coordinate { lat: 47.6, lng: -122.33 };
        server.add_geocode("Seattle", center);

        let first = assert_ok!(resolver.lookup(&city).await);
        let cached_payload = cache.get(&GeocodeResolver::cache_key(&city)).unwrap().payload;
        let second = assert_ok!(resolver.lookup(&city).await);

        assert_eq!(first.coordinate, center);
        assert_eq!(second, first);
        assert_eq!(server.geocode_count.load(Ordering::SeqCst), 1);

        let payload_after = cache.get(&GeocodeResolver::cache_key(&city)).unwrap().payload;
        assert_eq!(payload_after, cached_payload);
    }

    #[tokio::test]
    async fn test_cached_payload_is_the_raw_response() {
        let (cache, server, resolver) = setup();
        let raw = Bytes::from_static(
            br#"{"results":[{"geometry":{"location":{"lat":1.5,"lng":2.5}},"place_id":"x"}],"status":"OK"}"#,
        );
        server.add_geocode_response("Lisbon", raw.clone());

        assert_ok!(resolver.lookup(&City::new("Lisbon")).await);

        let entry = cache.get(&GeocodeResolver::cache_key(&City::new("Lisbon"))).unwrap();
        assert_eq!(entry.payload, raw);
    }

    #[tokio::test]
    async fn test_zero_results_is_an_error() {
        let (_, _server, resolver) = setup();

        let err = assert_err!(resolver.lookup(&City::new("Atlantis")).await);

        assert!(matches!(err, ResolveError::NoGeocodeResults(ref c) if c == "Atlantis"));
    }

    #[tokio::test]
    async fn test_remote_failure_is_returned_not_cached() {
        let (cache, server, resolver) = setup();
        server.fail_geocode_for("Austin");

        let err = assert_err!(resolver.lookup(&City::new("Austin")).await);

        assert!(matches!(err, ResolveError::RemoteCall { .. }));
        assert_eq!(cache.stats().write_count, 0);
    }
}
