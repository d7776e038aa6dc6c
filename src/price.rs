// Price Resolver: ride price/ETA estimates with a TTL-bounded cache.
//
// A cached estimate is served only while it is younger than the refresh
// interval minus one second, so the cache never answers a refresh that the
// countdown has already asked to be fresh.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    cache::{CacheEntry, CacheKey, CacheStore},
    error::ResolveError,
    model::{ComparisonType, Coordinate, PriceEstimate},
    remote::RideApi,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuery {
    pub comparison: ComparisonType,
    pub start: Coordinate,
    pub end: Option<Coordinate>,
    pub city_name: String,
}

impl PriceQuery {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::Price {
            city: self.city_name.clone(),
            comparison: self.comparison,
            start_lat: self.start.lat,
        }
    }

    // The ETA endpoint takes a single point
    fn end_for_request(&self) -> Option<Coordinate> {
        if self.comparison.needs_end_coordinate() {
            self.end
        } else {
            None
        }
    }
}

/// Whether `entry` may still be served at `now`.
pub fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>, countdown_seconds: u64) -> bool {
    entry.age_secs(now) < countdown_seconds as f64 - 1.0
}

#[derive(Clone)]
pub struct PriceResolver {
    cache: Arc<dyn CacheStore>,
    api: Arc<dyn RideApi>,
    countdown_seconds: u64,
}

impl PriceResolver {
    pub fn new(cache: Arc<dyn CacheStore>, api: Arc<dyn RideApi>, countdown_seconds: u64) -> Self {
        Self {
            cache,
            api,
            countdown_seconds,
        }
    }

    pub async fn lookup(&self, query: &PriceQuery) -> Result<PriceEstimate, ResolveError> {
        let key = query.cache_key();

        if let Some(estimate) = self.cached(&key, Utc::now()) {
            return Ok(estimate);
        }

        let raw = self
            .api
            .estimate(query.comparison, query.start, query.end_for_request())
            .await
            .map_err(|e| ResolveError::remote(&query.city_name, e))?;
        let estimate: PriceEstimate = serde_json::from_slice(&raw)
            .map_err(|e| ResolveError::decode(&query.city_name, e))?;

        self.cache.put(&key, raw, Utc::now());
        debug!(city = %query.city_name, comparison = %query.comparison, "estimate fetched");
        Ok(estimate)
    }

    fn cached(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<PriceEstimate> {
        let entry = self.cache.get(key)?;
        if !is_fresh(&entry, now, self.countdown_seconds) {
            debug!(%key, age_secs = entry.age_secs(now), "cached estimate expired");
            return None;
        }

        match serde_json::from_slice(&entry.payload) {
            Ok(estimate) => Some(estimate),
            Err(err) => {
                warn!(%key, error = %err, "discarding malformed cached estimate");
                None
            }
        }
    }
}
