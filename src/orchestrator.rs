// Batch Orchestrator: one coordinator task per city, a single completion
// signal once every city has settled.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};

use crate::{
    airport::AirportResolver,
    cache::CacheStore,
    config::FetchConfig,
    coordinator::CityFetchCoordinator,
    events::{EventSink, FetchEvent},
    geocode::GeocodeResolver,
    model::{BatchRequest, BatchSummary},
    price::PriceResolver,
    remote::{AirportApi, GeocodeApi, RideApi},
};

#[derive(Clone)]
pub struct BatchOrchestrator {
    coordinator: Arc<CityFetchCoordinator>,
    events: Arc<dyn EventSink>,
}

impl BatchOrchestrator {
    pub fn new(coordinator: CityFetchCoordinator) -> Self {
        let events = coordinator.events();
        Self {
            coordinator: Arc::new(coordinator),
            events,
        }
    }

    // Wires the resolvers over one shared cache and event sink
    pub fn with_services<A, G, R>(
        config: &FetchConfig,
        cache: Arc<dyn CacheStore>,
        airport_api: Arc<A>,
        geocode_api: Arc<G>,
        ride_api: Arc<R>,
        events: Arc<dyn EventSink>,
    ) -> Self
    where
        A: AirportApi,
        G: GeocodeApi,
        R: RideApi,
    {
        let coordinator = CityFetchCoordinator::new(
            AirportResolver::new(cache.clone(), airport_api),
            GeocodeResolver::new(cache.clone(), geocode_api),
            PriceResolver::new(cache, ride_api, config.countdown_seconds),
            events,
        );
        Self::new(coordinator)
    }

    pub fn events(&self) -> Arc<dyn EventSink> {
        self.events.clone()
    }

    pub async fn run(&self, request: BatchRequest) -> BatchSummary {
        self.events.emit(FetchEvent::BatchRequested {
            request: request.clone(),
        });
        info!(
            cities = request.cities.len(),
            comparison = %request.comparison,
            refresh_time = request.refresh_time.as_deref().unwrap_or("-"),
            "batch requested"
        );

        let city_names: Vec<String> = request.cities.iter().map(|c| c.name.clone()).collect();
        let mut tasks = JoinSet::new();
        for city in request.cities {
            let coordinator = self.coordinator.clone();
            let comparison = request.comparison;
            tasks.spawn(async move { coordinator.fetch_city(city, comparison).await });
        }

        let mut summary = BatchSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.outcomes.push(outcome),
                // Counts as settled; the batch still completes
                Err(err) => error!(error = %err, "city task did not complete"),
            }
        }

        // A task that died never reported its city
        for name in &city_names {
            if summary.outcome_for(name).is_none() {
                error!(city = %name, "no outcome for city");
                self.events.emit(FetchEvent::data_error(name));
            }
        }

        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "all data loaded"
        );
        self.events.emit(FetchEvent::AllDataLoaded);
        summary
    }
}
