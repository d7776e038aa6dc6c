// Session: the tracked cities, comparison type, display product and refresh
// countdown. Every user action ends in a new, independent batch run.

use std::{collections::HashMap, time::Duration};

use chrono::Local;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    events::FetchEvent,
    model::{BatchRequest, BatchSummary, City, ComparisonType},
    orchestrator::BatchOrchestrator,
};

#[derive(Debug)]
struct SessionState {
    cities: Vec<City>,
    comparison: ComparisonType,
    product: Option<String>,
    countdown: u64,
    // Filtered airport count per lowercased city name, from the last run that
    // got past the airport lookup
    airport_counts: HashMap<String, usize>,
}

pub struct Session {
    orchestrator: BatchOrchestrator,
    countdown_seconds: u64,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(
        orchestrator: BatchOrchestrator,
        comparison: ComparisonType,
        countdown_seconds: u64,
    ) -> Self {
        Self {
            orchestrator,
            countdown_seconds,
            state: Mutex::new(SessionState {
                cities: Vec::new(),
                comparison,
                product: None,
                countdown: countdown_seconds,
                airport_counts: HashMap::new(),
            }),
        }
    }

    pub fn cities(&self) -> Vec<City> {
        self.state.lock().cities.clone()
    }

    pub fn comparison(&self) -> ComparisonType {
        self.state.lock().comparison
    }

    pub fn display_product(&self) -> Option<String> {
        self.state.lock().product.clone()
    }

    pub fn countdown(&self) -> u64 {
        self.state.lock().countdown
    }

    pub async fn add_city(&self, name: &str) -> Option<BatchSummary> {
        let added = {
            let mut state = self.state.lock();
            if state.cities.iter().any(|c| c.is_named(name)) {
                None
            } else {
                let city = City::new(name);
                state.cities.push(city.clone());
                Some((city, state.comparison))
            }
        };

        let Some((city, comparison)) = added else {
            debug!(city = name, "city already tracked");
            self.orchestrator.events().emit(FetchEvent::data_error(name));
            return None;
        };

        Some(self.run(BatchRequest::new(vec![city], comparison)).await)
    }

    pub fn remove_city(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.cities.len();
        state.cities.retain(|c| !c.is_named(name));
        state.airport_counts.remove(&name.to_lowercase());
        state.cities.len() != before
    }

    // Cycles the city to its next airport candidate and refetches only that city
    pub async fn request_new_airport(&self, name: &str) -> Option<BatchSummary> {
        let next = {
            let mut state = self.state.lock();
            let count = state.airport_counts.get(&name.to_lowercase()).copied();
            let comparison = state.comparison;
            let city = state.cities.iter_mut().find(|c| c.is_named(name));
            let next = match (city, count) {
                (Some(city), Some(count)) => {
                    city.advance_airport(count);
                    Some((city.clone(), comparison))
                }
                _ => None,
            };
            next
        };

        let Some((city, comparison)) = next else {
            self.orchestrator.events().emit(FetchEvent::data_error(name));
            return None;
        };

        debug!(city = %city.name, index = city.index, "next airport requested");
        Some(self.run(BatchRequest::new(vec![city], comparison)).await)
    }

    pub async fn change_comparison(&self, compare: ComparisonType) -> BatchSummary {
        self.orchestrator
            .events()
            .emit(FetchEvent::ComparisonChanged { compare });
        self.state.lock().comparison = compare;
        self.refresh().await
    }

    pub async fn change_display_product(&self, product: &str) -> BatchSummary {
        self.orchestrator.events().emit(FetchEvent::ProductChanged {
            product: product.to_string(),
        });
        self.state.lock().product = Some(product.to_string());
        self.refresh().await
    }

    pub async fn refresh(&self) -> BatchSummary {
        let request = self.full_request(None);
        self.run(request).await
    }

    // One countdown step. Returns the batch summary when the countdown expired.
    pub async fn tick(&self) -> Option<BatchSummary> {
        self.orchestrator.events().emit(FetchEvent::TimerTick);

        let expired = {
            let mut state = self.state.lock();
            state.countdown = state.countdown.saturating_sub(1);
            if state.countdown == 0 {
                state.countdown = self.countdown_seconds;
                true
            } else {
                false
            }
        };
        if !expired {
            return None;
        }

        let refresh_time = Local::now().format("%H:%M:%S").to_string();
        info!(%refresh_time, "countdown expired, refreshing");
        let request = self.full_request(Some(refresh_time));
        Some(self.run(request).await)
    }

    pub async fn run_countdown(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick of an interval completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    fn full_request(&self, refresh_time: Option<String>) -> BatchRequest {
        let state = self.state.lock();
        BatchRequest {
            cities: state.cities.clone(),
            comparison: state.comparison,
            refresh_time,
        }
    }

    async fn run(&self, request: BatchRequest) -> BatchSummary {
        let summary = self.orchestrator.run(request).await;

        let mut state = self.state.lock();
        for outcome in &summary.outcomes {
            if let Some(airports) = outcome.airports() {
                state
                    .airport_counts
                    .insert(outcome.city().name.to_lowercase(), airports.len());
            }
        }
        drop(state);

        summary
    }
}
