// City Fetch Coordinator: runs one city pipeline.
//
//   airports ─┐
//             ├─> price ─> events
//   geocode  ─┘
//
// Airport and price failures end the pipeline for the city. A geocode
// failure is reported and the pipeline continues without a city center.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    airport::AirportResolver,
    events::{EventSink, FetchEvent},
    geocode::GeocodeResolver,
    model::{City, CityOutcome, ComparisonType},
    price::{PriceQuery, PriceResolver},
};

#[derive(Clone)]
pub struct CityFetchCoordinator {
    airports: AirportResolver,
    geocoder: GeocodeResolver,
    prices: PriceResolver,
    events: Arc<dyn EventSink>,
}

impl CityFetchCoordinator {
    pub fn new(
        airports: AirportResolver,
        geocoder: GeocodeResolver,
        prices: PriceResolver,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            airports,
            geocoder,
            prices,
            events,
        }
    }

    pub fn events(&self) -> Arc<dyn EventSink> {
        self.events.clone()
    }

    pub async fn fetch_city(&self, city: City, comparison: ComparisonType) -> CityOutcome {
        let (airports, center) =
            tokio::join!(self.airports.lookup(&city), self.geocoder.lookup(&city));

        let airports = match airports {
            Ok(airports) => airports,
            Err(error) => {
                warn!(city = %city.name, %error, "airport lookup failed");
                self.events.emit(FetchEvent::data_error(&city.name));
                return CityOutcome::Failed {
                    city,
                    error,
                    airports: None,
                };
            }
        };

        let end = match center {
            Ok(center) => Some(center.coordinate),
            Err(error) => {
                warn!(city = %city.name, %error, "geocode failed, continuing without city center");
                self.events.emit(FetchEvent::data_error(&city.name));
                None
            }
        };

        let selected = &airports[city.index % airports.len()];
        debug!(city = %city.name, airport = %selected.name, index = city.index, "selected start airport");

        let query = PriceQuery {
            comparison,
            start: selected.coordinate,
            end: if comparison.needs_end_coordinate() { end } else { None },
            city_name: city.name.clone(),
        };

        match self.prices.lookup(&query).await {
            Ok(estimate) => {
                self.events.emit(FetchEvent::AirportsLoaded {
                    city_name: city.name.clone(),
                    airports: airports.clone(),
                });
                self.events.emit(FetchEvent::PriceSucceeded {
                    payload: estimate.clone(),
                    city: city.clone(),
                });
                CityOutcome::Succeeded {
                    city,
                    airports,
                    estimate,
                }
            }
            Err(error) => {
                warn!(city = %city.name, %error, "price lookup failed");
                self.events.emit(FetchEvent::data_error(&city.name));
                CityOutcome::Failed {
                    city,
                    error,
                    airports: Some(airports),
                }
            }
        }
    }
}
