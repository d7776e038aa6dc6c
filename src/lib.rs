// Airport-to-city-center ride comparison: per-city fetch pipelines over
// cached airport, geocode and price/ETA lookups.

pub mod airport;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod geocode;
pub mod model;
pub mod orchestrator;
pub mod price;
pub mod remote;
pub mod session;

// Re-export key types for convenience
pub use cache::{CacheEntry, CacheKey, CacheStats, CacheStore, JsonFileStore, MemoryStore};
pub use config::{Endpoint, FetchConfig};
pub use coordinator::CityFetchCoordinator;
pub use error::{ApiError, ConfigError, ResolveError};
pub use events::{EventLog, EventSink, FetchEvent};
pub use model::{
    AirportCandidate, BatchRequest, BatchSummary, City, CityOutcome, ComparisonType, Coordinate,
    GeocodeResult, PriceEstimate,
};
pub use orchestrator::BatchOrchestrator;
pub use remote::{AirportApi, GeocodeApi, HttpClient, RideApi};
pub use session::Session;
