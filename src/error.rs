// Error types shared by the remote clients, resolvers and configuration

use thiserror::Error;

// Failure of a single call to one of the remote services
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError { status_code: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ApiError::ApiResponseError {
                status_code: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }
}

// Failure of a resolver for one city. Every variant carries the city name so
// the coordinator can report it without extra bookkeeping.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("remote call failed for {city}: {source}")]
    RemoteCall {
        city: String,
        #[source]
        source: ApiError,
    },

    #[error("no airports matching {0}")]
    NoMatchingAirports(String),

    #[error("geocoder returned no results for {0}")]
    NoGeocodeResults(String),

    #[error("malformed payload for {city}: {source}")]
    Decode {
        city: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ResolveError {
    pub fn remote(city: &str, source: ApiError) -> Self {
        ResolveError::RemoteCall {
            city: city.to_string(),
            source,
        }
    }

    pub fn decode(city: &str, source: serde_json::Error) -> Self {
        ResolveError::Decode {
            city: city.to_string(),
            source,
        }
    }

    pub fn city(&self) -> &str {
        match self {
            ResolveError::RemoteCall { city, .. } => city,
            ResolveError::NoMatchingAirports(city) => city,
            ResolveError::NoGeocodeResults(city) => city,
            ResolveError::Decode { city, .. } => city,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
