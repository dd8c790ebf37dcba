//! External signal providers and the shared resilient call executor.
//!
//! Each provider client maps a location name to one request against the
//! upstream API, classifies failures for the executor, and normalizes the
//! response into the reading store's schema while keeping the raw payload
//! for audit.

mod air_quality;
mod error;
pub mod retry;
mod weather;

pub use air_quality::{AirQualityClient, AirQualityObservation, AIR_QUALITY_SOURCE};
pub use error::ProviderError;
pub use retry::{FailureClass, RetryPolicy, Retryable};
pub use weather::{WeatherClient, WeatherObservation, WEATHER_SOURCE};
