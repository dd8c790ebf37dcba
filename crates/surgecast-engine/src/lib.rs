//! The surge-prediction engine: freshness-aware reading cache, feature
//! assembly, deterministic risk scoring, advisory synthesis, outbreak
//! reconciliation, and the prediction assembler that ties them together.

mod cache;
mod error;
mod features;
mod outbreak;
mod predict;
pub mod risk;

pub use cache::{estimate_aqi, Refresher, ESTIMATED_SOURCE};
pub use error::EngineError;
pub use features::{build_features, FeatureRecord, ROLLING_WINDOW_DAYS};
pub use outbreak::{reconcile, ReconcilerConfig};
pub use predict::{Engine, EngineConfig, ENGINE_VERSION};
