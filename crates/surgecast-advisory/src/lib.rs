//! Client for the external reasoning service that turns a feature snapshot
//! and risk score into narrative staffing/supply guidance.
//!
//! The service's reply is modelled as a tagged [`Advisory`]: either the
//! fixed-schema [`AdvisoryPayload`] or a degraded raw-text fallback. Callers
//! match exhaustively on the variant; a malformed reply is never an error.

mod client;
mod error;
mod types;

pub use client::AdvisoryClient;
pub use error::AdvisoryError;
pub use types::{Advisory, AdvisoryPayload, DiseaseDetection};
