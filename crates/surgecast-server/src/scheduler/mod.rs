//! Background refresh scheduler.
//!
//! Registers one recurring job that fans out a forced refresh for every
//! (location, signal) pair in the configured set. Branches are isolated:
//! one location's failing provider never aborts the others. Nothing runs at
//! process start; the first refresh is the next cadence boundary.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use surgecast_core::SignalKind;
use surgecast_engine::Engine;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    engine: Arc<Engine>,
    config: Arc<surgecast_core::AppConfig>,
    locations: Vec<String>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_refresh_job(&scheduler, engine, config, locations).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the recurring signal-refresh job.
///
/// The cadence comes from config (default every 6 hours) and is pinned to
/// fixed clock boundaries: `0 0 */6 * * *` fires at 00:00, 06:00, 12:00 and
/// 18:00 UTC.
async fn register_refresh_job(
    scheduler: &JobScheduler,
    engine: Arc<Engine>,
    config: Arc<surgecast_core::AppConfig>,
    locations: Vec<String>,
) -> Result<(), JobSchedulerError> {
    let cron = format!("0 0 */{} * * *", config.refresh_cadence_hours);
    let locations = Arc::new(locations);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let engine = Arc::clone(&engine);
        let locations = Arc::clone(&locations);
        let max_concurrent = config.refresh_max_concurrent.max(1);

        Box::pin(async move {
            tracing::info!(locations = locations.len(), "scheduler: starting signal refresh run");
            run_refresh_job(&engine, &locations, max_concurrent).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Fan out one forced refresh per (location, signal) pair and log the
/// aggregate outcome.
async fn run_refresh_job(engine: &Engine, locations: &[String], max_concurrent: usize) {
    let pairs: Vec<(String, SignalKind)> = locations
        .iter()
        .flat_map(|location| SignalKind::ALL.map(|signal| (location.clone(), signal)))
        .collect();
    let total = pairs.len();

    let outcomes: Vec<bool> = stream::iter(pairs)
        .map(|(location, signal)| async move {
            refresh_one(engine, &location, signal).await
        })
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let succeeded = outcomes.iter().filter(|ok| **ok).count();
    tracing::info!(succeeded, total, "scheduler: signal refresh run complete");
}

/// Force-refresh one signal for one location, isolating any failure.
async fn refresh_one(engine: &Engine, location: &str, signal: SignalKind) -> bool {
    let outcome = match signal {
        SignalKind::Weather => engine
            .refresher()
            .get_or_refresh_weather(location, true)
            .await
            .map(|_| ()),
        SignalKind::AirQuality => engine
            .refresher()
            .get_or_refresh_air_quality(location, true)
            .await
            .map(|_| ()),
    };

    match outcome {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                location,
                signal = %signal,
                error = %e,
                "scheduler: refresh failed"
            );
            false
        }
    }
}
