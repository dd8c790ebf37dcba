mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use surgecast_advisory::AdvisoryClient;
use surgecast_engine::{Engine, EngineConfig, Refresher};
use surgecast_providers::{AirQualityClient, RetryPolicy, WeatherClient};

use crate::api::{build_app, default_rate_limit_state, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(surgecast_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = surgecast_db::PoolConfig::from_app_config(&config);
    let pool = surgecast_db::connect_pool(&config.database_url, pool_config).await?;
    surgecast_db::run_migrations(&pool).await?;

    let locations_file = surgecast_core::load_locations(&config.locations_path)?;
    let location_names: Vec<String> = locations_file
        .locations
        .iter()
        .map(|l| l.name.clone())
        .collect();

    let policy = RetryPolicy::from_app_config(&config);
    let weather = WeatherClient::with_base_url(
        config.weather_api_key.clone(),
        config.provider_timeout_secs,
        &config.provider_user_agent,
        policy,
        &config.weather_api_url,
    )?;
    let air_quality = AirQualityClient::with_base_url(
        config.air_quality_api_key.clone(),
        config.provider_timeout_secs,
        &config.provider_user_agent,
        policy,
        &config.air_quality_api_url,
    )?;
    let advisory = AdvisoryClient::with_base_url(
        config.advisory_api_key.clone(),
        &config.advisory_model,
        config.provider_timeout_secs,
        &config.provider_user_agent,
        policy,
        &config.advisory_api_url,
    )?;

    let refresher = Refresher::new(
        pool.clone(),
        weather,
        air_quality,
        config.freshness_threshold_hours,
    );
    let engine = Arc::new(Engine::new(
        pool.clone(),
        refresher,
        advisory,
        locations_file,
        EngineConfig::from_app_config(&config),
    ));

    let _scheduler =
        scheduler::build_scheduler(Arc::clone(&engine), Arc::clone(&config), location_names)
            .await?;

    let app = build_app(
        AppState {
            pool,
            engine,
            freshness_threshold_hours: config.freshness_threshold_hours,
        },
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
