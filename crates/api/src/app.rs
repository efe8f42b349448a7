use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use mongodb::Database;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, security_headers_middleware,
    trace_id, RateLimiterState,
};
use crate::routes::{
    air_quality, contributions, devices, external_air_quality, external_sources, health, hub,
    mqtt_sources, stations, users,
};
use crate::services::{EventHub, MqttManager};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub hub: EventHub,
    pub mqtt: MqttManager,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

pub fn create_app(config: Config, db: Database, event_hub: EventHub, mqtt: MqttManager) -> Router {
    let config = Arc::new(config);

    // Rate limiting is disabled by setting the limit to 0
    let rate_limiter = if config.security.rate_limit_per_minute > 0 {
        Some(Arc::new(RateLimiterState::new(
            config.security.rate_limit_per_minute,
        )))
    } else {
        None
    };

    let state = AppState {
        db,
        config: config.clone(),
        hub: event_hub,
        mqtt,
        rate_limiter,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Data-plane routes, rate limited per client address
    let api_routes = Router::new()
        // Readings
        .route(
            "/api/airquality",
            get(air_quality::list_readings).post(air_quality::create_reading),
        )
        .route("/api/airquality/latest", get(air_quality::latest_reading))
        .route("/api/airquality/history", get(air_quality::history))
        .route(
            "/api/airquality/history/download",
            get(air_quality::history_download),
        )
        // External readings
        .route(
            "/api/external/airquality",
            get(external_air_quality::list_readings),
        )
        .route(
            "/api/external/airquality/latest",
            get(external_air_quality::latest_reading),
        )
        // Stations
        .route(
            "/api/stations",
            get(stations::list_stations).post(stations::create_station),
        )
        .route("/api/stations/map", get(stations::map_stations))
        .route(
            "/api/stations/:station_id",
            get(stations::get_station)
                .put(stations::update_station)
                .delete(stations::delete_station),
        )
        // External HTTP sources
        .route(
            "/api/sources",
            get(external_sources::list_sources).post(external_sources::create_source),
        )
        .route(
            "/api/sources/:source_id",
            get(external_sources::get_source)
                .put(external_sources::update_source)
                .delete(external_sources::delete_source),
        )
        .route(
            "/api/sources/:source_id/reactivate",
            post(external_sources::reactivate_source),
        )
        // External MQTT sources
        .route(
            "/api/mqtt/sources",
            get(mqtt_sources::list_sources).post(mqtt_sources::create_source),
        )
        .route(
            "/api/mqtt/sources/:source_id",
            get(mqtt_sources::get_source)
                .put(mqtt_sources::update_source)
                .delete(mqtt_sources::delete_source),
        )
        .route(
            "/api/mqtt/sources/:source_id/activate",
            post(mqtt_sources::activate_source),
        )
        .route(
            "/api/mqtt/sources/:source_id/deactivate",
            post(mqtt_sources::deactivate_source),
        )
        .route(
            "/api/mqtt/sources/:source_id/test",
            post(mqtt_sources::test_source),
        )
        // Contributions
        .route("/api/contributions", post(contributions::create_contribution))
        .route("/api/contributions/list", get(contributions::list_contributions))
        .route(
            "/api/contributions/public",
            get(contributions::public_contributions),
        )
        .route(
            "/api/contributions/:contribution_id",
            get(contributions::get_contribution).delete(contributions::delete_contribution),
        )
        .route(
            "/api/contributions/:contribution_id/upload",
            post(contributions::upload_readings),
        )
        .route(
            "/api/contributions/:contribution_id/latest",
            get(contributions::latest_reading),
        )
        .route(
            "/api/contributions/:contribution_id/download",
            get(contributions::download_readings),
        )
        // Users
        .route("/api/users", get(users::list_users).post(users::register_user))
        .route("/api/users/login", post(users::login))
        .route(
            "/api/users/:user_id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Devices
        .route(
            "/api/devices",
            get(devices::list_devices).post(devices::register_device),
        )
        .route(
            "/api/devices/:device_id",
            get(devices::get_device).delete(devices::delete_device),
        )
        .route("/api/devices/:device_id/command", post(devices::command_device))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Browser clients subscribe here for rebroadcast readings
    let hub_routes = Router::new().route("/airqualityhub", get(hub::hub_handler));

    // Public routes (health and metrics, never rate limited)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(hub_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
