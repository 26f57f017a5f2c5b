pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod services;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use kindling_db::repositories::{LicenseRepository, RecordRepository, UserRepository};
use kindling_db::{AccountStore, LicenseLedger, MemoryStore, RecordStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use auth::JwtKeys;
use config::ServerConfig;
use services::license_service::LicenseService;
use services::registration_service::RegistrationService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub jwt: JwtKeys,
    pub records: Arc<dyn RecordStore>,
    pub license_service: Arc<LicenseService>,
    pub registration_service: Arc<RegistrationService>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        ledger: Arc<dyn LicenseLedger>,
        accounts: Arc<dyn AccountStore>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours);
        let registration_service = Arc::new(RegistrationService::new(
            accounts,
            jwt.clone(),
            config.require_license_key,
            config.bcrypt_cost,
        ));

        Self {
            config: Arc::new(config),
            jwt,
            records,
            license_service: Arc::new(LicenseService::new(ledger)),
            registration_service,
        }
    }

    pub fn postgres(config: ServerConfig, pool: kindling_db::sqlx::PgPool) -> Self {
        Self::new(
            config,
            Arc::new(LicenseRepository::new(pool.clone())),
            Arc::new(UserRepository::new(pool.clone())),
            Arc::new(RecordRepository::new(pool)),
        )
    }

    pub fn in_memory(config: ServerConfig) -> Self {
        let store = MemoryStore::new();
        Self::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
        )
    }
}

pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/licenses",
            get(handlers::admin::list_keys).post(handlers::admin::generate_keys),
        )
        .route("/licenses/stats", get(handlers::admin::get_stats))
        .route("/licenses/{key}", get(handlers::admin::get_key))
        .route("/licenses/{key}/revoke", post(handlers::admin::revoke_key))
        .layer(middleware::from_fn_with_state(state.clone(), auth::admin_middleware));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/register", post(handlers::auth::register))
        .route("/api/login", post(handlers::auth::login))
        .route(
            "/api/records",
            get(handlers::records::list_records).post(handlers::records::add_record),
        )
        .route(
            "/api/records/{id}",
            put(handlers::records::update_record).delete(handlers::records::delete_record),
        )
        .nest("/api/admin", admin)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
