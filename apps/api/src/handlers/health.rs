use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::api_config::RateLimitStoreConfig;
use crate::dto::{HealthDependencyStatus, HealthResponse, RateLimitStoreHealth};
use crate::state::AppState;

mod checks;
mod handlers;

pub use handlers::health_handler;
