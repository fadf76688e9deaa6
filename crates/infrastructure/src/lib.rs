//! Infrastructure adapters for handoff application ports.

#![forbid(unsafe_code)]

mod in_memory_handoff_store;
mod postgres_access_grant_repository;
mod postgres_rate_limit_repository;
mod postgres_short_code_repository;
mod redis_rate_limit_repository;
mod storage_error;

pub use in_memory_handoff_store::InMemoryHandoffStore;
pub use postgres_access_grant_repository::PostgresAccessGrantRepository;
pub use postgres_rate_limit_repository::PostgresRateLimitRepository;
pub use postgres_short_code_repository::PostgresShortCodeRepository;
pub use redis_rate_limit_repository::RedisRateLimitRepository;
