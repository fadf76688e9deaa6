//! Rate limiting ports and application service.
//!
//! Counts attempts per key in fixed windows through a pluggable
//! [`RateLimitRepository`]. Counting is advisory: when the backing store is
//! unreachable the attempt is permitted and a warning is logged.

mod config;
mod ports;
mod service;

pub use config::RateLimitRule;
pub use ports::{AttemptInfo, RateLimitRepository};
pub use service::RateLimitService;

#[cfg(test)]
mod tests;
