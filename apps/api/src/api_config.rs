use std::collections::BTreeMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use handoff_application::MIN_SIGNING_SECRET_BYTES;
use handoff_core::AppError;
use handoff_domain::{AppTag, DestinationKind, RedirectTarget};
use ipnet::IpNet;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::redirects::HandoffDestinations;

const MIN_SERVICE_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStoreConfig {
    Postgres,
    Redis,
}

impl RateLimitStoreConfig {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Redis => "redis",
        }
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub public_base_url: Url,
    pub signing_secret: String,
    pub allowed_apps: Vec<AppTag>,
    pub destinations: HandoffDestinations,
    pub service_shared_secret: String,
    pub signed_token_ttl_seconds: i64,
    pub pending_token_ttl_minutes: i64,
    pub clock_skew_seconds: i64,
    pub rate_limit_store: RateLimitStoreConfig,
    pub redis_url: Option<String>,
    pub trusted_proxies: Vec<IpNet>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let public_base_url = parse_public_base_url(&required_non_empty_env("PUBLIC_BASE_URL")?)?;

        let signing_secret = required_env("HANDOFF_SIGNING_SECRET")?;
        if signing_secret.len() < MIN_SIGNING_SECRET_BYTES {
            return Err(AppError::Validation(format!(
                "HANDOFF_SIGNING_SECRET must be at least {MIN_SIGNING_SECRET_BYTES} characters"
            )));
        }

        let service_shared_secret = required_env("SERVICE_SHARED_SECRET")?;
        if service_shared_secret.len() < MIN_SERVICE_SECRET_LENGTH {
            return Err(AppError::Validation(format!(
                "SERVICE_SHARED_SECRET must be at least {MIN_SERVICE_SECRET_LENGTH} characters"
            )));
        }

        let allowed_apps = parse_allowed_apps(&required_non_empty_env("HANDOFF_ALLOWED_APPS")?)?;
        let default_destination = RedirectTarget::parse(&required_non_empty_env(
            "HANDOFF_DEFAULT_DESTINATION",
        )?)
        .map_err(|error| {
            AppError::Validation(format!("invalid HANDOFF_DEFAULT_DESTINATION: {error}"))
        })?;
        let per_app_destinations = parse_destinations(
            env::var("HANDOFF_DESTINATIONS").unwrap_or_default().as_str(),
            &allowed_apps,
        )?;

        let signed_token_ttl_seconds = positive_i64_env("SIGNED_TOKEN_TTL_SECONDS", 300)?;
        let pending_token_ttl_minutes = positive_i64_env("PENDING_TOKEN_TTL_MINUTES", 10)?;
        let clock_skew_seconds = positive_i64_env("CLOCK_SKEW_SECONDS", 30)?;

        let redis_url = env::var("REDIS_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let rate_limit_store = match env::var("RATE_LIMIT_STORE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => RateLimitStoreConfig::Postgres,
            "redis" => RateLimitStoreConfig::Redis,
            other => {
                return Err(AppError::Validation(format!(
                    "RATE_LIMIT_STORE must be either 'postgres' or 'redis', got '{other}'"
                )));
            }
        };
        if rate_limit_store == RateLimitStoreConfig::Redis && redis_url.is_none() {
            return Err(AppError::Validation(
                "REDIS_URL is required when RATE_LIMIT_STORE=redis".to_owned(),
            ));
        }

        let trusted_proxies =
            parse_trusted_proxies(env::var("TRUSTED_PROXY_CIDRS").unwrap_or_default().as_str())?;

        Ok(Self {
            migrate_only,
            database_url,
            api_host,
            api_port,
            public_base_url,
            signing_secret,
            allowed_apps,
            destinations: HandoffDestinations::new(default_destination, per_app_destinations),
            service_shared_secret,
            signed_token_ttl_seconds,
            pending_token_ttl_minutes,
            clock_skew_seconds,
            rate_limit_store,
            redis_url,
            trusted_proxies,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn positive_i64_env(name: &str, default: i64) -> Result<i64, AppError> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };

    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(AppError::Validation(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
    }
}

fn parse_public_base_url(raw: &str) -> Result<Url, AppError> {
    let target = RedirectTarget::parse(raw)
        .map_err(|error| AppError::Validation(format!("invalid PUBLIC_BASE_URL: {error}")))?;

    if target.kind() != DestinationKind::Web {
        return Err(AppError::Validation(
            "PUBLIC_BASE_URL must be an http or https url".to_owned(),
        ));
    }

    Ok(target.into_url())
}

/// Parses a comma-separated app allow-list.
pub(crate) fn parse_allowed_apps(raw: &str) -> Result<Vec<AppTag>, AppError> {
    let apps = raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(AppTag::new)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| AppError::Validation(format!("invalid HANDOFF_ALLOWED_APPS: {error}")))?;

    if apps.is_empty() {
        return Err(AppError::Validation(
            "HANDOFF_ALLOWED_APPS must list at least one app".to_owned(),
        ));
    }

    Ok(apps)
}

/// Parses `app=url` pairs. Every app must also be on the allow-list.
pub(crate) fn parse_destinations(
    raw: &str,
    allowed_apps: &[AppTag],
) -> Result<BTreeMap<AppTag, RedirectTarget>, AppError> {
    let mut destinations = BTreeMap::new();

    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let Some((app, url)) = entry.split_once('=') else {
            return Err(AppError::Validation(format!(
                "HANDOFF_DESTINATIONS entry '{entry}' must look like app=url"
            )));
        };

        let app = AppTag::new(app.trim())?;
        if !allowed_apps.contains(&app) {
            return Err(AppError::Validation(format!(
                "HANDOFF_DESTINATIONS names '{app}' which is not in HANDOFF_ALLOWED_APPS"
            )));
        }

        let target = RedirectTarget::parse(url).map_err(|error| {
            AppError::Validation(format!("invalid destination for '{app}': {error}"))
        })?;

        if destinations.insert(app.clone(), target).is_some() {
            return Err(AppError::Validation(format!(
                "HANDOFF_DESTINATIONS lists '{app}' more than once"
            )));
        }
    }

    Ok(destinations)
}

/// Parses comma-separated proxy networks. Bare addresses become host networks.
pub(crate) fn parse_trusted_proxies(raw: &str) -> Result<Vec<IpNet>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            if let Ok(network) = IpNet::from_str(value) {
                return Ok(network);
            }

            let invalid = |error: &dyn std::fmt::Display| {
                AppError::Validation(format!("invalid TRUSTED_PROXY_CIDRS entry '{value}': {error}"))
            };
            let address = IpAddr::from_str(value).map_err(|error| invalid(&error))?;
            let host_prefix = if address.is_ipv4() { 32 } else { 128 };
            IpNet::new(address, host_prefix).map_err(|error| invalid(&error))
        })
        .collect()
}
