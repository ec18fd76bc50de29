//! Process configuration, read once from the environment (and `.env` when present).

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use thiserror::Error;
use tokio::sync::OnceCell;

use crate::constants::SERVER_PORT;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

pub async fn env() -> EnvResult<&'static Env> {
    ENV_VARS.get_or_try_init(|| async { Env::new() }).await
}

/// Fetches a string-valued variable, failing if an optional one was never set.
pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = env().await?;
    let value = match var {
        Var::DatabaseUrl => vars.database_url.as_deref(),
        Var::InternalToken => Some(vars.internal_token.as_str()),
        Var::CorsAllowOrigins => Some(vars.cors_allow_origins.as_str()),
        Var::OtelExporterEndpoint => vars.otel_exporter_otlp_endpoint.as_deref(),
        Var::ApiServiceName => Some(vars.api_service_name.as_str()),
        Var::ApiTracerName => Some(vars.api_tracer_name.as_str()),
    };

    value.ok_or_else(|| EnvErr::MissingValue(var.key().to_owned()))
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = EnvErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreKind::Postgres),
            "memory" | "mem" => Ok(StoreKind::Memory),
            other => Err(EnvErr::Invalid {
                key: Var::LEDGER_STORE.to_owned(),
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Env {
    pub database_url: Option<String>,
    pub ledger_store: StoreKind,
    pub server_api_port: u16,
    pub internal_token: String,
    pub cors_allow_origins: String,
    pub otel_exporter_otlp_endpoint: Option<String>,
    pub api_service_name: String,
    pub api_tracer_name: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Self::from_iter(dotenvy::vars())
    }

    pub fn from_iter<Iter>(iter: Iter) -> EnvResult<Self>
    where
        Iter: IntoIterator<Item = (String, String)>,
    {
        let mut vars: HashMap<String, String> = iter
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();

        let ledger_store = match vars.remove(Var::LEDGER_STORE) {
            Some(v) => v.parse()?,
            None => StoreKind::Postgres,
        };

        let server_api_port = match vars.remove(Var::SERVER_API_PORT) {
            Some(v) => v.trim().parse::<u16>().map_err(|_| EnvErr::Invalid {
                key: Var::SERVER_API_PORT.to_owned(),
                value: v,
            })?,
            None => SERVER_PORT,
        };

        let database_url = vars.remove(Var::DatabaseUrl.key());
        if ledger_store == StoreKind::Postgres && database_url.is_none() {
            return Err(EnvErr::MissingValue(Var::DatabaseUrl.key().to_owned()));
        }

        let internal_token = vars
            .remove(Var::InternalToken.key())
            .ok_or_else(|| EnvErr::MissingValue(Var::InternalToken.key().to_owned()))?;

        Ok(Self {
            database_url,
            ledger_store,
            server_api_port,
            internal_token,
            cors_allow_origins: vars
                .remove(Var::CorsAllowOrigins.key())
                .unwrap_or_else(|| "*".to_owned()),
            otel_exporter_otlp_endpoint: vars.remove(Var::OtelExporterEndpoint.key()),
            api_service_name: vars
                .remove(Var::ApiServiceName.key())
                .unwrap_or_else(|| "frequency-factory-api".to_owned()),
            api_tracer_name: vars
                .remove(Var::ApiTracerName.key())
                .unwrap_or_else(|| "frequency-factory-tracer".to_owned()),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Var {
    DatabaseUrl,
    InternalToken,
    CorsAllowOrigins,
    OtelExporterEndpoint,
    ApiServiceName,
    ApiTracerName,
}

impl Var {
    pub const LEDGER_STORE: &'static str = "LEDGER_STORE";
    pub const SERVER_API_PORT: &'static str = "SERVER_API_PORT";

    pub const fn key(&self) -> &'static str {
        match self {
            Var::DatabaseUrl => "DATABASE_URL",
            Var::InternalToken => "INTERNAL_TOKEN",
            Var::CorsAllowOrigins => "CORS_ALLOW_ORIGINS",
            Var::OtelExporterEndpoint => "OTEL_EXPORTER_OTLP_ENDPOINT",
            Var::ApiServiceName => "API_SERVICE_NAME",
            Var::ApiTracerName => "API_TRACER_NAME",
        }
    }
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error("missing required variable '{0}'")]
    MissingValue(String),

    #[error("invalid value '{value}' for '{key}'")]
    Invalid { key: String, value: String },
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_with_memory_store() {
        let env = Env::from_iter(vars(&[
            ("LEDGER_STORE", "memory"),
            ("INTERNAL_TOKEN", "hunter2"),
        ]))
        .unwrap();

        assert_eq!(env.ledger_store, StoreKind::Memory);
        assert_eq!(env.server_api_port, SERVER_PORT);
        assert_eq!(env.cors_allow_origins, "*");
        assert!(env.database_url.is_none());
        assert!(env.otel_exporter_otlp_endpoint.is_none());
        assert_eq!(env.api_service_name, "frequency-factory-api");
    }

    #[test]
    fn test_postgres_requires_database_url() {
        let err = Env::from_iter(vars(&[("INTERNAL_TOKEN", "hunter2")])).unwrap_err();
        assert!(matches!(err, EnvErr::MissingValue(k) if k == "DATABASE_URL"));

        let env = Env::from_iter(vars(&[
            ("INTERNAL_TOKEN", "hunter2"),
            ("DATABASE_URL", "postgres://localhost/ff"),
            ("SERVER_API_PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(env.ledger_store, StoreKind::Postgres);
        assert_eq!(env.server_api_port, 8080);
    }

    #[test]
    fn test_invalid_values() {
        let err = Env::from_iter(vars(&[
            ("LEDGER_STORE", "memory"),
            ("INTERNAL_TOKEN", "hunter2"),
            ("SERVER_API_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, EnvErr::Invalid { .. }));

        let err = Env::from_iter(vars(&[
            ("LEDGER_STORE", "redis"),
            ("INTERNAL_TOKEN", "hunter2"),
        ]))
        .unwrap_err();
        assert!(matches!(err, EnvErr::Invalid { key, .. } if key == "LEDGER_STORE"));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let err = Env::from_iter(vars(&[("LEDGER_STORE", "memory"), ("INTERNAL_TOKEN", "  ")]))
            .unwrap_err();
        assert!(matches!(err, EnvErr::MissingValue(k) if k == "INTERNAL_TOKEN"));
    }
}
