//! Layered configuration loader.

use std::{ffi::OsString, path::Path, time::Duration};

use super::{
    AppConfig, ConfigError, DatabaseConfig, InfluxDbConfig, JwtConfig, LogConfig, RedisConfig,
    ServerConfig, TelegramConfig,
    defaults::{self, builtin_defaults},
    provider::{DefaultsProvider, EnvProvider, FileProvider, Provider},
    validate::validate,
    value::{Layer, Value},
};

/// Loads configuration from defaults, an optional file and the environment,
/// in that order of increasing precedence.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    defaults: Layer,
    env: EnvProvider,
}

impl ConfigLoader {
    /// Creates a loader with the built-in defaults and the process environment.
    pub fn new() -> Self {
        Self {
            defaults: builtin_defaults(),
            env: EnvProvider::from_process(),
        }
    }

    /// Replaces the default table (useful for tests and alternate deployments).
    pub fn with_defaults(mut self, defaults: Layer) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replaces the process environment with a fixed snapshot.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env = EnvProvider::from_vars(vars);
        self
    }

    /// Loads, materializes and validates the configuration.
    ///
    /// An empty `path` behaves like `None`: only defaults and environment apply.
    pub fn load(&self, path: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let merged = self.merge(path)?;
        let config = materialize(&merged)?;

        let violations = validate(&config);
        if !violations.is_empty() {
            tracing::warn!(
                violations = violations.len(),
                "configuration failed validation"
            );
            return Err(ConfigError::Validation { violations });
        }

        tracing::debug!(
            developer_mode = config.developer_mode,
            port = config.www.port,
            "configuration loaded"
        );
        Ok(config)
    }

    fn providers(&self, path: Option<&Path>) -> Result<Vec<Box<dyn Provider>>, ConfigError> {
        let mut providers: Vec<Box<dyn Provider>> =
            vec![Box::new(DefaultsProvider::new(self.defaults.clone()))];

        if let Some(path) = path.filter(|path| !path.as_os_str().is_empty()) {
            let file = FileProvider::new(path)?;
            tracing::debug!(
                path = %file.path().display(),
                format = ?file.format(),
                "reading configuration file"
            );
            providers.push(Box::new(file));
        }

        providers.push(Box::new(self.env.clone()));
        Ok(providers)
    }

    fn merge(&self, path: Option<&Path>) -> Result<Layer, ConfigError> {
        let mut merged = Layer::new();
        for provider in self.providers(path)? {
            let layer = provider.collect()?;
            tracing::debug!(
                source = provider.name(),
                keys = layer.len(),
                "applied configuration layer"
            );
            merged.overlay(layer);
        }
        Ok(merged)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the typed configuration out of a merged layer.
pub fn materialize(layer: &Layer) -> Result<AppConfig, ConfigError> {
    let m = Materializer { layer };

    Ok(AppConfig {
        database: DatabaseConfig {
            postgres_url: m.string(defaults::POSTGRES_URL)?,
        },
        www: ServerConfig {
            port: m.integer(defaults::WWW_PORT)?,
        },
        jwt: JwtConfig {
            secret: m.string(defaults::JWT_SECRET)?,
            access_token_duration: m.duration(defaults::JWT_ACCESS_TOKEN_DURATION)?,
            refresh_token_duration: m.duration(defaults::JWT_REFRESH_TOKEN_DURATION)?,
            issuer: m.string(defaults::JWT_ISSUER)?,
        },
        log: LogConfig {
            out: m.string(defaults::LOG_OUT)?,
        },
        redis: RedisConfig {
            addr: m.string(defaults::REDIS_ADDR)?,
            password: m.string(defaults::REDIS_PASSWORD)?,
            db: m.integer(defaults::REDIS_DB)?,
        },
        telegram: TelegramConfig {
            bot_token: m.string(defaults::TELEGRAM_BOT_TOKEN)?,
        },
        influxdb: InfluxDbConfig {
            url: m.string(defaults::INFLUXDB_URL)?,
            token: m.string(defaults::INFLUXDB_TOKEN)?,
            org: m.string(defaults::INFLUXDB_ORG)?,
            bucket: m.string(defaults::INFLUXDB_BUCKET)?,
        },
        // TODO: settle on one developer-mode key once deployments stop
        // setting DEVELOPER_MODE.
        developer_mode: m.optional_boolean(defaults::DEVELOPER_MODE)?
            | m.boolean(defaults::DEV)?,
    })
}

struct Materializer<'a> {
    layer: &'a Layer,
}

impl Materializer<'_> {
    fn value(&self, key: &str, expected: &'static str) -> Result<&Value, ConfigError> {
        self.layer.get(key).ok_or_else(|| ConfigError::Parse {
            key: key.to_string(),
            expected,
            found: "nothing".to_string(),
        })
    }

    fn string(&self, key: &str) -> Result<String, ConfigError> {
        match self.value(key, "string")? {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s.clone()),
            scalar @ (Value::Bool(_) | Value::Integer(_) | Value::Float(_)) => {
                Ok(scalar.to_string())
            }
            other => Err(mismatch(key, "string", other)),
        }
    }

    fn integer(&self, key: &str) -> Result<i64, ConfigError> {
        match self.value(key, "integer")? {
            Value::Integer(i) => Ok(*i),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(*f as i64)
            }
            Value::String(s) => s
                .parse()
                .map_err(|_| mismatch(key, "integer", &Value::from(s.as_str()))),
            other => Err(mismatch(key, "integer", other)),
        }
    }

    fn boolean(&self, key: &str) -> Result<bool, ConfigError> {
        let value = self.value(key, "boolean")?;
        coerce_bool(value).ok_or_else(|| mismatch(key, "boolean", value))
    }

    fn optional_boolean(&self, key: &str) -> Result<bool, ConfigError> {
        match self.layer.get(key) {
            None => Ok(false),
            Some(_) => self.boolean(key),
        }
    }

    /// Negative literals such as `-5m` collapse to zero, leaving the
    /// rejection to validation.
    fn duration(&self, key: &str) -> Result<Duration, ConfigError> {
        let value = self.value(key, "duration")?;
        let Value::String(s) = value else {
            return Err(mismatch(key, "duration", value));
        };

        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let parsed =
            humantime::parse_duration(body).map_err(|_| mismatch(key, "duration", value))?;
        Ok(if negative { Duration::ZERO } else { parsed })
    }
}

/// Accepts native booleans, integers (non-zero is true) and the usual
/// boolean spellings. An empty string reads as false.
fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Integer(i) => Some(*i != 0),
        Value::String(s) => match s.as_str() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
            "" | "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn mismatch(key: &str, expected: &'static str, found: &Value) -> ConfigError {
    ConfigError::Parse {
        key: key.to_string(),
        expected,
        found: format!("{} '{}'", found.kind(), found),
    }
}
