use crate::{ConfigError, DEFAULT_CONCURRENCY, DEFAULT_REPEAT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::{NonZeroU32, NonZeroUsize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a single benchmark run.
///
/// Field names follow the JSON config file, e.g.
///
/// ```json
/// {
///     "httpAddress": "http://localhost:8250",
///     "csv": "ids.csv",
///     "account": "demo",
///     "table": "users",
///     "concurrency": 20,
///     "repeat": 2,
///     "timeout": "5s"
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default, rename = "httpAddress")]
    pub http_address: Option<String>,
    #[serde(default, rename = "grpcAddress")]
    pub grpc_address: Option<String>,
    #[serde(default, rename = "csv")]
    pub csv_path: Option<PathBuf>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    #[serde(default, rename = "jwt")]
    pub token: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default, with = "humantime_opt")]
    pub timeout: Option<Duration>,
    #[serde(default, rename = "maxRps")]
    pub max_rps: Option<NonZeroU32>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            http_address: None,
            grpc_address: None,
            csv_path: None,
            concurrency: DEFAULT_CONCURRENCY,
            repeat: DEFAULT_REPEAT,
            token: None,
            account: None,
            table: None,
            timeout: None,
            max_rps: None,
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_repeat() -> usize {
    DEFAULT_REPEAT
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn concurrency(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.concurrency).ok_or(ConfigError::Zero("concurrency"))
    }

    pub fn repeat(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.repeat).ok_or(ConfigError::Zero("repeat"))
    }

    /// Validate everything a run over `kind` needs and resolve the endpoint it will hit.
    pub fn target(&self, kind: TransportKind) -> Result<Target, ConfigError> {
        self.concurrency()?;
        self.repeat()?;

        let address = match kind {
            TransportKind::Http => non_empty(&self.http_address),
            TransportKind::Rpc => non_empty(&self.grpc_address),
        }
        .ok_or(ConfigError::MissingAddress(kind.name()))?;

        let account = non_empty(&self.account).ok_or(ConfigError::MissingField("account"))?;
        let table = non_empty(&self.table).ok_or(ConfigError::MissingField("table"))?;

        Ok(Target {
            address: address.to_string(),
            account: account.to_string(),
            table: table.to_string(),
            token: non_empty(&self.token).map(str::to_string),
            timeout: self.timeout,
        })
    }
}

// The config format writes absent strings as "".
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    Rpc,
}

impl TransportKind {
    pub fn name(&self) -> &'static str {
        match self {
            TransportKind::Http => "HTTP",
            TransportKind::Rpc => "gRPC",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated endpoint identity handed to transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub address: String,
    pub account: String,
    pub table: String,
    pub token: Option<String>,
    pub timeout: Option<Duration>,
}

impl Target {
    pub fn bearer(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {token}"))
    }
}

mod humantime_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(dur) => s.serialize_some(&humantime::format_duration(*dur).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => humantime::parse_duration(value)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
