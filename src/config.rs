//! Configuration.
//!
//! Loaded from YAML files and environment variables. Request ID options can
//! also be built directly in code.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

use crate::error::RequestIdError;
use crate::generator::UuidGenerator;
use crate::request_id::RequestId;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "REQUESTID_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "REQUESTID";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "REQUESTID_LOG";

/// Where a request ID is mirrored on the call context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Do not write any context field.
    Disabled,
    /// Write the ID into the named field. Field names keep their casing.
    Field(String),
}

impl Target {
    /// Target a named field. An empty name disables mirroring.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Target::Disabled
        } else {
            Target::Field(name)
        }
    }

    /// The field name, if mirroring is enabled.
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Target::Field(name) if !name.is_empty() => Some(name),
            _ => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.as_field().is_none()
    }
}

/// Booleans never name a field: both `false` and `true` disable mirroring.
impl From<bool> for Target {
    fn from(_: bool) -> Self {
        Target::Disabled
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::field(name)
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::field(name)
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Field(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(flag) => Target::from(flag),
            Raw::Field(name) => Target::field(name),
        })
    }
}

/// Lenient form of [`Target`] for configuration sources: non-string,
/// non-boolean values (numbers, maps, null) read as unset.
fn deserialize_optional_target<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Target>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Field(String),
        Other(IgnoredAny),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Flag(flag) => Some(Target::from(flag)),
        Raw::Field(name) => Some(Target::field(name)),
        Raw::Other(_) => None,
    })
}

/// Request ID middleware options.
///
/// ```yaml
/// request_id:
///   name: x-request-id
///   target: requestId      # or `false` to skip mirroring
///   generator: uuid_v7
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestIdOptions {
    /// Metadata key. Defaults to `requestId`.
    pub name: Option<String>,
    /// Context field. Defaults to `name` with its original casing, which is
    /// also what a value that is neither a string nor a boolean resolves to.
    #[serde(deserialize_with = "deserialize_optional_target")]
    pub target: Option<Target>,
    /// Built-in generator.
    pub generator: UuidGenerator,
}

impl RequestIdOptions {
    /// Resolve defaults and validate.
    pub fn build(&self) -> Result<RequestId, RequestIdError> {
        let mut builder = RequestId::builder().generator(self.generator);
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        if let Some(target) = &self.target {
            builder = builder.target(target.clone());
        }
        builder.build()
    }
}

/// gRPC server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Request ID middleware options.
    pub request_id: RequestIdOptions,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }
}
