use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub dimensions: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub transport: TransportKind,
    pub bind_address: String,
    pub port: u16,
    pub mount_path: String,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub api_key: Option<SecretString>,
    pub requests_per_minute: u32,
    pub rate_limit_window_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    Gemini,
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Http,
    Stdio,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub transport: Option<TransportKind>,
    pub port: Option<u16>,
    pub embedding_provider: Option<EmbeddingProviderKind>,
    pub embedding_api_key: Option<String>,
    pub auth_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://puddle.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            embedding: EmbeddingConfig {
                provider: EmbeddingProviderKind::Gemini,
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-embedding-001".to_string(),
                dimensions: 1536,
                timeout_secs: 15,
            },
            server: ServerConfig {
                transport: TransportKind::Http,
                bind_address: "0.0.0.0".to_string(),
                port: 8002,
                mount_path: "/puddle-mcp".to_string(),
                graceful_shutdown_secs: 15,
            },
            auth: AuthConfig { api_key: None, requests_per_minute: 120, rate_limit_window_secs: 60 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for EmbeddingProviderKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "disabled" | "none" => Ok(Self::Disabled),
            other => Err(ConfigError::Validation(format!(
                "unsupported embedding provider `{other}` (expected gemini|disabled)"
            ))),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" | "streamable_http" => Ok(Self::Http),
            "stdio" => Ok(Self::Stdio),
            other => Err(ConfigError::Validation(format!(
                "unsupported server transport `{other}` (expected http|stdio)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl EmbeddingProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Disabled => "disabled",
        }
    }
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Stdio => "stdio",
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("puddle.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// The config file `load` would read for `explicit_path`, if any.
    pub fn resolve_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
        resolve_config_path(explicit_path)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(provider) = embedding.provider {
                self.embedding.provider = provider;
            }
            if let Some(api_key) = embedding.api_key {
                self.embedding.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = base_url;
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                self.embedding.dimensions = dimensions;
            }
            if let Some(timeout_secs) = embedding.timeout_secs {
                self.embedding.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(transport) = server.transport {
                self.server.transport = transport;
            }
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(mount_path) = server.mount_path {
                self.server.mount_path = mount_path;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(api_key) = auth.api_key {
                self.auth.api_key = Some(secret_value(api_key));
            }
            if let Some(requests_per_minute) = auth.requests_per_minute {
                self.auth.requests_per_minute = requests_per_minute;
            }
            if let Some(rate_limit_window_secs) = auth.rate_limit_window_secs {
                self.auth.rate_limit_window_secs = rate_limit_window_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PUDDLE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PUDDLE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("PUDDLE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PUDDLE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PUDDLE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PUDDLE_EMBEDDING_PROVIDER") {
            self.embedding.provider = value.parse()?;
        }
        let embedding_key =
            read_env("PUDDLE_EMBEDDING_API_KEY").or_else(|| read_env("GEMINI_API_KEY"));
        if let Some(value) = embedding_key {
            self.embedding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PUDDLE_EMBEDDING_BASE_URL") {
            self.embedding.base_url = value;
        }
        if let Some(value) = read_env("PUDDLE_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = read_env("PUDDLE_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = parse_u32("PUDDLE_EMBEDDING_DIMENSIONS", &value)?;
        }
        if let Some(value) = read_env("PUDDLE_EMBEDDING_TIMEOUT_SECS") {
            self.embedding.timeout_secs = parse_u64("PUDDLE_EMBEDDING_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PUDDLE_SERVER_TRANSPORT") {
            self.server.transport = value.parse()?;
        }
        if let Some(value) = read_env("PUDDLE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PUDDLE_SERVER_PORT") {
            self.server.port = parse_u16("PUDDLE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PUDDLE_SERVER_MOUNT_PATH") {
            self.server.mount_path = value;
        }
        if let Some(value) = read_env("PUDDLE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PUDDLE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("PUDDLE_AUTH_API_KEY") {
            self.auth.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PUDDLE_AUTH_REQUESTS_PER_MINUTE") {
            self.auth.requests_per_minute = parse_u32("PUDDLE_AUTH_REQUESTS_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("PUDDLE_AUTH_RATE_LIMIT_WINDOW_SECS") {
            self.auth.rate_limit_window_secs =
                parse_u64("PUDDLE_AUTH_RATE_LIMIT_WINDOW_SECS", &value)?;
        }

        let log_level = read_env("PUDDLE_LOGGING_LEVEL").or_else(|| read_env("PUDDLE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PUDDLE_LOGGING_FORMAT").or_else(|| read_env("PUDDLE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(transport) = overrides.transport {
            self.server.transport = transport;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(provider) = overrides.embedding_provider {
            self.embedding.provider = provider;
        }
        if let Some(api_key) = overrides.embedding_api_key {
            self.embedding.api_key = Some(secret_value(api_key));
        }
        if let Some(api_key) = overrides.auth_api_key {
            self.auth.api_key = Some(secret_value(api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_embedding(&self.embedding)?;
        validate_server(&self.server)?;
        validate_auth(&self.auth, self.server.transport)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("puddle.toml"), PathBuf::from("config/puddle.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    if embedding.provider == EmbeddingProviderKind::Disabled {
        return Ok(());
    }

    let missing = embedding
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "embedding.api_key is required for the gemini provider (set PUDDLE_EMBEDDING_API_KEY or use provider = \"disabled\")"
                .to_string(),
        ));
    }

    let base_url = embedding.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "embedding.base_url must start with http:// or https://".to_string(),
        ));
    }

    if embedding.model.trim().is_empty() {
        return Err(ConfigError::Validation("embedding.model must not be empty".to_string()));
    }

    if embedding.dimensions == 0 || embedding.dimensions > 3072 {
        return Err(ConfigError::Validation(
            "embedding.dimensions must be in range 1..=3072".to_string(),
        ));
    }

    if embedding.timeout_secs == 0 || embedding.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "embedding.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    let mount_path = server.mount_path.trim();
    if !mount_path.starts_with('/') || mount_path == "/" || mount_path == "/health" {
        return Err(ConfigError::Validation(
            "server.mount_path must start with `/` and must not be `/` or `/health`".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig, transport: TransportKind) -> Result<(), ConfigError> {
    if transport == TransportKind::Http {
        let missing = auth
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "auth.api_key is required for the http transport (set PUDDLE_AUTH_API_KEY)"
                    .to_string(),
            ));
        }
    }

    if auth.requests_per_minute == 0 {
        return Err(ConfigError::Validation(
            "auth.requests_per_minute must be greater than zero".to_string(),
        ));
    }

    if auth.rate_limit_window_secs == 0 {
        return Err(ConfigError::Validation(
            "auth.rate_limit_window_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    embedding: Option<EmbeddingPatch>,
    server: Option<ServerPatch>,
    auth: Option<AuthPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    provider: Option<EmbeddingProviderKind>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    dimensions: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    transport: Option<TransportKind>,
    bind_address: Option<String>,
    port: Option<u16>,
    mount_path: Option<String>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    api_key: Option<String>,
    requests_per_minute: Option<u32>,
    rate_limit_window_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        AppConfig, ConfigError, ConfigOverrides, EmbeddingProviderKind, LoadOptions, LogFormat,
        TransportKind,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const KEY_VARS: [&str; 2] = ["PUDDLE_EMBEDDING_API_KEY", "PUDDLE_AUTH_API_KEY"];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn set_keys() {
        env::set_var("PUDDLE_EMBEDDING_API_KEY", "gemini-test-key");
        env::set_var("PUDDLE_AUTH_API_KEY", "pk_test_key");
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GEMINI_KEY", "gemini-from-env");
        env::set_var("TEST_MCP_KEY", "pk_from_env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("puddle.toml");
            fs::write(
                &path,
                r#"
[embedding]
api_key = "${TEST_GEMINI_KEY}"

[auth]
api_key = "${TEST_MCP_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config
                    .embedding
                    .api_key
                    .as_ref()
                    .is_some_and(|key| key.expose_secret() == "gemini-from-env"),
                "embedding key should be loaded from environment",
            )?;
            ensure(
                config.auth.api_key.as_ref().is_some_and(|key| key.expose_secret() == "pk_from_env"),
                "auth key should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_GEMINI_KEY", "TEST_MCP_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("puddle.toml");
        fs::write(&path, "[auth]\napi_key = \"${PUDDLE_TEST_UNSET_VARIABLE}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(
                error,
                ConfigError::MissingEnvInterpolation { ref var } if var == "PUDDLE_TEST_UNSET_VARIABLE"
            ),
            "missing variable should be named",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_keys();
        env::set_var("PUDDLE_LOG_LEVEL", "warn");
        env::set_var("PUDDLE_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&KEY_VARS);
        clear_vars(&["PUDDLE_LOG_LEVEL", "PUDDLE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_keys();
        env::set_var("PUDDLE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("PUDDLE_SERVER_PORT", "9100");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("puddle.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"
max_connections = 9

[server]
port = 9000
mount_path = "/mcp"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.database.max_connections == 9, "file value should beat the default")?;
            ensure(config.server.port == 9100, "env port should win over the file")?;
            ensure(config.server.mount_path == "/mcp", "file mount path should be applied")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.embedding.model == "gemini-embedding-001",
                "untouched values keep their defaults",
            )?;
            Ok(())
        })();

        clear_vars(&KEY_VARS);
        clear_vars(&["PUDDLE_DATABASE_URL", "PUDDLE_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        clear_vars(&KEY_VARS);
        clear_vars(&["GEMINI_API_KEY"]);
        env::set_var("PUDDLE_AUTH_API_KEY", "pk_test_key");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("embedding.api_key")
            );
            ensure(has_message, "validation failure should mention embedding.api_key")
        })();

        clear_vars(&KEY_VARS);
        result
    }

    #[test]
    fn stdio_transport_with_disabled_embeddings_needs_no_secrets() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        clear_vars(&KEY_VARS);
        clear_vars(&["GEMINI_API_KEY"]);

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                transport: Some(TransportKind::Stdio),
                embedding_provider: Some(EmbeddingProviderKind::Disabled),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.server.transport == TransportKind::Stdio, "stdio override applies")?;
        ensure(config.auth.api_key.is_none(), "no auth key configured")
    }

    #[test]
    fn invalid_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_keys();
        env::set_var("PUDDLE_SERVER_PORT", "not-a-port");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override failure".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "PUDDLE_SERVER_PORT"),
                "invalid port should name the variable",
            ),
        };

        clear_vars(&KEY_VARS);
        clear_vars(&["PUDDLE_SERVER_PORT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PUDDLE_EMBEDDING_API_KEY", "gemini-secret-value");
        env::set_var("PUDDLE_AUTH_API_KEY", "pk_secret_value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("gemini-secret-value"),
                "debug output should not contain the embedding key",
            )?;
            ensure(!debug.contains("pk_secret_value"), "debug output should not contain the auth key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&KEY_VARS);
        result
    }
}
