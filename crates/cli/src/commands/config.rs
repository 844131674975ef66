use std::env;
use std::fs;
use std::path::Path;

use crate::commands::CommandResult;
use puddle_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

struct Field<'a> {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: &'a str,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = AppConfig::resolve_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    CommandResult::success(
        "config",
        render(&config, config_file_doc.as_ref(), config_file_path.as_deref()),
    )
}

fn render(config: &AppConfig, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    let max_connections = config.database.max_connections.to_string();
    let timeout_secs = config.database.timeout_secs.to_string();
    let dimensions = config.embedding.dimensions.to_string();
    let embedding_timeout = config.embedding.timeout_secs.to_string();
    let embedding_key = redact_secret(config.embedding.api_key.as_ref());
    let port = config.server.port.to_string();
    let grace = config.server.graceful_shutdown_secs.to_string();
    let auth_key = redact_secret(config.auth.api_key.as_ref());
    let requests_per_minute = config.auth.requests_per_minute.to_string();
    let window = config.auth.rate_limit_window_secs.to_string();

    let fields = [
        Field {
            key_path: "database.url",
            env_keys: &["PUDDLE_DATABASE_URL"],
            value: &config.database.url,
        },
        Field {
            key_path: "database.max_connections",
            env_keys: &["PUDDLE_DATABASE_MAX_CONNECTIONS"],
            value: &max_connections,
        },
        Field {
            key_path: "database.timeout_secs",
            env_keys: &["PUDDLE_DATABASE_TIMEOUT_SECS"],
            value: &timeout_secs,
        },
        Field {
            key_path: "embedding.provider",
            env_keys: &["PUDDLE_EMBEDDING_PROVIDER"],
            value: config.embedding.provider.as_str(),
        },
        Field {
            key_path: "embedding.api_key",
            env_keys: &["PUDDLE_EMBEDDING_API_KEY", "GEMINI_API_KEY"],
            value: &embedding_key,
        },
        Field {
            key_path: "embedding.base_url",
            env_keys: &["PUDDLE_EMBEDDING_BASE_URL"],
            value: &config.embedding.base_url,
        },
        Field {
            key_path: "embedding.model",
            env_keys: &["PUDDLE_EMBEDDING_MODEL"],
            value: &config.embedding.model,
        },
        Field {
            key_path: "embedding.dimensions",
            env_keys: &["PUDDLE_EMBEDDING_DIMENSIONS"],
            value: &dimensions,
        },
        Field {
            key_path: "embedding.timeout_secs",
            env_keys: &["PUDDLE_EMBEDDING_TIMEOUT_SECS"],
            value: &embedding_timeout,
        },
        Field {
            key_path: "server.transport",
            env_keys: &["PUDDLE_SERVER_TRANSPORT"],
            value: config.server.transport.as_str(),
        },
        Field {
            key_path: "server.bind_address",
            env_keys: &["PUDDLE_SERVER_BIND_ADDRESS"],
            value: &config.server.bind_address,
        },
        Field { key_path: "server.port", env_keys: &["PUDDLE_SERVER_PORT"], value: &port },
        Field {
            key_path: "server.mount_path",
            env_keys: &["PUDDLE_SERVER_MOUNT_PATH"],
            value: &config.server.mount_path,
        },
        Field {
            key_path: "server.graceful_shutdown_secs",
            env_keys: &["PUDDLE_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: &grace,
        },
        Field { key_path: "auth.api_key", env_keys: &["PUDDLE_AUTH_API_KEY"], value: &auth_key },
        Field {
            key_path: "auth.requests_per_minute",
            env_keys: &["PUDDLE_AUTH_REQUESTS_PER_MINUTE"],
            value: &requests_per_minute,
        },
        Field {
            key_path: "auth.rate_limit_window_secs",
            env_keys: &["PUDDLE_AUTH_RATE_LIMIT_WINDOW_SECS"],
            value: &window,
        },
        Field {
            key_path: "logging.level",
            env_keys: &["PUDDLE_LOGGING_LEVEL", "PUDDLE_LOG_LEVEL"],
            value: &config.logging.level,
        },
        Field {
            key_path: "logging.format",
            env_keys: &["PUDDLE_LOGGING_FORMAT", "PUDDLE_LOG_FORMAT"],
            value: config.logging.format.as_str(),
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields.iter().map(|field| {
        let source = field_source(field.key_path, field.env_keys, file_doc, file_path);
        render_line(field.key_path, field.value, source)
    }));
    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a recognizable key prefix such as `pk_` and hides the rest.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('_') {
        return format!("{prefix}_***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_keep_only_their_prefix() {
        let prefixed = SecretString::from("pk_live_0123456789".to_string());
        let opaque = SecretString::from("AIzaSyD-opaque".to_string());

        assert_eq!(redact_secret(Some(&prefixed)), "pk_***");
        assert_eq!(redact_secret(Some(&opaque)), "<redacted>");
        assert_eq!(redact_secret(None), "<unset>");
    }

    #[test]
    fn nested_keys_are_found_in_config_documents() {
        let doc: Value = "[auth]\nrequests_per_minute = 10\n".parse().expect("toml");

        assert!(contains_path(&doc, "auth.requests_per_minute"));
        assert!(!contains_path(&doc, "auth.api_key"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
