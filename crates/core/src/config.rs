use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub assistant: AssistantConfig,
    pub guardrails: GuardrailConfig,
    pub sessions: SessionConfig,
    pub approvals: ApprovalConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub classifier_model: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub run_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GuardrailConfig {
    pub enabled: bool,
    pub moderation_enabled: bool,
    /// When the moderation service is unreachable, pass the message through
    /// rather than blocking legitimate users on infrastructure failure.
    /// Deliberate, documented trade-off kept as an explicit flag.
    pub fail_open: bool,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub recent_cap: usize,
}

#[derive(Clone, Debug)]
pub struct ApprovalConfig {
    /// When disabled, sensitive actions execute without pausing for a human
    /// decision. Operator policy choice.
    pub human_in_the_loop: bool,
    pub sensitive_tools: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub assistant_base_url: Option<String>,
    pub assistant_api_key: Option<String>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub guardrails_enabled: Option<bool>,
    pub human_in_the_loop: Option<bool>,
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
            assistant: AssistantConfig {
                base_url: "http://localhost:11434".to_string(),
                api_key: None,
                classifier_model: "support-intent-v1".to_string(),
                request_timeout_secs: 30,
                poll_interval_ms: 750,
                run_timeout_secs: 60,
            },
            guardrails: GuardrailConfig { enabled: true, moderation_enabled: true, fail_open: true },
            sessions: SessionConfig { ttl_secs: 1800, sweep_interval_secs: 300, recent_cap: 10 },
            approvals: ApprovalConfig {
                human_in_the_loop: true,
                sensitive_tools: vec![
                    "delete_record".to_string(),
                    "modify_record".to_string(),
                    "bulk_update_records".to_string(),
                    "export_records".to_string(),
                ],
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("permitdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(assistant) = patch.assistant {
            if let Some(base_url) = assistant.base_url {
                self.assistant.base_url = base_url;
            }
            if let Some(api_key_value) = assistant.api_key {
                self.assistant.api_key = Some(secret_value(api_key_value));
            }
            if let Some(classifier_model) = assistant.classifier_model {
                self.assistant.classifier_model = classifier_model;
            }
            if let Some(request_timeout_secs) = assistant.request_timeout_secs {
                self.assistant.request_timeout_secs = request_timeout_secs;
            }
            if let Some(poll_interval_ms) = assistant.poll_interval_ms {
                self.assistant.poll_interval_ms = poll_interval_ms;
            }
            if let Some(run_timeout_secs) = assistant.run_timeout_secs {
                self.assistant.run_timeout_secs = run_timeout_secs;
            }
        }

        if let Some(guardrails) = patch.guardrails {
            if let Some(enabled) = guardrails.enabled {
                self.guardrails.enabled = enabled;
            }
            if let Some(moderation_enabled) = guardrails.moderation_enabled {
                self.guardrails.moderation_enabled = moderation_enabled;
            }
            if let Some(fail_open) = guardrails.fail_open {
                self.guardrails.fail_open = fail_open;
            }
        }

        if let Some(sessions) = patch.sessions {
            if let Some(ttl_secs) = sessions.ttl_secs {
                self.sessions.ttl_secs = ttl_secs;
            }
            if let Some(sweep_interval_secs) = sessions.sweep_interval_secs {
                self.sessions.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(recent_cap) = sessions.recent_cap {
                self.sessions.recent_cap = recent_cap;
            }
        }

        if let Some(approvals) = patch.approvals {
            if let Some(human_in_the_loop) = approvals.human_in_the_loop {
                self.approvals.human_in_the_loop = human_in_the_loop;
            }
            if let Some(sensitive_tools) = approvals.sensitive_tools {
                self.approvals.sensitive_tools = sensitive_tools;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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
        if let Some(value) = read_env("PERMITDESK_ASSISTANT_BASE_URL") {
            self.assistant.base_url = value;
        }
        if let Some(value) = read_env("PERMITDESK_ASSISTANT_API_KEY") {
            self.assistant.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PERMITDESK_ASSISTANT_CLASSIFIER_MODEL") {
            self.assistant.classifier_model = value;
        }
        if let Some(value) = read_env("PERMITDESK_ASSISTANT_REQUEST_TIMEOUT_SECS") {
            self.assistant.request_timeout_secs =
                parse_u64("PERMITDESK_ASSISTANT_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_ASSISTANT_POLL_INTERVAL_MS") {
            self.assistant.poll_interval_ms =
                parse_u64("PERMITDESK_ASSISTANT_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_ASSISTANT_RUN_TIMEOUT_SECS") {
            self.assistant.run_timeout_secs =
                parse_u64("PERMITDESK_ASSISTANT_RUN_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PERMITDESK_GUARDRAILS_ENABLED") {
            self.guardrails.enabled = parse_bool("PERMITDESK_GUARDRAILS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_GUARDRAILS_MODERATION_ENABLED") {
            self.guardrails.moderation_enabled =
                parse_bool("PERMITDESK_GUARDRAILS_MODERATION_ENABLED", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_GUARDRAILS_FAIL_OPEN") {
            self.guardrails.fail_open = parse_bool("PERMITDESK_GUARDRAILS_FAIL_OPEN", &value)?;
        }

        if let Some(value) = read_env("PERMITDESK_SESSIONS_TTL_SECS") {
            self.sessions.ttl_secs = parse_u64("PERMITDESK_SESSIONS_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_SESSIONS_SWEEP_INTERVAL_SECS") {
            self.sessions.sweep_interval_secs =
                parse_u64("PERMITDESK_SESSIONS_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_SESSIONS_RECENT_CAP") {
            self.sessions.recent_cap =
                parse_u64("PERMITDESK_SESSIONS_RECENT_CAP", &value)? as usize;
        }

        if let Some(value) = read_env("PERMITDESK_APPROVALS_HUMAN_IN_THE_LOOP") {
            self.approvals.human_in_the_loop =
                parse_bool("PERMITDESK_APPROVALS_HUMAN_IN_THE_LOOP", &value)?;
        }

        if let Some(value) = read_env("PERMITDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PERMITDESK_SERVER_PORT") {
            self.server.port = parse_u16("PERMITDESK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PERMITDESK_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PERMITDESK_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PERMITDESK_LOGGING_LEVEL").or_else(|| read_env("PERMITDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PERMITDESK_LOGGING_FORMAT").or_else(|| read_env("PERMITDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.assistant_base_url {
            self.assistant.base_url = base_url;
        }
        if let Some(api_key) = overrides.assistant_api_key {
            self.assistant.api_key = Some(secret_value(api_key));
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(guardrails_enabled) = overrides.guardrails_enabled {
            self.guardrails.enabled = guardrails_enabled;
        }
        if let Some(human_in_the_loop) = overrides.human_in_the_loop {
            self.approvals.human_in_the_loop = human_in_the_loop;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_assistant(&self.assistant)?;
        validate_sessions(&self.sessions)?;
        validate_approvals(&self.approvals)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("permitdesk.toml"), PathBuf::from("config/permitdesk.toml")]
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

fn validate_assistant(assistant: &AssistantConfig) -> Result<(), ConfigError> {
    let base_url = assistant.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "assistant.base_url must start with http:// or https://".to_string(),
        ));
    }

    if assistant.request_timeout_secs == 0 || assistant.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "assistant.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if assistant.poll_interval_ms == 0 || assistant.poll_interval_ms > 10_000 {
        return Err(ConfigError::Validation(
            "assistant.poll_interval_ms must be in range 1..=10000".to_string(),
        ));
    }

    if assistant.run_timeout_secs == 0 || assistant.run_timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "assistant.run_timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if assistant.run_timeout_secs * 1000 < assistant.poll_interval_ms {
        return Err(ConfigError::Validation(
            "assistant.run_timeout_secs must cover at least one poll interval".to_string(),
        ));
    }

    if assistant.classifier_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "assistant.classifier_model must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_sessions(sessions: &SessionConfig) -> Result<(), ConfigError> {
    if sessions.ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "sessions.ttl_secs must be greater than zero".to_string(),
        ));
    }

    if sessions.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "sessions.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    if sessions.recent_cap == 0 || sessions.recent_cap > 100 {
        return Err(ConfigError::Validation(
            "sessions.recent_cap must be in range 1..=100".to_string(),
        ));
    }

    Ok(())
}

fn validate_approvals(approvals: &ApprovalConfig) -> Result<(), ConfigError> {
    if approvals.human_in_the_loop && approvals.sensitive_tools.is_empty() {
        return Err(ConfigError::Validation(
            "approvals.human_in_the_loop is true but approvals.sensitive_tools is empty"
                .to_string(),
        ));
    }

    for tool in &approvals.sensitive_tools {
        if tool.trim().is_empty() {
            return Err(ConfigError::Validation(
                "approvals.sensitive_tools must not contain empty names".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
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

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    assistant: Option<AssistantPatch>,
    guardrails: Option<GuardrailPatch>,
    sessions: Option<SessionPatch>,
    approvals: Option<ApprovalPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    classifier_model: Option<String>,
    request_timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    run_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GuardrailPatch {
    enabled: Option<bool>,
    moderation_enabled: Option<bool>,
    fail_open: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    ttl_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    recent_cap: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ApprovalPatch {
    human_in_the_loop: Option<bool>,
    sensitive_tools: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
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

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_pipeline_contract() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.sessions.ttl_secs == 1800, "session ttl should default to 30 minutes")?;
        ensure(
            config.sessions.sweep_interval_secs == 300,
            "sweep interval should default to 5 minutes",
        )?;
        ensure(config.sessions.recent_cap == 10, "recent list cap should default to 10")?;
        ensure(config.guardrails.fail_open, "moderation should fail open by default")?;
        ensure(config.approvals.human_in_the_loop, "human-in-the-loop should default on")?;
        ensure(
            config.approvals.sensitive_tools.iter().any(|tool| tool == "delete_record"),
            "delete_record should be on the default sensitive list",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_ASSISTANT_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("permitdesk.toml");
            fs::write(
                &path,
                r#"
[assistant]
api_key = "${TEST_ASSISTANT_API_KEY}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let api_key = config
                .assistant
                .api_key
                .as_ref()
                .map(|key| key.expose_secret().to_owned())
                .unwrap_or_default();
            ensure(api_key == "sk-from-env", "api key should be loaded from environment")
        })();

        clear_vars(&["TEST_ASSISTANT_API_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PERMITDESK_ASSISTANT_BASE_URL", "http://from-env:9000");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("permitdesk.toml");
            fs::write(
                &path,
                r#"
[assistant]
base_url = "http://from-file:8000"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.assistant.base_url == "http://from-env:9000",
                "env base url should win over file and defaults",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should win over file")
        })();

        clear_vars(&["PERMITDESK_ASSISTANT_BASE_URL"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PERMITDESK_LOG_LEVEL", "warn");
        env::set_var("PERMITDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["PERMITDESK_LOG_LEVEL", "PERMITDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PERMITDESK_ASSISTANT_BASE_URL", "not-a-url");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("assistant.base_url")
            );
            ensure(has_message, "validation failure should mention assistant.base_url")
        })();

        clear_vars(&["PERMITDESK_ASSISTANT_BASE_URL"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PERMITDESK_ASSISTANT_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")
        })();

        clear_vars(&["PERMITDESK_ASSISTANT_API_KEY"]);
        result
    }
}
