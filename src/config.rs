use clap::{Arg, ArgAction, ArgMatches, Command};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_MODEL_NAME: &str = "gemini-1.5-flash";
pub const DEFAULT_PROVIDER: &str = "google";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_TOP_P: f64 = 0.95;
pub const DEFAULT_SUMMARY_LENGTH: usize = 1000;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Read-only service configuration, built once at startup and handed to
/// each component that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub google_api_key: Option<String>,
    pub model_name: String,
    pub provider: String,
    /// Output-token ceiling, also restated inside extraction prompts.
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    /// Target summary length in words when a request does not set one.
    pub default_summary_length: usize,
    pub upload_dir: PathBuf,
    pub fetch_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            google_api_key: None,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            default_summary_length: DEFAULT_SUMMARY_LENGTH,
            upload_dir: env::temp_dir(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

fn value_arg(id: &'static str, value_name: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(id)
        .value_name(value_name)
        .help(help)
        .action(ArgAction::Set)
}

/// Command-line interface. Every option falls back to an environment variable.
pub fn command() -> Command {
    Command::new("content-digest")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A Model Context Protocol server for document summarization and extraction")
        .long_about(
            "This MCP server provides the following tools:\n\
            - summarize-content: Summarize a PDF, web page or plain text\n\
            - extract-content: Extract key points, entities or custom structured data",
        )
        .arg(value_arg(
            "google-api-key",
            "KEY",
            "Google Generative Language API key [env: GOOGLE_API_KEY]",
        ))
        .arg(value_arg(
            "model",
            "NAME",
            "Model name [env: GOOGLE_MODEL_NAME] (default: gemini-1.5-flash)",
        ))
        .arg(value_arg(
            "provider",
            "NAME",
            "LLM provider: google or gemini [env: DEFAULT_LLM_PROVIDER] (default: google)",
        ))
        .arg(value_arg(
            "max-tokens",
            "N",
            "Output token ceiling [env: LLM_MAX_TOKENS] (default: 1024)",
        ))
        .arg(value_arg(
            "temperature",
            "T",
            "Sampling temperature [env: LLM_TEMPERATURE] (default: 0.1)",
        ))
        .arg(value_arg(
            "top-p",
            "P",
            "Nucleus sampling threshold [env: LLM_TOP_P] (default: 0.95)",
        ))
        .arg(value_arg(
            "default-summary-length",
            "WORDS",
            "Summary length when a request omits one [env: DEFAULT_MAX_SUMMARY_LENGTH] (default: 1000)",
        ))
        .arg(value_arg(
            "upload-dir",
            "DIR",
            "Directory for staged PDF uploads [env: UPLOAD_DIR] (default: system temp dir)",
        ))
        .arg(value_arg(
            "fetch-timeout",
            "SECS",
            "Web fetch timeout in seconds [env: FETCH_TIMEOUT_SECS] (default: 10)",
        ))
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors")
                .action(ArgAction::SetTrue),
        )
}

impl Settings {
    /// Resolves settings from parsed flags and the process environment.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ConfigError> {
        Self::resolve(matches, |key| env::var(key).ok())
    }

    /// Flag value first, then `lookup(env_name)`, then the built-in default.
    pub fn resolve<F>(matches: &ArgMatches, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = |flag: &str, env_name: &str| {
            matches
                .get_one::<String>(flag)
                .cloned()
                .or_else(|| lookup(env_name))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Settings::default();

        Ok(Settings {
            google_api_key: raw("google-api-key", "GOOGLE_API_KEY"),
            model_name: raw("model", "GOOGLE_MODEL_NAME").unwrap_or(defaults.model_name),
            provider: raw("provider", "DEFAULT_LLM_PROVIDER")
                .map(|p| p.to_ascii_lowercase())
                .unwrap_or(defaults.provider),
            max_tokens: parse_or(
                "max-tokens",
                raw("max-tokens", "LLM_MAX_TOKENS"),
                defaults.max_tokens,
            )?,
            temperature: parse_or(
                "temperature",
                raw("temperature", "LLM_TEMPERATURE"),
                defaults.temperature,
            )?,
            top_p: parse_or("top-p", raw("top-p", "LLM_TOP_P"), defaults.top_p)?,
            default_summary_length: parse_or(
                "default-summary-length",
                raw("default-summary-length", "DEFAULT_MAX_SUMMARY_LENGTH"),
                defaults.default_summary_length,
            )?,
            upload_dir: raw("upload-dir", "UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            fetch_timeout: Duration::from_secs(parse_or(
                "fetch-timeout",
                raw("fetch-timeout", "FETCH_TIMEOUT_SECS"),
                DEFAULT_FETCH_TIMEOUT_SECS,
            )?),
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Log filter for the stderr subscriber. A valid `RUST_LOG` wins over
/// `--quiet`; otherwise quiet means errors only.
pub fn log_filter(quiet: bool, rust_log: Option<&str>) -> EnvFilter {
    let fallback = if quiet { "error" } else { "info" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(args: &[&str], vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let matches = command()
            .try_get_matches_from(std::iter::once("content-digest").chain(args.iter().copied()))
            .expect("valid arguments");
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::resolve(&matches, |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let settings = settings_from(&[], &[]).unwrap();
        assert_eq!(settings.model_name, "gemini-1.5-flash");
        assert_eq!(settings.provider, "google");
        assert_eq!(settings.max_tokens, 1024);
        assert_eq!(settings.default_summary_length, 1000);
        assert_eq!(settings.fetch_timeout, Duration::from_secs(10));
        assert!(settings.google_api_key.is_none());
    }

    #[test]
    fn flags_override_environment() {
        let settings = settings_from(
            &["--max-tokens", "2048", "--provider", "Gemini"],
            &[("LLM_MAX_TOKENS", "512"), ("GOOGLE_API_KEY", "secret")],
        )
        .unwrap();
        assert_eq!(settings.max_tokens, 2048);
        assert_eq!(settings.provider, "gemini");
        assert_eq!(settings.google_api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_number_is_reported() {
        let err = settings_from(&[], &[("LLM_TEMPERATURE", "warm")]).unwrap_err();
        match err {
            ConfigError::Invalid { name, value, .. } => {
                assert_eq!(name, "temperature");
                assert_eq!(value, "warm");
            }
        }
    }

    #[test]
    fn quiet_limits_logs_to_errors() {
        use tracing_subscriber::filter::LevelFilter;

        assert_eq!(log_filter(true, None).max_level_hint(), Some(LevelFilter::ERROR));
        assert_eq!(log_filter(false, None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(true, Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(true, Some("")).max_level_hint(), Some(LevelFilter::ERROR));
    }
}
