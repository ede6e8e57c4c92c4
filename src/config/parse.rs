use super::types::*;
use crate::config::{expand_env_vars, expand_tilde};
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

const MAX_PAGE_SIZE: usize = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })
}

/// Parse and validate a config from its YAML text.
///
/// `$env{VAR}` references are expanded before parsing and `~` is expanded in the
/// storage path afterwards.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    config.storage.path = expand_tilde(&config.storage.path);

    validate_config(&config)?;
    Ok(config)
}

fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    // Comment lines never reach serde_yaml, so references there do not matter
    let mut unexpanded_vars: Vec<String> = yaml_string
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| re.captures_iter(line))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_source(&config.source, &mut errors);
    validate_sink(&config.sink, &mut errors);
    validate_parameter_names(config, &mut errors);

    if config.storage.path.as_os_str().is_empty() {
        errors.push("storage.path cannot be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_source(source: &SourceConfig, errors: &mut Vec<String>) {
    if source.url.is_empty() {
        errors.push("source.url cannot be empty".to_string());
    } else {
        match reqwest::Url::parse(&source.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(format!(
                "source.url: unsupported scheme '{}' (expected http or https)",
                url.scheme()
            )),
            Err(e) => errors.push(format!("source.url: invalid URL '{}': {}", source.url, e)),
        }
    }

    if source.page_size == 0 || source.page_size > MAX_PAGE_SIZE {
        errors.push(format!(
            "source.page_size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, source.page_size
        ));
    }

    if reqwest::header::HeaderName::from_bytes(source.api_key_header.as_bytes()).is_err() {
        errors.push(format!(
            "source.api_key_header: '{}' is not a valid HTTP header name",
            source.api_key_header
        ));
    }

    if source.collection_key.is_empty() {
        errors.push("source.collection_key cannot be empty".to_string());
    }

    if source.timestamp.field.is_empty() {
        errors.push("source.timestamp.field cannot be empty".to_string());
    }

    if source.connect_timeout.is_zero() || source.request_timeout.is_zero() {
        errors.push("source timeouts must be greater than zero".to_string());
    }
}

fn validate_sink(sink: &SinkConfig, errors: &mut Vec<String>) {
    if sink.log_group.is_empty() {
        errors.push("sink.log_group cannot be empty".to_string());
    }
    if sink.log_stream.is_empty() {
        errors.push("sink.log_stream cannot be empty".to_string());
    }
}

fn validate_parameter_names(config: &Config, errors: &mut Vec<String>) {
    let names = [
        ("state.watermark_param", &config.state.watermark_param),
        ("state.token_param", &config.state.token_param),
        ("credential.secret_param", &config.credential.secret_param),
    ];

    for (i, (key, name)) in names.iter().enumerate() {
        if name.is_empty() {
            errors.push(format!("{} cannot be empty", key));
            continue;
        }
        for (other_key, other_name) in &names[i + 1..] {
            if name == other_name {
                errors.push(format!(
                    "{} and {} must name different parameters (both are '{}')",
                    key, other_key, name
                ));
            }
        }
    }

    if config.credential.env_var.is_empty() {
        errors.push("credential.env_var cannot be empty".to_string());
    }
}
