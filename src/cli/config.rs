use crate::cli::run::require_config_path;
use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::{Path, PathBuf};

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", generate_starter_config());
        return Ok(());
    }

    // Try ~/.config/logferry/config.yml first
    let config_path = dirs::home_dir()
        .map(|home_dir| home_dir.join(".config/logferry/config.yml"))
        .filter(|user_config| match user_config.parent() {
            Some(parent) => match fs::create_dir_all(parent) {
                Ok(()) => true,
                Err(_) => {
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to /etc/logferry/config.yml");
                    false
                }
            },
            None => false,
        })
        .unwrap_or_else(|| PathBuf::from("/etc/logferry/config.yml"));

    write_starter_config(&config_path)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// Write the starter config to `path`, refusing to replace an existing file
pub fn write_starter_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout to print the config",
            path.display()
        )
        .into());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, generate_starter_config())?;
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = require_config_path(config_path)?;

    println!("Validating config file: {}", path.display());
    crate::config::load_config(&path)?;
    println!("✓ Config is valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::run::RunError;
    use crate::config::ConfigError;

    #[test]
    fn test_write_starter_config_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.yml");

        write_starter_config(&path).unwrap();
        fs::write(&path, "edited").unwrap();

        let err = write_starter_config(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "edited");
    }

    #[test]
    fn test_validate_reports_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "source:\n  url: ftp://example.com\nsink:\n  log_group: g\n  log_stream: s\nstorage:\n  path: /tmp/x.duckdb\n",
        )
        .unwrap();

        let err = validate(Some(path)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ValidationList(_))
        ));
    }

    #[test]
    fn test_validate_without_config_path() {
        let err = validate(None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunError>(),
            Some(RunError::ConfigNotFound)
        ));
    }
}
