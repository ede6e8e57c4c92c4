use crate::cli::run::{open_storage, require_config_path};
use crate::config::parse::load_config;
use crate::source::timestamp::format_epoch_ms;
use crate::state::watermark::WatermarkStore;
use crate::storage::traits::{ParameterKind, ParameterStore};
use std::path::PathBuf;

/// Print the stored watermark and write token
pub async fn show(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&require_config_path(config_path)?)?;
    let storage = open_storage(&config).await?;

    let state = WatermarkStore::new(storage.clone(), &config.state).load().await?;

    let watermark_display = if state.watermark == 0 {
        "never synced".to_string()
    } else {
        format_epoch_ms(state.watermark).unwrap_or_else(|| "out of range".to_string())
    };

    println!("watermark:   {} ({})", state.watermark, watermark_display);
    println!(
        "write token: {}",
        state.write_token.as_deref().unwrap_or("(none)")
    );

    let has_secret = storage
        .get_parameter(&config.credential.secret_param)
        .await?
        .is_some();
    println!(
        "credential:  {}",
        if has_secret { "stored" } else { "not stored" }
    );

    Ok(())
}

/// Move the watermark (to replay or skip entries) and forget the write token
pub async fn reset(
    config_path: Option<PathBuf>,
    watermark: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    if watermark < 0 {
        return Err(format!("watermark must not be negative, got {}", watermark).into());
    }

    let config = load_config(&require_config_path(config_path)?)?;
    let storage = open_storage(&config).await?;

    WatermarkStore::new(storage, &config.state)
        .reset(watermark)
        .await?;

    println!("Watermark set to {}, write token cleared", watermark);
    Ok(())
}

/// Store the feed API key as a secure parameter
pub async fn set_credential(
    config_path: Option<PathBuf>,
    value: String,
) -> Result<(), Box<dyn std::error::Error>> {
    if value.is_empty() {
        return Err("credential must not be empty".into());
    }

    let config = load_config(&require_config_path(config_path)?)?;
    let storage = open_storage(&config).await?;

    storage
        .put_parameter(&config.credential.secret_param, &value, ParameterKind::Secure)
        .await?;

    println!("Credential stored in '{}'", config.credential.secret_param);
    Ok(())
}
