pub mod schema;

use crate::error::{PlayerError, Result};
use crate::state::MAX_VOLUME;
use schema::AppConfig;
use std::path::Path;

/// Load and parse configuration from a TOML file.
///
/// # Errors
/// Returns `PlayerError::ConfigNotFound` if the file doesn't exist,
/// `PlayerError::Io` on read errors, `PlayerError::TomlParse` on syntax errors,
/// or `PlayerError::Config` on validation failures.
pub fn load(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(PlayerError::ConfigNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// Parse configuration text, expanding environment variables first.
///
/// # Errors
/// Returns `PlayerError::TomlParse` or `PlayerError::Config`.
pub fn parse(content: &str) -> Result<AppConfig> {
    let content = expand_env_vars(content);
    let config: AppConfig = toml::from_str(&content)?;

    validate(&config)?;
    Ok(config)
}

/// Expand `${VAR}` and `$VAR` patterns in the config string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' {
            if chars.peek() == Some(&'{') {
                chars.next();
                let var_name: String = chars.by_ref().take_while(|&c| c != '}').collect();
                if let Ok(val) = std::env::var(&var_name) {
                    result.push_str(&val);
                } else {
                    // Keep original if env var not found
                    use std::fmt::Write;
                    let _ = write!(result, "${{{var_name}}}");
                }
            } else {
                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        var_name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    result.push('$');
                } else if let Ok(val) = std::env::var(&var_name) {
                    result.push_str(&val);
                } else {
                    result.push('$');
                    result.push_str(&var_name);
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Encoder detents closer than this are contact bounce.
const MIN_STEP_DEBOUNCE_MS: u64 = 60;
/// Presses closer than this are switch bounce.
const MIN_PRESS_DEBOUNCE_MS: u64 = 50;

/// Validate config constraints.
fn validate(config: &AppConfig) -> Result<()> {
    let player = &config.player;
    if player.volume > MAX_VOLUME {
        return Err(PlayerError::Config(format!(
            "volume must be 0-{MAX_VOLUME}"
        )));
    }
    if player.volume_step == 0 || player.volume_step > MAX_VOLUME {
        return Err(PlayerError::Config(format!(
            "volume_step must be 1-{MAX_VOLUME}"
        )));
    }
    if player.max_folders == 0 || player.max_tracks == 0 {
        return Err(PlayerError::Config(
            "max_folders and max_tracks must be non-zero".to_string(),
        ));
    }

    let input = &config.input;
    if input.step_debounce_ms < MIN_STEP_DEBOUNCE_MS {
        return Err(PlayerError::Config(format!(
            "step_debounce_ms must be at least {MIN_STEP_DEBOUNCE_MS}"
        )));
    }
    if input.press_debounce_ms < MIN_PRESS_DEBOUNCE_MS {
        return Err(PlayerError::Config(format!(
            "press_debounce_ms must be at least {MIN_PRESS_DEBOUNCE_MS}"
        )));
    }
    if input.scan_interval_ms == 0 || input.scan_interval_ms > 10 {
        return Err(PlayerError::Config(
            "scan_interval_ms must be 1-10 (button scan at 100 Hz or faster)".to_string(),
        ));
    }
    if input.queue_capacity < 16 {
        return Err(PlayerError::Config(
            "queue_capacity must be at least 16".to_string(),
        ));
    }

    let audio = &config.audio;
    if audio.chunk_frames == 0 || audio.chunk_frames > 8192 {
        return Err(PlayerError::Config(
            "chunk_frames must be 1-8192".to_string(),
        ));
    }
    if audio.pause_poll_ms == 0 || audio.idle_poll_ms == 0 {
        return Err(PlayerError::Config(
            "pause_poll_ms and idle_poll_ms must be non-zero".to_string(),
        ));
    }

    Ok(())
}
