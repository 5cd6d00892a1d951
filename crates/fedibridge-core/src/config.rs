//! Configuration resolution for fedibridge.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/fedibridge/settings.json)
//! 3. Explicit config file
//! 4. Environment variables (highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Invite code used to bootstrap the default federation on first start.
pub const DEFAULT_BOOTSTRAP_INVITE: &str = "fed11qgqzc2nhwden5te0vejkg6tdd9h8gepwvejkg6tdd9h8garhduhx6at5d9h8jmn9wshxxmmd9uqqzgxg6s3evnr6m9zdxr6hxkdkukexpcs3mn7mj3g5pc5dfh63l4tj6g9zk4er";

/// Complete fedibridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Consent popup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Extension-relative path of the prompt page.
    pub page_path: String,
    pub width: u32,
    pub height: u32,
    /// Auto-deny an unanswered prompt after this many seconds. Off when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            page_path: "src/prompt.html".to_string(),
            width: 360,
            height: 400,
            timeout_secs: None,
        }
    }
}

impl PromptConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Wallet bootstrap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Federation opened when no wallet exists yet.
    pub default_federation_id: String,
    /// Invite joined when the default federation cannot be opened.
    pub bootstrap_invite: Option<String>,
    /// Log level applied to wallets created on federation switch.
    pub log_level: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            default_federation_id: "testnet".to_string(),
            bootstrap_invite: Some(DEFAULT_BOOTSTRAP_INVITE.to_string()),
            log_level: "debug".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        config = load_config_file(&global_path)?;
    }

    // Load explicit config; a missing explicit file is an error
    if let Some(path) = explicit_path {
        let overlay = load_config_file(path)?;
        merge_config(&mut config, overlay);
    }

    // Apply environment overrides
    apply_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".fedibridge").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/fedibridge/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("fedibridge").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    base.prompt.page_path = overlay.prompt.page_path;
    base.prompt.width = overlay.prompt.width;
    base.prompt.height = overlay.prompt.height;
    if overlay.prompt.timeout_secs.is_some() {
        base.prompt.timeout_secs = overlay.prompt.timeout_secs;
    }

    base.wallet.default_federation_id = overlay.wallet.default_federation_id;
    if overlay.wallet.bootstrap_invite.is_some() {
        base.wallet.bootstrap_invite = overlay.wallet.bootstrap_invite;
    }
    base.wallet.log_level = overlay.wallet.log_level;

    base.logging = overlay.logging;
}

fn apply_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("FEDIBRIDGE_PROMPT_TIMEOUT_SECS") {
        match val.parse::<u64>() {
            Ok(0) => config.prompt.timeout_secs = None,
            Ok(n) => config.prompt.timeout_secs = Some(n),
            Err(_) => tracing::warn!(value = %val, "Ignoring invalid FEDIBRIDGE_PROMPT_TIMEOUT_SECS"),
        }
    }
    if let Some(val) = var("FEDIBRIDGE_DEFAULT_FEDERATION") {
        config.wallet.default_federation_id = val;
    }
    if let Some(val) = var("FEDIBRIDGE_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = var("FEDIBRIDGE_LOG_JSON") {
        config.logging.json = matches!(val.as_str(), "1" | "true" | "yes");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_prompt_geometry() {
        let config = Config::default();
        assert_eq!((config.prompt.width, config.prompt.height), (360, 400));
        assert_eq!(config.prompt.page_path, "src/prompt.html");
        assert!(config.prompt.timeout().is_none());
    }

    #[test]
    fn default_wallet_bootstrap() {
        let config = Config::default();
        assert_eq!(config.wallet.default_federation_id, "testnet");
        assert_eq!(
            config.wallet.bootstrap_invite.as_deref(),
            Some(DEFAULT_BOOTSTRAP_INVITE)
        );
    }

    #[test]
    fn explicit_file_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"prompt": {{"timeout_secs": 90}}, "wallet": {{"default_federation_id": "mutinynet"}}}}"#
        )
        .unwrap();

        let mut config = Config::default();
        merge_config(&mut config, load_config_file(file.path()).unwrap());

        assert_eq!(config.prompt.timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.prompt.width, 360);
        assert_eq!(config.wallet.default_federation_id, "mutinynet");
        assert!(config.wallet.bootstrap_invite.is_some());
    }

    #[test]
    fn unreadable_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FEDIBRIDGE_PROMPT_TIMEOUT_SECS", "30"),
            ("FEDIBRIDGE_LOG_LEVEL", "trace"),
            ("FEDIBRIDGE_LOG_JSON", "true"),
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, |k| vars.get(k).map(ToString::to_string));

        assert_eq!(config.prompt.timeout_secs, Some(30));
        assert_eq!(config.logging.level, "trace");
        assert!(config.logging.json);
    }

    #[test]
    fn zero_timeout_disables_prompt_timeout() {
        let mut config = Config::default();
        config.prompt.timeout_secs = Some(10);
        apply_overrides(&mut config, |k| {
            (k == "FEDIBRIDGE_PROMPT_TIMEOUT_SECS").then(|| "0".to_string())
        });
        assert!(config.prompt.timeout_secs.is_none());
    }
}
