//! Layered CLI configuration
//!
//! Values are resolved in this order, later layers winning: built-in
//! defaults, `~/.nfcclone/nfcclone.toml`, `NFCCLONE_*` environment variables,
//! command-line flags.

use std::path::{Path, PathBuf};

use eyre::OptionExt;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use nfcclone_profile::{DEFAULT_CUSTOM_RESPONSE, StorageConfig, bytes_to_hex, hex_to_bytes};
use serde::{Deserialize, Serialize};

/// Name of the configuration file inside [`config_dir`]
pub(crate) const CONFIG_FILE: &str = "nfcclone.toml";

/// Prefix of the environment variables read into the configuration
pub(crate) const ENV_PREFIX: &str = "NFCCLONE_";

/// Effective configuration of the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CliConfig {
    /// Primary storage location
    pub(crate) data_dir: PathBuf,
    /// Older storage locations, read after the primary one
    #[serde(default)]
    pub(crate) legacy_dirs: Vec<PathBuf>,
    /// Location written when the primary one is not writable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) fallback_dir: Option<PathBuf>,
    /// PC/SC reader to use instead of the first one holding a card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) reader: Option<String>,
    /// Fallback reply stored in newly captured profiles, as hex
    #[serde(default = "default_custom_response")]
    pub(crate) custom_response_default: String,
}

fn default_custom_response() -> String {
    bytes_to_hex(&DEFAULT_CUSTOM_RESPONSE)
}

impl CliConfig {
    /// Built-in defaults rooted at the configuration directory
    pub(crate) fn defaults(config_dir: &Path) -> Self {
        Self {
            data_dir: config_dir.join("data"),
            legacy_dirs: Vec::new(),
            fallback_dir: None,
            reader: None,
            custom_response_default: default_custom_response(),
        }
    }

    /// Storage locations for the profile store
    pub(crate) fn storage_config(&self) -> StorageConfig {
        let config = self
            .legacy_dirs
            .iter()
            .fold(StorageConfig::single(&self.data_dir), |config, dir| {
                config.with_legacy(dir)
            });
        match &self.fallback_dir {
            Some(dir) => config.with_fallback(dir),
            None => config,
        }
    }

    /// Decoded fallback reply for new captures
    pub(crate) fn custom_response(&self) -> Vec<u8> {
        hex_to_bytes(&self.custom_response_default)
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reader: Option<String>,
}

/// Directory holding the configuration file, created if missing
pub(crate) fn config_dir() -> eyre::Result<PathBuf> {
    let dir = std::env::home_dir()
        .ok_or_eyre("home directory not found")?
        .join(".nfcclone");
    if !dir.exists() {
        std::fs::create_dir(&dir)?
    }
    Ok(dir)
}

/// Load the configuration from the user's configuration directory
pub(crate) fn load_config(overrides: &Overrides) -> eyre::Result<CliConfig> {
    load_config_from(&config_dir()?, overrides)
}

/// Load the configuration rooted at `dir`
pub(crate) fn load_config_from(dir: &Path, overrides: &Overrides) -> eyre::Result<CliConfig> {
    Ok(Figment::from(Serialized::defaults(CliConfig::defaults(dir)))
        .merge(Toml::file(dir.join(CONFIG_FILE)))
        .merge(Env::prefixed(ENV_PREFIX))
        .merge(Serialized::defaults(overrides))
        .extract()?)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = load_config_from(dir.path(), &Overrides::default()).unwrap();
        assert_eq!(config, CliConfig::defaults(dir.path()));
        assert_eq!(config.data_dir, dir.path().join("data"));
        assert_eq!(config.custom_response(), vec![0x90, 0x00]);
    }

    #[test]
    fn test_file_then_flags() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
data_dir = "/srv/nfcclone"
legacy_dirs = ["/old/cards"]
reader = "From File"
custom_response_default = "6a 82"
"#,
        )
        .unwrap();

        let overrides = Overrides {
            data_dir: None,
            reader: Some("ACS ACR122U".to_string()),
        };
        let config = load_config_from(dir.path(), &overrides).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/nfcclone"));
        assert_eq!(config.legacy_dirs, vec![PathBuf::from("/old/cards")]);
        assert_eq!(config.reader.as_deref(), Some("ACS ACR122U"));
        assert_eq!(config.custom_response(), vec![0x6A, 0x82]);
    }

    #[test]
    fn test_storage_order() {
        let config = CliConfig {
            legacy_dirs: vec![PathBuf::from("/a"), PathBuf::from("/b")],
            fallback_dir: Some(PathBuf::from("/tmp/fallback")),
            ..CliConfig::defaults(Path::new("/home/user/.nfcclone"))
        };
        let storage = config.storage_config();
        let locations: Vec<_> = storage.locations().collect();
        assert_eq!(locations, vec![
            Path::new("/home/user/.nfcclone/data"),
            Path::new("/a"),
            Path::new("/b"),
            Path::new("/tmp/fallback"),
        ]);
    }

    #[test]
    fn test_printed_config_reads_back() {
        let config = CliConfig::defaults(Path::new("/home/user/.nfcclone"));
        let printed = toml::to_string_pretty(&config).unwrap();
        assert_eq!(toml::from_str::<CliConfig>(&printed).unwrap(), config);
    }
}
