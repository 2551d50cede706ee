use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mac_address::MacAddress;
use serde_derive::Deserialize;
use thiserror::Error;

use crate::decoder::DEFAULT_WEIGHT_OFFSET;
use crate::session::SessionSettings;

/// Scan length used when neither the config file nor the CLI sets one.
pub const DEFAULT_SCAN_SECONDS: u64 = 240;

/// The scale this tool was written against.
pub fn default_scale_address() -> MacAddress {
    MacAddress::new([0xED, 0x67, 0x39, 0x0A, 0xC5, 0xC0])
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("invalid config file")]
    Toml(#[from] toml::de::Error),
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub scale: ScaleConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScaleConfig {
    pub address: Option<MacAddress>,
    /// First byte of the little-endian weight field in the manufacturer data.
    pub weight_offset: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScanConfig {
    pub duration_seconds: Option<u64>,
    pub short_payload: Option<ShortPayloadPolicy>,
    /// Report a settled weight once it has been unchanged this long.
    pub stable_seconds: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
}

/// What to do with a manufacturer payload too short to hold the weight field.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShortPayloadPolicy {
    Skip,
    #[default]
    Warn,
    Fail,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl AppConfig {
    /// Reads `path`. A missing file is only an error when `required` is set,
    /// otherwise every setting falls back to its default.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::de::from_str(&contents)?),
            Err(error) if error.kind() == io::ErrorKind::NotFound && !required => {
                Ok(AppConfig::default())
            }
            Err(error) => Err(ConfigError::Io {
                path: path.to_owned(),
                error,
            }),
        }
    }

    pub fn override_with(
        mut self,
        address: Option<MacAddress>,
        duration_seconds: Option<u64>,
        format: Option<OutputFormat>,
    ) -> Self {
        if address.is_some() {
            self.scale.address = address;
        }
        if duration_seconds.is_some() {
            self.scan.duration_seconds = duration_seconds;
        }
        if format.is_some() {
            self.output.format = format;
        }
        self
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            target: self.scale.address.unwrap_or_else(default_scale_address),
            weight_offset: self.scale.weight_offset.unwrap_or(DEFAULT_WEIGHT_OFFSET),
            duration: Duration::from_secs(
                self.scan.duration_seconds.unwrap_or(DEFAULT_SCAN_SECONDS),
            ),
            short_payload: self.scan.short_payload.unwrap_or_default(),
            stable_for: self.scan.stable_seconds.map(Duration::from_secs),
            format: self.output.format.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config() {
        let config_str = r#"
            [scale]
            address = "aa:bb:cc:dd:ee:ff"
            weight_offset = 11

            [scan]
            duration_seconds = 30
            short_payload = "fail"
            stable_seconds = 2

            [output]
            format = "json"
        "#;
        let config: AppConfig = toml::de::from_str(config_str).unwrap();
        let settings = config.session_settings();
        assert_eq!(
            settings.target,
            MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])
        );
        assert_eq!(settings.weight_offset, 11);
        assert_eq!(settings.duration, Duration::from_secs(30));
        assert_eq!(settings.short_payload, ShortPayloadPolicy::Fail);
        assert_eq!(settings.stable_for, Some(Duration::from_secs(2)));
        assert_eq!(settings.format, OutputFormat::Json);
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::de::from_str("").unwrap();
        let settings = config.session_settings();
        assert_eq!(settings.target.to_string(), "ED:67:39:0A:C5:C0");
        assert_eq!(settings.weight_offset, 17);
        assert_eq!(settings.duration, Duration::from_secs(240));
        assert_eq!(settings.short_payload, ShortPayloadPolicy::Warn);
        assert_eq!(settings.stable_for, None);
        assert_eq!(settings.format, OutputFormat::Text);
    }

    #[test]
    fn test_cli_overrides_win() {
        let config: AppConfig = toml::de::from_str(
            r#"
            [scan]
            duration_seconds = 30
            "#,
        )
        .unwrap();
        let address: MacAddress = "11:22:33:44:55:66".parse().unwrap();
        let settings = config
            .override_with(Some(address), Some(5), Some(OutputFormat::Json))
            .session_settings();
        assert_eq!(settings.target, address);
        assert_eq!(settings.duration, Duration::from_secs(5));
        assert_eq!(settings.format, OutputFormat::Json);
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("this-config-does-not-exist.toml");
        assert!(AppConfig::load(path, false).is_ok());
        assert!(matches!(
            AppConfig::load(path, true),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_bad_policy_rejected() {
        let result: Result<AppConfig, _> = toml::de::from_str(
            r#"
            [scan]
            short_payload = "retry"
            "#,
        );
        assert!(result.is_err());
    }
}
