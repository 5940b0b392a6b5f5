use crate::occupancy::overlap::OverlapParams;
use crate::occupancy::signal::PixelSignalParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    pub slots: SlotsSection,
    pub frame: FrameSection,
    pub strategy: StrategySection,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlotsSection {
    /// JSON array of slot records
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FrameSection {
    /// Image file re-read at every refresh
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PixelSignal,
    DetectionOverlap,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StrategySection {
    pub kind: StrategyKind,
    #[serde(default)]
    pub pixel_signal: Option<PixelSignalParams>,
    #[serde(default)]
    pub detection_overlap: Option<DetectionOverlapSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionOverlapSection {
    /// Detections written by the external model process
    pub detections_path: PathBuf,
    #[serde(flatten)]
    pub params: OverlapParams,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
    /// Refresh interval in seconds for the occupancy pass (default: 5)
    pub refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    pub fn slots_path(&self) -> &Path {
        &self.slots.path
    }

    pub fn frame_path(&self) -> &Path {
        &self.frame.path
    }

    /// Returns the configured log level, or `info` when blank.
    pub fn log_level(&self) -> &str {
        let level = self.logging.level.trim();
        if level.is_empty() {
            DEFAULT_LOG_LEVEL
        } else {
            level
        }
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the refresh interval as Duration (default: 5 seconds)
    pub fn refresh_interval(&self) -> Duration {
        let secs = self
            .server
            .as_ref()
            .and_then(|s| s.refresh_interval_secs)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ObjectClass;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_temp(prefix: &str, contents: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("{prefix}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn default_config_selects_pixel_signal() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;
        assert_eq!(config.strategy.kind, StrategyKind::PixelSignal);
        assert!(config.slots_path().ends_with("slots.json"));
        Ok(())
    }

    #[test]
    fn overlap_section_applies_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(
            "parkwatch-config-overlap",
            r#"
[app]
name = "parkwatch"

[logging]
level = "debug"

[slots]
path = "config/slots.json"

[frame]
path = "frames/latest.jpg"

[strategy]
kind = "detection_overlap"

[strategy.detection_overlap]
detections_path = "frames/latest.detections.json"
min_confidence = 0.5
"#,
        )?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.strategy.kind, StrategyKind::DetectionOverlap);
        assert_eq!(config.log_level(), "debug");
        let overlap = config
            .strategy
            .detection_overlap
            .expect("overlap section present");
        assert_eq!(overlap.params.occupied_threshold, 0.30);
        assert_eq!(overlap.params.min_confidence, 0.5);
        assert_eq!(overlap.params.vehicle_classes, vec![ObjectClass::Car]);
        Ok(())
    }

    #[test]
    fn missing_server_section_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(
            "parkwatch-config-no-server",
            r#"
[app]
name = "parkwatch"

[logging]
level = ""

[slots]
path = "slots.json"

[frame]
path = "frame.png"

[strategy]
kind = "pixel_signal"

[strategy.pixel_signal]
absolute_pixel_threshold = 900
"#,
        )?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(
            config.refresh_interval(),
            Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)
        );
        assert_eq!(config.log_level(), DEFAULT_LOG_LEVEL);
        let params = config.strategy.pixel_signal.expect("pixel section present");
        assert_eq!(params.absolute_pixel_threshold, Some(900));
        assert_eq!(params.ratio_threshold, None);
        assert_eq!(params.block_size, 25);
        Ok(())
    }

    #[test]
    fn unknown_strategy_kind_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(
            "parkwatch-config-bad-kind",
            r#"
[app]
name = "parkwatch"

[logging]
level = "info"

[slots]
path = "slots.json"

[frame]
path = "frame.png"

[strategy]
kind = "edge_density"
"#,
        )?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let temp_dir = std::env::temp_dir();
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = temp_dir.join(format!("parkwatch-config-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("parkwatch-config-invalid", "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
