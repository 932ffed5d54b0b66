use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use xi_packet_paths::{PathConfig, TrackerConfig};

/// Tool configuration, loadable from a TOML file.
///
/// All fields default to their standard values. CLI flags override config file values.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsharkConfig {
    pub tracker: TrackerConfig,
    pub path: PathConfig,
}

impl PathsharkConfig {
    pub const DEFAULT_FILE: &'static str = "pathshark.toml";

    /// Load config from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Loads the explicitly requested file, or `pathshark.toml` from the working
    /// directory when it exists, or the defaults.
    pub fn discover(explicit: Option<&str>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(Path::new(path));
        }
        let default_path = Path::new(Self::DEFAULT_FILE);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Generate a commented default TOML config string.
    pub fn generate_default_toml() -> String {
        r#"# Pathshark Configuration
# Place this file as pathshark.toml in the working directory,
# or specify with --config <path>.

[tracker]
# Entities further than this many yalms from the client are out of range
range_distance = 50.0

# Milliseconds after its last sighting at which an entity counts as lost,
# when the client moving away is what put it out of range
range_loss_lag_ms = 1000

[path]
# Ground distance between consecutive samples that counts as movement
move_threshold = 0.1

# Milliseconds without movement that count as a stop
pause_threshold_ms = 3000
"#
        .to_string()
    }

    /// Apply CLI flag overrides.
    pub fn apply_cli_overrides(&mut self, matches: &clap::ArgMatches) -> anyhow::Result<()> {
        if let Some(range) = matches.value_of("RANGE") {
            self.tracker.range_distance = range
                .parse()
                .with_context(|| format!("invalid range {range:?}"))?;
        }
        if let Some(threshold) = matches.value_of("MOVE_THRESHOLD") {
            self.path.move_threshold = threshold
                .parse()
                .with_context(|| format!("invalid move threshold {threshold:?}"))?;
        }
        if let Some(pause) = matches.value_of("PAUSE_MS") {
            self.path.pause_threshold_ms = pause
                .parse()
                .with_context(|| format!("invalid pause threshold {pause:?}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_matches_defaults() {
        let config: PathsharkConfig =
            toml::from_str(&PathsharkConfig::generate_default_toml()).unwrap();
        assert_eq!(config.tracker, TrackerConfig::default());
        assert_eq!(config.path, PathConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config: PathsharkConfig = toml::from_str("[path]\npause_threshold_ms = 5000\n").unwrap();
        assert_eq!(config.path.pause_threshold_ms, 5000);
        assert_eq!(config.path.move_threshold, 0.1);
        assert_eq!(config.tracker.range_distance, 50.0);
    }
}
