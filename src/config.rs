use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_BOT_NAME, DEFAULT_EDGE_BAND, DEFAULT_GRID_SIZE, DEFAULT_PROJECTILE_SPEED,
    DEFAULT_STALL_TOLERANCE, DEFAULT_TARGET_HITBOX, DEFAULT_TARGET_SPEED, DEFAULT_WEAPON,
    MAX_GRID_SIZE,
};
use crate::types::Weapon;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("grid_size must be within 1..={max}, got {value}")]
    GridSize { value: usize, max: usize },
    #[error("edge_band must be within (0, 0.5), got {0}")]
    EdgeBand(f64),
    #[error("{field} must be finite and non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub grid_size: usize,
    pub edge_band: f64,
    pub stall_tolerance: f64,
    pub target_speed: f64,
    pub projectile_speed: f64,
    pub target_hitbox: f64,
    #[serde(with = "weapon_name")]
    pub preferred_weapon: Weapon,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BOT_NAME.to_string(),
            grid_size: DEFAULT_GRID_SIZE,
            edge_band: DEFAULT_EDGE_BAND,
            stall_tolerance: DEFAULT_STALL_TOLERANCE,
            target_speed: DEFAULT_TARGET_SPEED,
            projectile_speed: DEFAULT_PROJECTILE_SPEED,
            target_hitbox: DEFAULT_TARGET_HITBOX,
            preferred_weapon: DEFAULT_WEAPON,
        }
    }
}

impl AgentConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 || self.grid_size > MAX_GRID_SIZE {
            return Err(ConfigError::GridSize {
                value: self.grid_size,
                max: MAX_GRID_SIZE,
            });
        }
        if !(self.edge_band > 0.0 && self.edge_band < 0.5) {
            return Err(ConfigError::EdgeBand(self.edge_band));
        }
        for (field, value) in [
            ("stall_tolerance", self.stall_tolerance),
            ("target_speed", self.target_speed),
            ("projectile_speed", self.projectile_speed),
            ("target_hitbox", self.target_hitbox),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        Ok(())
    }
}

mod weapon_name {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::Weapon;

    pub fn serialize<S: Serializer>(weapon: &Weapon, serializer: S) -> Result<S::Ok, S::Error> {
        let name = match weapon {
            Weapon::None => "none",
            Weapon::Ranged => "ranged",
            Weapon::Melee => "melee",
        };
        serializer.serialize_str(name)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weapon, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Weapon::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown weapon \"{raw}\"")))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = AgentConfig::load(None).expect("defaults should load");
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.grid_size, 10);
        assert_eq!(config.preferred_weapon, Weapon::Ranged);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
        write!(file, r#"{{"name":"Zed","grid_size":8,"preferred_weapon":"melee"}}"#)
            .expect("config should be written");

        let config = AgentConfig::load(Some(file.path())).expect("config should load");
        assert_eq!(config.name, "Zed");
        assert_eq!(config.grid_size, 8);
        assert_eq!(config.preferred_weapon, Weapon::Melee);
        assert_eq!(config.edge_band, DEFAULT_EDGE_BAND);
    }

    #[test]
    fn unreadable_file_reports_path() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let missing = dir.path().join("missing.json");
        let error = AgentConfig::load(Some(&missing)).expect_err("missing file should fail");
        assert!(matches!(error, ConfigError::Read { .. }));
        assert!(error.to_string().contains("missing.json"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
        write!(file, r#"{{"preferred_weapon":"bazooka"}}"#).expect("config should be written");
        let error = AgentConfig::load(Some(file.path())).expect_err("unknown weapon should fail");
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let config = AgentConfig {
            grid_size: 0,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::GridSize { .. })));

        let config = AgentConfig {
            edge_band: 0.5,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EdgeBand(_))));

        let config = AgentConfig {
            projectile_speed: f64::NAN,
            ..AgentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Negative {
                field: "projectile_speed",
                ..
            })
        ));
    }
}
