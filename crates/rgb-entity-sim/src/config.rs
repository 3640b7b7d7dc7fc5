//! Environment-driven settings for a simulation run.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// LMDB directory. `ENTITY_DB_PATH`.
    pub db_path: PathBuf,
    /// `SIM_TICKS`.
    pub ticks: u32,
    /// Mobs spawned up front. `SIM_ENTITIES`.
    pub entities: u32,
    /// Radius, in columns, of the ticking area. `VIEW_DISTANCE`.
    pub view_distance: u32,
    /// Ticks between autosaves. `AUTOSAVE_INTERVAL`.
    pub autosave_interval: u32,
    /// `SIM_SEED`.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join("rgb-entity-sim"),
            ticks: 1_200,
            entities: 2_000,
            view_distance: 4,
            autosave_interval: 100,
            seed: 0x5eed,
        }
    }
}

impl SimConfig {
    /// Read overrides from the environment. Missing or unparsable values
    /// keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            db_path: lookup("ENTITY_DB_PATH").map_or(defaults.db_path, PathBuf::from),
            ticks: parse_or(&lookup, "SIM_TICKS", defaults.ticks),
            entities: parse_or(&lookup, "SIM_ENTITIES", defaults.entities),
            view_distance: parse_or(&lookup, "VIEW_DISTANCE", defaults.view_distance).max(1),
            autosave_interval: parse_or(&lookup, "AUTOSAVE_INTERVAL", defaults.autosave_interval)
                .max(1),
            seed: parse_or(&lookup, "SIM_SEED", defaults.seed),
        }
    }
}

fn parse_or<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    let Some(raw) = lookup(name) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        warn!("Ignoring invalid {name}={raw:?}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(SimConfig::from_lookup(|_| None), SimConfig::default());
    }

    #[test]
    fn overrides_and_bad_values() {
        let config = SimConfig::from_lookup(|name| match name {
            "SIM_TICKS" => Some("50".to_owned()),
            "SIM_SEED" => Some("not a number".to_owned()),
            "VIEW_DISTANCE" => Some("0".to_owned()),
            "ENTITY_DB_PATH" => Some("/tmp/elsewhere".to_owned()),
            _ => None,
        });
        assert_eq!(config.ticks, 50);
        assert_eq!(config.seed, SimConfig::default().seed);
        assert_eq!(config.view_distance, 1);
        assert_eq!(config.db_path, PathBuf::from("/tmp/elsewhere"));
    }
}
