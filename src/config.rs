//! Engine configuration.
//!
//! Settings come from an optional `regency.toml`, then `REGENCY_*`
//! environment variables (nested keys separated by `__`, e.g.
//! `REGENCY_RULES__BRIBE_COST=30`), then runtime `setoption` commands.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::{CommandKind, DefaultOrderPolicy};
use crate::resolve::{PrecedenceError, PrecedenceTable, Resolver, Rules};

/// File name searched for in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "regency.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "REGENCY";

/// Errors raised while loading or updating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("invalid value '{value}' for option '{name}'")]
    InvalidValue { name: String, value: String },

    #[error(transparent)]
    Precedence(#[from] PrecedenceError),
}

/// Settings for turn resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Orders given to living characters who submitted none.
    pub default_policy: DefaultOrderPolicy,
    pub rules: Rules,
    /// Rank overrides on top of the standard precedence table, by kind name.
    pub precedence: BTreeMap<String, u8>,
    /// Length of the recent-games listing.
    pub recent_games: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_policy: DefaultOrderPolicy::default(),
            rules: Rules::default(),
            precedence: BTreeMap::new(),
            recent_games: 5,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `path` (required) or, when `None`, from
    /// `regency.toml` if present, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let cfg: EngineConfig = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        cfg.precedence_table()?;
        Ok(cfg)
    }

    /// The standard table with this config's overrides applied.
    pub fn precedence_table(&self) -> Result<PrecedenceTable, PrecedenceError> {
        PrecedenceTable::with_overrides(&self.precedence)
    }

    /// Builds a resolver for these settings.
    pub fn resolver(&self) -> Result<Resolver, PrecedenceError> {
        Ok(Resolver::new(self.precedence_table()?, self.rules))
    }

    /// Applies a single `name = value` option.
    ///
    /// Names are `default_policy`, `recent_games`, `rules.<field>`, and
    /// `precedence.<kind>`.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue { name: name.to_string(), value: value.to_string() };
        let key = name.trim().to_ascii_lowercase();

        if let Some(kind) = key.strip_prefix("precedence.") {
            let kind: CommandKind = kind.parse().map_err(|_| ConfigError::UnknownOption(name.to_string()))?;
            let rank = value.trim().parse::<u8>().map_err(|_| invalid())?;
            self.precedence.insert(kind.name().to_string(), rank);
            return Ok(());
        }

        match key.as_str() {
            "default_policy" => {
                self.default_policy = DefaultOrderPolicy::from_name(value).ok_or_else(invalid)?;
            }
            "recent_games" => {
                self.recent_games = value.trim().parse().map_err(|_| invalid())?;
            }
            "rules.max_stat" => {
                self.rules.max_stat = value.trim().parse().map_err(|_| invalid())?;
            }
            "rules.tax_per_region" => {
                self.rules.tax_per_region = value.trim().parse().map_err(|_| invalid())?;
            }
            "rules.trade_rate" => {
                self.rules.trade_rate = value.trim().parse().map_err(|_| invalid())?;
            }
            "rules.theft_rate" => {
                self.rules.theft_rate = value.trim().parse().map_err(|_| invalid())?;
            }
            "rules.bribe_cost" => {
                self.rules.bribe_cost = value.trim().parse().map_err(|_| invalid())?;
            }
            _ => return Err(ConfigError::UnknownOption(name.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.default_policy, DefaultOrderPolicy::Hide);
        assert_eq!(cfg.rules, Rules::default());
        assert_eq!(cfg.precedence_table().unwrap(), PrecedenceTable::standard());
    }

    #[test]
    fn loads_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "default_policy = \"income\"\nrecent_games = 3\n\n[rules]\nbribe_cost = 35\n\n[precedence]\nmove = 1\n"
        )
        .unwrap();
        let cfg = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.default_policy, DefaultOrderPolicy::Income);
        assert_eq!(cfg.recent_games, 3);
        assert_eq!(cfg.rules.bribe_cost, 35);
        assert_eq!(cfg.rules.max_stat, Rules::default().max_stat);
        assert_eq!(cfg.precedence_table().unwrap().rank(CommandKind::Move), 1);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let err = EngineConfig::load(Some(Path::new("/nonexistent/regency.toml")));
        assert!(matches!(err, Err(ConfigError::Load(_))));
    }

    #[test]
    fn set_option_updates_fields() {
        let mut cfg = EngineConfig::default();
        cfg.set_option("default_policy", "require").unwrap();
        cfg.set_option("rules.theft_rate", "4").unwrap();
        cfg.set_option("precedence.Hide", "3").unwrap();
        assert_eq!(cfg.default_policy, DefaultOrderPolicy::Require);
        assert_eq!(cfg.rules.theft_rate, 4);
        assert_eq!(cfg.precedence.get("hide"), Some(&3));
    }

    #[test]
    fn set_option_rejects_bad_input() {
        let mut cfg = EngineConfig::default();
        assert!(matches!(cfg.set_option("threads", "4"), Err(ConfigError::UnknownOption(_))));
        assert!(matches!(
            cfg.set_option("rules.max_stat", "lots"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            cfg.set_option("precedence.duel", "1"),
            Err(ConfigError::UnknownOption(_))
        ));
    }
}
