use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::queries::ranking::DEFAULT_RANK_LIMIT;
use crate::queries::search::DEFAULT_SEARCH_LIMIT;
use crate::queries::QueryOptions;

/// Contents of `config.toml`. Every key is optional.
///
/// ```toml
/// database = "/var/lib/dex/pokedex.db"
///
/// [search]
/// default_limit = 20
///
/// [ranking]
/// default_limit = 10
/// canonical_special_stats = false
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DexConfig {
    pub database: Option<PathBuf>,
    pub search: SearchConfig,
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub default_limit: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingConfig {
    pub default_limit: i64,
    pub canonical_special_stats: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_RANK_LIMIT,
            canonical_special_stats: false,
        }
    }
}

/// `~/.dex`, where the default config and database live.
pub fn dex_home() -> Result<PathBuf> {
    let home = dirs::home_dir().context("failed to determine home directory")?;
    Ok(home.join(".dex"))
}

impl DexConfig {
    /// Load `path`, or `~/.dex/config.toml` when `path` is `None`. A missing
    /// default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (dex_home()?.join("config.toml"), false),
        };
        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("invalid config at {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Explicit database path, or `~/.dex/pokedex.db`.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(p) => Ok(p.clone()),
            None => Ok(dex_home()?.join("pokedex.db")),
        }
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            search_default_limit: self.search.default_limit,
            rank_default_limit: self.ranking.default_limit,
            canonical_special_stats: self.ranking.canonical_special_stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = DexConfig::parse("").unwrap();
        assert!(config.database.is_none());
        assert_eq!(config.query_options(), QueryOptions::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = DexConfig::parse(
            "database = \"/tmp/dex.db\"\n[ranking]\ncanonical_special_stats = true\n",
        )
        .unwrap();
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/dex.db"));
        let opts = config.query_options();
        assert!(opts.canonical_special_stats);
        assert_eq!(opts.rank_default_limit, DEFAULT_RANK_LIMIT);
        assert_eq!(opts.search_default_limit, DEFAULT_SEARCH_LIMIT);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(DexConfig::parse("[search]\nlimit = 5\n").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DexConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
