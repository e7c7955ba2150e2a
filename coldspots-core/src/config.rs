//! Configuration file support for Coldspots
//!
//! Loads pipeline configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.coldspotsrc.json` in the working directory
//! 3. `coldspots.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::activity::DEFAULT_ACTIVITY_WINDOW;
use crate::cold::DEFAULT_STAR_CEILING;
use crate::popularity::PopularityWeights;
use crate::ranking::{RankingConfig, RankingPolicy, ScoreBasis};
use crate::table::Encoding;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of top repositories kept for reporting
pub const DEFAULT_TOP: usize = 100;

/// Default page size for top-N slices
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Coldspots configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColdspotsConfig {
    /// Glob patterns over `repo_name` to include (default: all)
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns over `repo_name` to exclude (default: none)
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Popularity formula weights
    #[serde(default)]
    pub popularity: Option<PopularityConfig>,

    /// Cold-set filter settings
    #[serde(default)]
    pub cold: Option<ColdConfig>,

    /// Ranking policy and basis
    #[serde(default)]
    pub ranking: Option<RankingSection>,

    /// Trailing periods summed for activity (default: 4)
    #[serde(default)]
    pub activity_window: Option<usize>,

    /// Drop rows with failed joins or failed listings before normalization
    #[serde(default)]
    pub exclude_incomplete: Option<bool>,

    /// Number of repositories kept in the top slice (default: 100)
    #[serde(default)]
    pub top: Option<usize>,

    /// Page size for the top slice (default: 20)
    #[serde(default)]
    pub page_size: Option<usize>,

    /// CSV encoding (default: utf8)
    #[serde(default)]
    pub encoding: Option<Encoding>,
}

/// Popularity formula weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PopularityConfig {
    /// Star weight `a` (default: 1.0)
    pub star_weight: Option<f64>,
    /// Fork weight `b` (default: 0.5)
    pub fork_weight: Option<f64>,
    /// Penalty coefficient `c` (default: 0.01)
    pub penalty: Option<f64>,
}

/// Cold-set filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColdConfig {
    /// Maximum star count of a cold repository (default: 150)
    pub star_ceiling: Option<u64>,
}

/// Ranking section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankingSection {
    /// Weighting policy (default: direct_subtraction with k = 1)
    #[serde(default)]
    pub policy: Option<PolicyConfig>,
    /// Which values feed the policy (default: normalized)
    #[serde(default)]
    pub basis: Option<ScoreBasis>,
}

/// Weighting policy with optional parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum PolicyConfig {
    ActivityPenalizing {
        alpha: Option<f64>,
        beta: Option<f64>,
        gamma: Option<f64>,
        activity_scale: Option<f64>,
    },
    DirectSubtraction {
        k: Option<f64>,
    },
}

impl PolicyConfig {
    fn resolve(&self) -> RankingPolicy {
        match *self {
            PolicyConfig::ActivityPenalizing {
                alpha,
                beta,
                gamma,
                activity_scale,
            } => RankingPolicy::ActivityPenalizing {
                alpha: alpha.unwrap_or(0.3),
                beta: beta.unwrap_or(0.3),
                gamma: gamma.unwrap_or(0.4),
                activity_scale: activity_scale.unwrap_or(1000.0),
            },
            PolicyConfig::DirectSubtraction { k } => {
                RankingPolicy::direct_subtraction(k.unwrap_or(1.0))
            }
        }
    }
}

/// Resolved configuration with compiled glob patterns
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Compiled include patterns (None means include all)
    pub include: Option<GlobSet>,
    /// Compiled exclude patterns (None means exclude nothing)
    pub exclude: Option<GlobSet>,
    pub popularity: PopularityWeights,
    pub star_ceiling: u64,
    pub ranking: RankingConfig,
    pub activity_window: usize,
    pub exclude_incomplete: bool,
    pub top_n: usize,
    pub page_size: usize,
    pub encoding: Encoding,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

fn ensure_finite(name: &str, value: Option<f64>) -> Result<()> {
    if let Some(v) = value {
        if !v.is_finite() {
            anyhow::bail!("{} must be a finite number (got {})", name, v);
        }
    }
    Ok(())
}

fn ensure_non_negative(name: &str, value: Option<f64>) -> Result<()> {
    ensure_finite(name, value)?;
    if let Some(v) = value {
        if v < 0.0 {
            anyhow::bail!("{} must be non-negative (got {})", name, v);
        }
    }
    Ok(())
}

fn compile_globs(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

impl ColdspotsConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref p) = self.popularity {
            ensure_non_negative("popularity.star_weight", p.star_weight)?;
            ensure_non_negative("popularity.fork_weight", p.fork_weight)?;
            ensure_non_negative("popularity.penalty", p.penalty)?;
        }

        if let Some(ref ranking) = self.ranking {
            match ranking.policy {
                Some(PolicyConfig::ActivityPenalizing {
                    alpha,
                    beta,
                    gamma,
                    activity_scale,
                }) => {
                    ensure_finite("ranking.policy.alpha", alpha)?;
                    ensure_finite("ranking.policy.beta", beta)?;
                    ensure_finite("ranking.policy.gamma", gamma)?;
                    ensure_finite("ranking.policy.activity_scale", activity_scale)?;
                    if let Some(scale) = activity_scale {
                        if scale <= 0.0 {
                            anyhow::bail!(
                                "ranking.policy.activity_scale must be positive (got {})",
                                scale
                            );
                        }
                    }
                }
                Some(PolicyConfig::DirectSubtraction { k }) => {
                    ensure_finite("ranking.policy.k", k)?;
                }
                None => {}
            }
        }

        if self.activity_window == Some(0) {
            anyhow::bail!("activity_window must be at least 1");
        }
        if self.page_size == Some(0) {
            anyhow::bail!("page_size must be at least 1");
        }

        // Validate glob patterns compile
        for pattern in &self.include {
            Glob::new(pattern).with_context(|| format!("invalid include pattern: {}", pattern))?;
        }
        for pattern in &self.exclude {
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {}", pattern))?;
        }

        Ok(())
    }

    /// Resolve config into compiled form ready for use
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let defaults = PopularityWeights::default();
        let popularity = match &self.popularity {
            Some(p) => PopularityWeights {
                stars: p.star_weight.unwrap_or(defaults.stars),
                forks: p.fork_weight.unwrap_or(defaults.forks),
                penalty: p.penalty.unwrap_or(defaults.penalty),
            },
            None => defaults,
        };

        let ranking = match &self.ranking {
            Some(section) => RankingConfig {
                policy: section
                    .policy
                    .as_ref()
                    .map(PolicyConfig::resolve)
                    .unwrap_or_default(),
                basis: section.basis.unwrap_or_default(),
            },
            None => RankingConfig::default(),
        };

        Ok(ResolvedConfig {
            include: compile_globs(&self.include)?,
            exclude: compile_globs(&self.exclude)?,
            popularity,
            star_ceiling: self
                .cold
                .as_ref()
                .and_then(|c| c.star_ceiling)
                .unwrap_or(DEFAULT_STAR_CEILING),
            ranking,
            activity_window: self.activity_window.unwrap_or(DEFAULT_ACTIVITY_WINDOW),
            exclude_incomplete: self.exclude_incomplete.unwrap_or(false),
            top_n: self.top.unwrap_or(DEFAULT_TOP),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            encoding: self.encoding.unwrap_or_default(),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Check if a repository should be scored based on include/exclude patterns
    pub fn should_include(&self, repo_name: &str) -> bool {
        // Check exclude first
        if let Some(ref exclude) = self.exclude {
            if exclude.is_match(repo_name) {
                return false;
            }
        }

        // If include patterns exist, the name must match at least one
        if let Some(ref include) = self.include {
            return include.is_match(repo_name);
        }

        true
    }

    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        ColdspotsConfig::default().resolve()
    }
}

/// Discover and load a config file from a directory
///
/// Search order:
/// 1. `.coldspotsrc.json`
/// 2. `coldspots.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(ColdspotsConfig, PathBuf)>> {
    for name in [".coldspotsrc.json", "coldspots.config.json"] {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<ColdspotsConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: ColdspotsConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (ColdspotsConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}
