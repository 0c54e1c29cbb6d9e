//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - hexsolver.toml (default configuration)
//! - hexsolver.local.toml (git-ignored local overrides)
//! - Environment variables (HEXSOLVER_ prefix)
//!
//! ## Example
//!
//! ```toml
//! # hexsolver.toml
//! [solver]
//! clasp_config = "frumpy"
//! defer_ms = 10
//!
//! [limits]
//! max_models = 0
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! HEXSOLVER_SOLVER__DEFER_MS=20
//! HEXSOLVER_LIMITS__MAX_MODELS=5
//! ```

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level solver configuration, merged from defaults, files and env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Directories searched for plugin shared objects (`--pluginpath` / `DLVHEX_PLUGIN_PATH`).
    #[serde(default)]
    pub plugin_path: Vec<PathBuf>,

    #[serde(default)]
    pub solver: SolverTuning,

    #[serde(default)]
    pub limits: ResourceLimits,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// clasp-like tuning knobs, named after the CLI flags they back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverTuning {
    /// Backend selection: only `internal` is implemented; `clasp` is accepted
    /// for CLI compatibility and rejected at startup with a usage error.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// `--claspconfig=frumpy|jumpy|handy|crafty|trendy|<raw>`. Stored verbatim;
    /// the internal backend only inspects it for VSIDS-vs-random tie-break bias.
    #[serde(default = "default_clasp_config")]
    pub clasp_config: String,

    /// `--claspdefer-ms=N`: minimum milliseconds between external re-evaluations.
    #[serde(default)]
    pub defer_ms: u64,

    /// `--claspdefer-n=N`: minimum skipped propagation rounds before re-evaluating.
    #[serde(default)]
    pub defer_n: u32,

    /// `--integratenextopt`: fold each improving model's cost into the bound
    /// immediately rather than waiting for the next enumeration request.
    #[serde(default)]
    pub integrate_next_optimum: bool,
}

fn default_backend() -> String {
    "internal".to_string()
}

fn default_clasp_config() -> String {
    "frumpy".to_string()
}

impl Default for SolverTuning {
    fn default() -> Self {
        SolverTuning {
            backend: default_backend(),
            clasp_config: default_clasp_config(),
            defer_ms: 0,
            defer_n: 0,
            integrate_next_optimum: false,
        }
    }
}

impl SolverTuning {
    pub fn defer_duration(&self) -> Duration {
        Duration::from_millis(self.defer_ms)
    }
}

/// Resource bounds checked cooperatively by the orchestrator (§5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of models to enumerate (0 = unbounded).
    #[serde(default)]
    pub max_models: usize,

    /// Maximum decision level the CDNL engine is allowed to reach before
    /// treating the search as exhausted-with-timeout.
    #[serde(default)]
    pub max_decision_level: Option<usize>,

    /// Wall-clock budget for one `solve` call (None = unbounded).
    #[serde(default)]
    pub timeout: Option<Duration>,

    /// Soft ceiling on the number of live no-goods before `defragment` runs
    /// aggressively (see `NogoodStore::remove_least_frequently_added`).
    #[serde(default = "default_nogood_ceiling")]
    pub max_nogoods: usize,
}

fn default_nogood_ceiling() -> usize {
    100_000
}

impl Default for ResourceLimits {
    fn default() -> Self {
        ResourceLimits {
            max_models: 0,
            max_decision_level: None,
            timeout: None,
            max_nogoods: default_nogood_ceiling(),
        }
    }
}

/// Logging configuration (tracing subscriber).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Answer-set output shaping, `--filter`/`--nofacts`/`--firstmodel`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Predicate names to include; empty means "all predicates".
    #[serde(default)]
    pub filter: Vec<String>,

    /// Suppress EDB facts from printed models.
    #[serde(default)]
    pub nofacts: bool,

    /// Stop after the first model.
    #[serde(default)]
    pub firstmodel: bool,

    /// Atom names whose guess/answer disagreements are explained on stderr
    /// (`--explanation-atoms=...`).
    #[serde(default)]
    pub explanation_atoms: Vec<String>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            plugin_path: Vec::new(),
            solver: SolverTuning::default(),
            limits: ResourceLimits::default(),
            logging: LoggingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. `hexsolver.toml` (base configuration)
    /// 2. `hexsolver.local.toml` (local overrides, git-ignored)
    /// 3. Environment variables (`HEXSOLVER_` prefix, `__`-nested)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("hexsolver.toml"))
            .merge(Toml::file("hexsolver.local.toml"))
            .merge(Env::prefixed("HEXSOLVER_").split("__"))
            .extract()
    }

    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("HEXSOLVER_").split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internal_backend_unbounded_models() {
        let config = SolverConfig::default();
        assert_eq!(config.solver.backend, "internal");
        assert_eq!(config.limits.max_models, 0);
        assert!(!config.output.firstmodel);
    }

    #[test]
    fn serializes_to_expected_sections() {
        let config = SolverConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[solver]"));
        assert!(toml_str.contains("[limits]"));
        assert!(toml_str.contains("[output]"));
    }
}
