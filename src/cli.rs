//! Command-line surface (§6, indicative): argument parsing via `clap`
//! derive, with an upfront pass that peels off unrecognized `--<plugin>-*`
//! flags for forwarding instead of letting `clap` reject them. Grounded in
//! the teacher's `src/bin/server.rs`/`src/bin/client.rs` manual
//! `get_arg`-style option handling, adapted to `clap` since that is the
//! crate this project's CLI surface is built on rather than the teacher's
//! ad hoc `env::args()` scan.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;

use crate::config::SolverConfig;
use crate::propagator::DeferConfig;

/// Ground answer-set solver for HEX programs with external atoms.
#[derive(Parser, Debug)]
#[command(name = "hexsolver", version, about, disable_help_subcommand = true)]
pub struct Cli {
    /// HEX program file(s) to solve. Reads stdin when none are given.
    pub inputs: Vec<PathBuf>,

    /// Layered config file to merge on top of `hexsolver.toml` (figment).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Diagnostic verbosity level.
    #[arg(long = "verbose", default_value_t = 0)]
    pub verbose: u8,

    /// Restrict printed models to these predicates (comma-separated).
    #[arg(long = "filter", value_delimiter = ',')]
    pub filter: Vec<String>,

    /// Stop after the first answer set.
    #[arg(long = "firstmodel")]
    pub firstmodel: bool,

    /// Suppress EDB facts from printed models.
    #[arg(long = "nofacts")]
    pub nofacts: bool,

    /// Maximum number of models to enumerate (0 = unbounded).
    #[arg(long = "number", short = 'n', default_value_t = 0)]
    pub number: usize,

    /// Only print optimal models (by weak-constraint cost).
    #[arg(long = "opt")]
    pub opt: bool,

    /// Solver backend. Only `internal` is implemented; `clasp` is accepted
    /// for CLI compatibility and rejected with a usage error at startup.
    #[arg(long = "solver", default_value = "internal")]
    pub solver: String,

    /// clasp-style heuristic configuration name, stored verbatim.
    #[arg(long = "claspconfig", default_value = "frumpy")]
    pub clasp_config: String,

    /// Minimum milliseconds between external-atom re-evaluations.
    #[arg(long = "claspdefer-ms", default_value_t = 0)]
    pub clasp_defer_ms: u64,

    /// Minimum skipped propagation rounds before re-evaluating.
    #[arg(long = "claspdefer-n", default_value_t = 0)]
    pub clasp_defer_n: u32,

    /// Fold each improving model's cost into the bound immediately.
    #[arg(long = "integratenextopt")]
    pub integrate_next_optimum: bool,

    /// Atom names whose guess/answer disagreements are explained on stderr.
    #[arg(long = "explanation-atoms", value_delimiter = ',')]
    pub explanation_atoms: Vec<String>,

    /// Emit `BM:...` benchmark lines on stderr.
    #[arg(long = "bench")]
    pub bench: bool,
}

impl Cli {
    /// Merges CLI flags on top of a loaded [`SolverConfig`]: flags win.
    pub fn apply_to(&self, mut config: SolverConfig) -> SolverConfig {
        if !self.filter.is_empty() {
            config.output.filter = self.filter.clone();
        }
        config.output.nofacts |= self.nofacts;
        config.output.firstmodel |= self.firstmodel;
        if !self.explanation_atoms.is_empty() {
            config.output.explanation_atoms = self.explanation_atoms.clone();
        }
        if self.solver != "internal" {
            config.solver.backend = self.solver.clone();
        }
        if self.clasp_config != "frumpy" {
            config.solver.clasp_config = self.clasp_config.clone();
        }
        if self.clasp_defer_ms != 0 {
            config.solver.defer_ms = self.clasp_defer_ms;
        }
        if self.clasp_defer_n != 0 {
            config.solver.defer_n = self.clasp_defer_n;
        }
        config.solver.integrate_next_optimum |= self.integrate_next_optimum;
        if self.number != 0 {
            config.limits.max_models = self.number;
        }
        config
    }

    pub fn defer_config(&self) -> DeferConfig {
        DeferConfig {
            min_elapsed: std::time::Duration::from_millis(self.clasp_defer_ms),
            min_skipped: self.clasp_defer_n,
        }
    }
}

/// Splits raw `argv` (excluding `argv[0]`) into arguments `clap` understands
/// and `--<pluginname>-<flag>[=value]` arguments meant for plugin forwarding.
/// Plugins in this build are compiled in rather than dynamically loaded, so
/// forwarded flags are exposed to them as a plain name/value map rather than
/// through a plugin-defined argument parser.
pub fn split_plugin_args(raw: &[String]) -> (Vec<String>, HashMap<String, String>) {
    const KNOWN: &[&str] = &[
        "config",
        "verbose",
        "filter",
        "firstmodel",
        "nofacts",
        "number",
        "opt",
        "solver",
        "claspconfig",
        "claspdefer-ms",
        "claspdefer-n",
        "integratenextopt",
        "explanation-atoms",
        "bench",
        "help",
        "version",
    ];
    let mut known_args = Vec::with_capacity(raw.len());
    let mut plugin_args = HashMap::new();
    for arg in raw {
        if let Some(body) = arg.strip_prefix("--") {
            let name = body.split('=').next().unwrap_or(body);
            if !KNOWN.contains(&name) {
                let (key, value) = body.split_once('=').unwrap_or((body, ""));
                plugin_args.insert(key.to_string(), value.to_string());
                continue;
            }
        }
        known_args.push(arg.clone());
    }
    (known_args, plugin_args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_plugin_flag_is_forwarded_not_passed_to_clap() {
        let raw = vec!["--firstmodel".to_string(), "--myplugin-timeout=500".to_string(), "program.hex".to_string()];
        let (known, plugin_args) = split_plugin_args(&raw);
        assert_eq!(known, vec!["--firstmodel".to_string(), "program.hex".to_string()]);
        assert_eq!(plugin_args.get("myplugin-timeout"), Some(&"500".to_string()));
    }

    #[test]
    fn known_flags_pass_through_untouched() {
        let raw = vec!["--claspconfig=jumpy".to_string(), "--number".to_string(), "3".to_string()];
        let (known, plugin_args) = split_plugin_args(&raw);
        assert_eq!(known, raw);
        assert!(plugin_args.is_empty());
    }

    #[test]
    fn cli_parses_known_flags() {
        let cli = Cli::parse_from(["hexsolver", "--firstmodel", "--number", "5", "a.hex"]);
        assert!(cli.firstmodel);
        assert_eq!(cli.number, 5);
        assert_eq!(cli.inputs, vec![PathBuf::from("a.hex")]);
    }
}
