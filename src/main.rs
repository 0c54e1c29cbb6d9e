//! `hexsolver` CLI binary: parses flags, loads a HEX program, solves it, and
//! prints answer sets in the dlvhex `{a,b,c}` convention, one per line.

use std::io::Read as _;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hexsolver::benchmark::{BenchmarkController, NestingBenchmarkController};
use hexsolver::cli::{split_plugin_args, Cli};
use hexsolver::config::{LoggingConfig, OutputConfig, SolverConfig};
use hexsolver::error::{HexError, HexResult};
use hexsolver::execution::SolveTimeout;
use hexsolver::id::Id;
use hexsolver::orchestrator::{self, SolveLimits};
use hexsolver::plugins;
use hexsolver::registry::{Registry, TermValue};

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let (known_args, plugin_args) = split_plugin_args(&raw);
    let cli = Cli::parse_from(std::iter::once("hexsolver".to_string()).chain(known_args));

    match run(&cli, &plugin_args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("hexsolver: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli, plugin_args: &std::collections::HashMap<String, String>) -> HexResult<ExitCode> {
    let base_config = match &cli.config {
        Some(path) => SolverConfig::from_file(&path.to_string_lossy()).map_err(|e| HexError::usage(e.to_string()))?,
        None => SolverConfig::load().unwrap_or_default(),
    };
    let config = cli.apply_to(base_config);
    init_tracing(&config.logging, cli.verbose);

    if config.solver.backend != "internal" {
        return Err(HexError::usage(format!(
            "--solver={} is not implemented by this build; only \"internal\" is supported",
            config.solver.backend
        )));
    }
    if !plugin_args.is_empty() {
        tracing::debug!(?plugin_args, "forwarded plugin arguments (no bundled plugin consumes CLI flags)");
    }

    let source = read_source(&cli.inputs)?;

    let registry = Arc::new(Registry::new());
    let plugin_table = plugins::default_plugins(registry.clone());
    let limits = SolveLimits {
        max_models: config.limits.max_models,
        first_model_only: config.output.firstmodel,
        optimize: cli.opt || config.solver.integrate_next_optimum,
    };
    let defer = cli.defer_config();

    let timeout = SolveTimeout::new(config.limits.timeout);
    let mut bench = NestingBenchmarkController::new(cli.bench);
    bench.start("solve");
    let models = orchestrator::solve_with_timeout(&registry, &plugin_table, &source, limits, defer, timeout)?;
    bench.stop("solve");
    if cli.bench {
        for line in bench.format_lines() {
            eprintln!("{line}");
        }
    }

    if models.is_empty() {
        println!("UNSATISFIABLE");
        return Ok(ExitCode::from(1));
    }

    for model in &models {
        println!("{}", render_model(&registry, &model.atoms, &config.output));
    }
    println!("SATISFIABLE");
    Ok(ExitCode::SUCCESS)
}

fn read_source(inputs: &[std::path::PathBuf]) -> HexResult<String> {
    if inputs.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| HexError::usage(format!("reading stdin: {e}")))?;
        return Ok(buf);
    }
    let mut combined = String::new();
    for path in inputs {
        let text = std::fs::read_to_string(path).map_err(|e| HexError::usage(format!("reading {}: {e}", path.display())))?;
        combined.push_str(&text);
        combined.push('\n');
    }
    Ok(combined)
}

fn init_tracing(logging: &LoggingConfig, verbose: u8) {
    let default_level = match verbose {
        0 => logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if logging.format == "json" {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

/// Renders one answer set as `{a(1),b(2),...}`, applying the `--filter`
/// predicate allowlist and skipping internal auxiliary atoms (guess pairs,
/// rule-body completion atoms) that never belong in surface output.
fn render_model(registry: &Registry, atoms: &[Id], output: &OutputConfig) -> String {
    let mut rendered: Vec<String> = atoms
        .iter()
        .filter(|&&a| !is_internal(registry, a))
        .filter_map(|&a| render_atom(registry, a))
        .filter(|text| predicate_allowed(text, &output.filter))
        .collect();
    rendered.sort();
    rendered.dedup();
    format!("{{{}}}", rendered.join(","))
}

fn is_internal(registry: &Registry, atom: Id) -> bool {
    atom.is_auxiliary() || registry.lookup_auxiliary_external(atom).is_some()
}

fn predicate_allowed(rendered_atom: &str, filter: &[String]) -> bool {
    if filter.is_empty() {
        return true;
    }
    let predicate = rendered_atom.split('(').next().unwrap_or(rendered_atom);
    filter.iter().any(|p| p == predicate)
}

fn render_atom(registry: &Registry, atom: Id) -> Option<String> {
    let value = registry.get_ordinary_atom(atom)?;
    if value.args.is_empty() {
        return Some(value.predicate);
    }
    let args: Vec<String> = value.args.iter().map(|&a| render_term(registry, a)).collect();
    Some(format!("{}({})", value.predicate, args.join(",")))
}

fn render_term(registry: &Registry, term: Id) -> String {
    if let Some(v) = term.int_value() {
        return v.to_string();
    }
    match registry.get_term(term) {
        Some(TermValue::Constant(s)) => s,
        Some(TermValue::QuotedString(s)) => s,
        Some(TermValue::Variable(s)) => s,
        Some(TermValue::Nested { functor, args }) => {
            let rendered: Vec<String> = args.iter().map(|&a| render_term(registry, a)).collect();
            format!("{functor}({})", rendered.join(","))
        }
        None => "?".to_string(),
    }
}
