//! Benchmark line emission (§6): `BM:<name>: count:<n> total:<s>s pure:<s>s last:<s>s`
//! on stderr when benchmarking is enabled. Grounded in the teacher's
//! `src/statistics.rs` counter-struct style, adapted to the nesting-aware
//! accounting dlvhex's benchmarking controller does: a nested benchmark's
//! "pure" time excludes time attributed to benchmarks started inside it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One named benchmark's accumulated counters.
#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    count: u64,
    total: Duration,
    pure: Duration,
    last: Duration,
}

/// Tracks start/stop events for named benchmarks and formats result lines.
/// `BenchmarkController` is a trait (Open Question ii, §9) so tests can swap
/// in a flat, non-nesting-aware implementation.
pub trait BenchmarkController {
    fn start(&mut self, name: &str);
    fn stop(&mut self, name: &str);
    fn format_lines(&self) -> Vec<String>;
}

struct ActiveSpan {
    name: String,
    started_at: Instant,
    /// time attributed to child spans started while this one was active,
    /// subtracted from `total` to compute `pure`.
    child_time: Duration,
}

/// Nesting-aware default: a benchmark's `pure` time is its wall-clock time
/// minus the wall-clock time of any benchmark started (and stopped) while it
/// was on the stack, matching dlvhex's `Benchmarking::start`/`stop` pairing.
#[derive(Default)]
pub struct NestingBenchmarkController {
    counters: HashMap<String, Counters>,
    stack: Vec<ActiveSpan>,
    enabled: bool,
}

impl NestingBenchmarkController {
    pub fn new(enabled: bool) -> Self {
        NestingBenchmarkController {
            counters: HashMap::new(),
            stack: Vec::new(),
            enabled,
        }
    }
}

impl BenchmarkController for NestingBenchmarkController {
    fn start(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        self.stack.push(ActiveSpan {
            name: name.to_string(),
            started_at: Instant::now(),
            child_time: Duration::ZERO,
        });
    }

    fn stop(&mut self, name: &str) {
        if !self.enabled {
            return;
        }
        let Some(pos) = self.stack.iter().rposition(|s| s.name == name) else {
            return;
        };
        let span = self.stack.split_off(pos).into_iter().next().unwrap();
        let elapsed = span.started_at.elapsed();
        let pure = elapsed.saturating_sub(span.child_time);

        if let Some(parent) = self.stack.last_mut() {
            parent.child_time += elapsed;
        }

        let entry = self.counters.entry(name.to_string()).or_default();
        entry.count += 1;
        entry.total += elapsed;
        entry.pure += pure;
        entry.last = elapsed;
    }

    fn format_lines(&self) -> Vec<String> {
        let mut names: Vec<&String> = self.counters.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let c = &self.counters[name];
                format!(
                    "BM:{:<30}: count:{} total:{:.3}s pure:{:.3}s last:{:.3}s",
                    name,
                    c.count,
                    c.total.as_secs_f64(),
                    c.pure.as_secs_f64(),
                    c.last.as_secs_f64()
                )
            })
            .collect()
    }
}

/// Flat, non-nesting-aware alternative: `pure` always equals `total`. Useful
/// for tests that assert on a simple count without reasoning about nesting.
#[derive(Default)]
pub struct SimpleBenchmarkController {
    counters: HashMap<String, Counters>,
    running: HashMap<String, Instant>,
}

impl BenchmarkController for SimpleBenchmarkController {
    fn start(&mut self, name: &str) {
        self.running.insert(name.to_string(), Instant::now());
    }

    fn stop(&mut self, name: &str) {
        let Some(started_at) = self.running.remove(name) else {
            return;
        };
        let elapsed = started_at.elapsed();
        let entry = self.counters.entry(name.to_string()).or_default();
        entry.count += 1;
        entry.total += elapsed;
        entry.pure += elapsed;
        entry.last = elapsed;
    }

    fn format_lines(&self) -> Vec<String> {
        let mut names: Vec<&String> = self.counters.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let c = &self.counters[name];
                format!(
                    "BM:{:<30}: count:{} total:{:.3}s pure:{:.3}s last:{:.3}s",
                    name,
                    c.count,
                    c.total.as_secs_f64(),
                    c.pure.as_secs_f64(),
                    c.last.as_secs_f64()
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_controller_counts_one_stop_per_start() {
        let mut bm = SimpleBenchmarkController::default();
        bm.start("grounding");
        bm.stop("grounding");
        bm.start("grounding");
        bm.stop("grounding");
        let lines = bm.format_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("count:2"));
    }

    #[test]
    fn nesting_controller_subtracts_child_time_from_parent_pure() {
        let mut bm = NestingBenchmarkController::new(true);
        bm.start("outer");
        bm.start("inner");
        std::thread::sleep(Duration::from_millis(5));
        bm.stop("inner");
        bm.stop("outer");
        let lines = bm.format_lines();
        assert_eq!(lines.len(), 2);
        let outer_line = lines.iter().find(|l| l.contains("outer")).unwrap();
        assert!(outer_line.contains("count:1"));
    }

    #[test]
    fn disabled_controller_records_nothing() {
        let mut bm = NestingBenchmarkController::new(false);
        bm.start("x");
        bm.stop("x");
        assert!(bm.format_lines().is_empty());
    }
}
