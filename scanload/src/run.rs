//! Run the scenario with a fixed number of virtual users and print a summary.
//!
//! This is a smoke run for checking a target and a configuration locally. It does not ramp
//! virtual users up or down and does not evaluate thresholds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use yansi::Paint;

use crate::metrics::{EXCEPTION, ITERATIONS, Snapshot};
use crate::scenario::{Scenario, VirtualUser};

/// Totals of a smoke run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    /// Number of virtual users.
    pub users: u64,
    /// Completed iterations over all users.
    pub iterations: u64,
    /// Iterations in which every check passed.
    pub passed: u64,
    /// Iterations with a failed check or an exception.
    pub failed: u64,
    /// Iterations that received a response.
    pub responses: u64,
    /// Sum of the response times of all received responses.
    pub response_time: Duration,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl RunStats {
    fn add(&mut self, other: &RunStats) {
        self.iterations += other.iterations;
        self.passed += other.passed;
        self.failed += other.failed;
        self.responses += other.responses;
        self.response_time += other.response_time;
    }

    /// Mean response time, if any response was received.
    pub fn average_response_time(&self) -> Option<Duration> {
        let responses = u32::try_from(self.responses).ok().filter(|r| *r > 0)?;
        Some(self.response_time / responses)
    }
}

/// Runs `iterations` iterations on each of `users` concurrent virtual users.
///
/// Virtual user `n` (starting at 1) is seeded with `seed + n - 1`, so a run is reproducible
/// given the same seed and responses.
pub async fn run(
    scenario: Arc<Scenario>,
    users: u64,
    iterations: u64,
    seed: u64,
) -> Result<RunStats> {
    let start = Instant::now();

    let tasks: Vec<_> = (0..users)
        .map(|index| {
            let scenario = Arc::clone(&scenario);
            let user = VirtualUser::new(index + 1, seed.wrapping_add(index));
            tokio::spawn(run_user(scenario, user, iterations))
        })
        .collect();

    let mut stats = RunStats {
        users,
        ..Default::default()
    };
    for task in futures::future::join_all(tasks).await {
        stats.add(&task?);
    }
    stats.elapsed = start.elapsed();

    tracing::info!(
        users,
        iterations = stats.iterations,
        failed = stats.failed,
        elapsed = ?stats.elapsed,
        "smoke run finished"
    );

    Ok(stats)
}

async fn run_user(scenario: Arc<Scenario>, mut user: VirtualUser, iterations: u64) -> RunStats {
    let mut stats = RunStats::default();

    for _ in 0..iterations {
        let report = scenario.iterate(&mut user).await;

        stats.iterations += 1;
        if report.passed() {
            stats.passed += 1;
        } else {
            stats.failed += 1;
        }
        if let Some(duration) = report.duration {
            stats.responses += 1;
            stats.response_time += duration;
        }
    }

    tracing::debug!(
        user = user.id(),
        iterations = user.iteration(),
        "virtual user finished"
    );
    stats
}

/// Prints run totals and per-check outcomes to stdout.
pub fn print_summary(stats: &RunStats, snapshot: &Snapshot) {
    println!();
    println!(
        "{} (users: {}, iterations: {})",
        "## Smoke run".bold(),
        stats.users.bold(),
        snapshot.counter(ITERATIONS).blue()
    );

    print!(
        "{} ({} ops",
        "ITERATIONS:".bold().green(),
        stats.iterations.bold()
    );
    if stats.failed > 0 {
        print!(", {}", format!("{} FAILED", stats.failed).bold().red());
    }
    println!(")");
    print_ops(stats.iterations, stats.elapsed);
    match stats.average_response_time() {
        Some(avg) => println!(", avg response time: {:.2?}", avg.bold()),
        None => println!(),
    }

    let totals = snapshot.check_totals();
    print!("{} ({} passed", "CHECKS:".bold().green(), totals.passes.bold());
    if totals.fails > 0 {
        print!(", {}", format!("{} FAILED", totals.fails).bold().red());
    }
    println!(")");
    for (name, tally) in &snapshot.checks {
        if tally.fails == 0 {
            println!("  {} {name}", "✓".green());
        } else {
            println!(
                "  {} {name} ({} / {} failed)",
                "✗".red(),
                tally.fails.bold(),
                tally.passes + tally.fails
            );
        }
    }

    let exceptions = snapshot.counter(EXCEPTION);
    if exceptions > 0 {
        println!("{}", format!("{exceptions} EXCEPTIONS").bold().red());
    }
}

fn print_ops(ops: u64, duration: Duration) {
    let ops_ps = ops as f64 / duration.as_secs_f64().max(f64::EPSILON);
    print!("  {:.2} iterations/s", ops_ps.bold());
}
