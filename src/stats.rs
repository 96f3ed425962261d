//! Performance statistics collection for `--stats` output.

use std::time::{Duration, Instant};

/// Collects performance counters and phase timings.
///
/// Created when `--stats` is passed, threaded as `Option<&mut Stats>`.
/// Zero cost when `None`: no timing calls, no counter increments.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    // Newton-Raphson
    pub newton_iterations: u32,
    pub newton_unconverged: u32,
    pub device_eval: Duration,
    pub assembly: Duration,
    pub linear_solve: Duration,
    // Linear solves (all analyses)
    pub linear_solves: u32,
    pub failed_solves: u32,
    // Sweeps
    pub points_skipped: u32,
    // Transient
    pub timesteps_accepted: u32,
    pub timesteps_frozen: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            newton_iterations: 0,
            newton_unconverged: 0,
            device_eval: Duration::ZERO,
            assembly: Duration::ZERO,
            linear_solve: Duration::ZERO,
            linear_solves: 0,
            failed_solves: 0,
            points_skipped: 0,
            timesteps_accepted: 0,
            timesteps_frozen: 0,
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== Voltaic Performance Stats ===");

        for (name, dur) in &self.phases {
            eprintln!("  {:<24} {:>8.3}s", name, dur.as_secs_f64());
        }

        if self.newton_iterations > 0 {
            eprintln!("  Newton iterations:      {}", self.newton_iterations);
            eprintln!("    Unconverged solves:   {}", self.newton_unconverged);
            eprintln!("    Device eval:          {:>8.3}s", self.device_eval.as_secs_f64());
            eprintln!("    Assembly:             {:>8.3}s", self.assembly.as_secs_f64());
            eprintln!("    Linear solve:         {:>8.3}s", self.linear_solve.as_secs_f64());
        }

        if self.linear_solves > 0 {
            eprintln!("  Linear solves:          {}  (failed {})", self.linear_solves, self.failed_solves);
        }

        if self.points_skipped > 0 {
            eprintln!("  Sweep points skipped:   {}", self.points_skipped);
        }

        if self.timesteps_accepted > 0 || self.timesteps_frozen > 0 {
            eprintln!(
                "  Timesteps:              accepted={}  frozen={}",
                self.timesteps_accepted, self.timesteps_frozen
            );
        }

        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
    }
}
