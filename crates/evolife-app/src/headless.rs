//! Headless runner: step the simulation a fixed number of times, log a
//! summary, and optionally write a JSON report for CI consumption.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use evolife_core::{Census, Simulation};
use serde::Serialize;
use tracing::info;

/// Environment variable naming the JSON report destination.
pub const REPORT_PATH_ENV: &str = "EVOLIFE_REPORT_FILE";

const SAMPLE_INTERVAL: u64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct HeadlessReport {
    initial: Census,
    samples: Vec<Census>,
    summary: ReportSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
struct ReportSummary {
    steps_run: u64,
    final_population: usize,
    peak_population: usize,
    total_births: u64,
    total_deaths: u64,
    final_energy: i64,
}

impl HeadlessReport {
    fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

/// Run `steps` scheduler steps, sampling the census along the way. The
/// report is written to [`REPORT_PATH_ENV`] when that variable is set.
pub fn run(sim: &mut Simulation, steps: u64) -> Result<HeadlessReport> {
    let initial = sim.census();
    let mut samples = Vec::new();
    let mut peak = initial.population;

    for _ in 0..steps {
        sim.step();
        let census = sim.census();
        peak = peak.max(census.population);
        if census.step % SAMPLE_INTERVAL == 0 {
            samples.push(census);
        }
    }

    let last = sim.census();
    if samples.last() != Some(&last) {
        samples.push(last);
    }

    let summary = ReportSummary {
        steps_run: steps,
        final_population: last.population,
        peak_population: peak,
        total_births: last.births,
        total_deaths: last.deaths,
        final_energy: last.total_energy,
    };
    info!(
        steps_run = summary.steps_run,
        final_population = summary.final_population,
        peak_population = summary.peak_population,
        total_births = summary.total_births,
        total_deaths = summary.total_deaths,
        final_energy = summary.final_energy,
        "headless run completed"
    );

    let report = HeadlessReport {
        initial,
        samples,
        summary,
    };
    if let Some(path) = report_file_path_from_env() {
        report
            .write_json(&path)
            .with_context(|| format!("failed to write headless report to {}", path.display()))?;
    }

    Ok(report)
}

fn report_file_path_from_env() -> Option<PathBuf> {
    std::env::var_os(REPORT_PATH_ENV).and_then(|raw| {
        if raw.is_empty() {
            None
        } else {
            Some(PathBuf::from(raw))
        }
    })
}
