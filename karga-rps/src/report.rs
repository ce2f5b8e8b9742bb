use std::{fmt, io, time::Duration};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::Tally,
    config::{LoadConfig, Rate},
    scheduler::CompletedRun,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Printed once before the first request goes out.
#[derive(Debug, Clone, Copy)]
pub struct Banner {
    pub rate: Rate,
    pub duration_secs: u64,
    pub total_requests: u64,
}

impl From<&LoadConfig> for Banner {
    fn from(config: &LoadConfig) -> Self {
        Self {
            rate: config.rate,
            duration_secs: config.duration_secs.get(),
            total_requests: config.total_requests(),
        }
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Starting test: {} RPS for {} seconds (total {} requests)...",
            self.rate, self.duration_secs, self.total_requests
        )
    }
}

/// Final numbers of a run. Built once, from a drained run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub elapsed_secs: f64,
    pub total_requests: u64,
    pub dispatched: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Successful requests per elapsed second.
    pub actual_rps: f64,
    pub interrupted: bool,
}

impl Summary {
    pub fn new(run: CompletedRun, tally: Tally) -> Self {
        let elapsed_secs = run.elapsed.as_secs_f64();
        let actual_rps = if elapsed_secs > 0.0 {
            tally.success_count as f64 / elapsed_secs
        } else {
            0.0
        };

        Self {
            elapsed_secs,
            total_requests: run.total_requests,
            dispatched: run.dispatched,
            success_count: tally.success_count,
            failure_count: tally.failure_count,
            actual_rps,
            interrupted: run.interrupted,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_secs)
    }

    pub fn write_to<W: io::Write>(&self, format: OutputFormat, mut out: W) -> io::Result<()> {
        match format {
            OutputFormat::Human => writeln!(out, "\n{self}"),
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut out, self)?;
                writeln!(out)
            }
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.interrupted {
            writeln!(
                f,
                "--- Test Interrupted ({} of {} requests dispatched) ---",
                self.dispatched, self.total_requests
            )?;
        } else {
            writeln!(f, "--- Test Finished ---")?;
        }
        writeln!(f, "Total duration: {:.2} seconds", self.elapsed_secs)?;
        writeln!(f, "Successful requests: {}", self.success_count)?;
        writeln!(f, "Failed requests: {}", self.failure_count)?;
        write!(f, "Actual RPS: {:.2}", self.actual_rps)
    }
}
