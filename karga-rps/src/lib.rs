//! Rate-paced HTTP load generation on top of karga building blocks.
//!
//! A run issues `floor(rate × duration)` requests against one target. A
//! token bucket [`Pacer`] spaces the dispatches, every request runs on its
//! own task, and outcomes land in lock-free [`Counters`]. Once every task
//! has been joined the run is summarized into a [`Summary`].
//!
//! - [`LoadConfig`]: validated run configuration, also buildable from [`Cli`]
//! - [`Pacer`]: token bucket handing out permits at a steady rate
//! - [`RequestExecutor`]: sends one request and classifies it as an [`Outcome`]
//! - [`Counters`] / [`Tally`]: shared counters and their karga aggregate snapshot
//! - [`Scheduler`]: the paced dispatch loop and its drain barrier
//! - [`Summary`]: elapsed time, counts and achieved throughput
//!
//! The run loop counts outcomes through [`Counters`] directly. [`Outcome`]
//! (a karga `Metric`) and [`Tally`] (a karga `Aggregate`) are the surface for
//! driving a [`RequestExecutor`] from a karga executor instead, e.g. as the
//! action of a `karga::Scenario`.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod executor;
pub mod pacer;
pub mod report;
pub mod scheduler;

pub use aggregate::{Counters, Tally};
pub use config::{Cli, LoadConfig, Rate};
pub use error::{ConfigError, Error, Interrupted, Result};
pub use executor::{transport, Action, FailureCause, Outcome, RequestExecutor};
pub use pacer::Pacer;
pub use report::{Banner, OutputFormat, Summary};
pub use scheduler::{watch_interrupts, CompletedRun, RunPhase, Scheduler, TestRun};
