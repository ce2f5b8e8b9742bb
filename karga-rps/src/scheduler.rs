use std::{future::Future, io, sync::Arc, time::Duration};

use tokio::{
    task::{JoinError, JoinSet},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{
    aggregate::Counters,
    config::LoadConfig,
    executor::{Action, FailureCause, Outcome},
    pacer::Pacer,
    report::Summary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Scheduling,
    Draining,
    Completed,
}

/// Bookkeeping of a single run, from first permit to drained.
#[derive(Debug)]
pub struct TestRun {
    phase: RunPhase,
    total_requests: u64,
    dispatched: u64,
    interrupted: bool,
    started_at: Option<Instant>,
}

impl TestRun {
    pub fn new(total_requests: u64) -> Self {
        Self {
            phase: RunPhase::NotStarted,
            total_requests,
            dispatched: 0,
            interrupted: false,
            started_at: None,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    fn begin(&mut self) {
        debug_assert_eq!(self.phase, RunPhase::NotStarted);
        self.phase = RunPhase::Scheduling;
        self.started_at = Some(Instant::now());
    }

    fn record_dispatch(&mut self) {
        debug_assert_eq!(self.phase, RunPhase::Scheduling);
        debug_assert!(self.dispatched < self.total_requests);
        self.dispatched += 1;
    }

    fn begin_drain(&mut self, interrupted: bool) {
        debug_assert_eq!(self.phase, RunPhase::Scheduling);
        self.phase = RunPhase::Draining;
        self.interrupted = interrupted;
    }

    /// Closes the run. Only a drained run can complete, and only once.
    fn complete(&mut self) -> CompletedRun {
        debug_assert_eq!(self.phase, RunPhase::Draining);
        self.phase = RunPhase::Completed;

        CompletedRun {
            elapsed: self
                .started_at
                .map(|started_at| started_at.elapsed())
                .unwrap_or_default(),
            total_requests: self.total_requests,
            dispatched: self.dispatched,
            interrupted: self.interrupted,
        }
    }
}

/// A run whose every dispatched unit has finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletedRun {
    pub(crate) elapsed: Duration,
    pub(crate) total_requests: u64,
    pub(crate) dispatched: u64,
    pub(crate) interrupted: bool,
}

/// Paces `total_requests` dispatches of an [`Action`], then drains them.
///
/// Each dispatch is its own task; the scheduler never waits on a request
/// before issuing the next one. Only the pacer limits throughput.
pub struct Scheduler<A> {
    action: Arc<A>,
    pacer: Pacer,
    total_requests: u64,
    counters: Arc<Counters>,
    cancel: CancellationToken,
}

impl<A: Action> Scheduler<A> {
    pub fn new(action: A, config: &LoadConfig) -> Self {
        Self {
            action: Arc::new(action),
            pacer: Pacer::new(config.rate, config.burst),
            total_requests: config.total_requests(),
            counters: Arc::new(Counters::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Stops dispatching once `cancel` fires. Dispatched units still drain.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Live view of the counters, e.g. for progress reporting.
    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub async fn run(mut self) -> Summary {
        let mut run = TestRun::new(self.total_requests);
        let mut units = JoinSet::new();
        let mut interrupted = false;

        if self.total_requests == 0 {
            tracing::warn!("rate and duration yield zero requests, nothing to dispatch");
        }
        tracing::info!(total_requests = self.total_requests, "scheduling started");
        run.begin();

        for _ in 0..self.total_requests {
            if self.pacer.acquire(&self.cancel).await.is_err() {
                tracing::warn!(
                    dispatched = run.dispatched(),
                    total_requests = self.total_requests,
                    "scheduling interrupted, draining dispatched requests"
                );
                interrupted = true;
                break;
            }

            let action = Arc::clone(&self.action);
            let counters = Arc::clone(&self.counters);
            units.spawn(async move {
                let outcome = action.perform().await;
                counters.record(&outcome);
            });
            run.record_dispatch();

            while let Some(joined) = units.try_join_next() {
                self.reap(joined);
            }
        }

        run.begin_drain(interrupted);
        tracing::info!(
            dispatched = run.dispatched(),
            in_flight = units.len(),
            "scheduling finished, draining"
        );

        while let Some(joined) = units.join_next().await {
            self.reap(joined);
        }

        let completed = run.complete();
        let summary = Summary::new(completed, self.counters.snapshot());
        tracing::info!(
            elapsed_secs = summary.elapsed_secs,
            success = summary.success_count,
            failure = summary.failure_count,
            "run completed"
        );
        summary
    }

    /// A unit that never recorded its outcome still counts once.
    fn reap(&self, joined: Result<(), JoinError>) {
        if let Err(err) = joined {
            tracing::warn!(error = %err, "request unit aborted");
            self.counters.record(&Outcome::Failure(FailureCause::Aborted));
        }
    }
}

/// Cancels `cancel` on the first interrupt, then returns on the second.
///
/// The first interrupt lets dispatched requests drain; returning hands the
/// caller a way out of a drain that is stuck on unresponsive requests. Fails
/// if interrupts cannot be listened for, in which case `cancel` is left alone.
pub async fn watch_interrupts<S, F>(cancel: CancellationToken, mut interrupt: S) -> io::Result<()>
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
{
    interrupt().await?;
    tracing::warn!("interrupt received, no further requests will be dispatched");
    cancel.cancel();

    interrupt().await?;
    tracing::warn!("second interrupt received, abandoning in-flight requests");
    Ok(())
}
