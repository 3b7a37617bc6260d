//! Runs the load and transaction phases on a pool of client threads.
//!
//! Every client thread owns a private [`WorkloadEngine`] and a private backend handle on the
//! shared [`InMemoryStore`]. Threads share nothing else but the [`KeySpace`] counters and the
//! measurement sink of the current phase.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use txbench_workload::measure::LabelSummary;
use txbench_workload::{
    InMemoryBackend, InMemoryStore, KeySpace, Measurements, WorkloadConfig, WorkloadEngine,
};

use crate::config::Config;

/// The two phases of a benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Inserts the initial records.
    Load,
    /// Runs the measured operation mix.
    Run,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => f.write_str("LOAD"),
            Self::Run => f.write_str("RUN"),
        }
    }
}

/// Outcome of one phase across all client threads.
#[derive(Debug)]
pub struct PhaseReport {
    /// The phase this report covers.
    pub phase: Phase,
    /// Number of client threads.
    pub threads: usize,
    /// Logical operations issued, including failed ones.
    pub operations: u64,
    /// Logical operations that failed.
    pub failed: u64,
    /// Wall time of the whole phase.
    pub elapsed: Duration,
    /// Latency summary per operation label.
    pub labels: Vec<LabelSummary>,
}

impl PhaseReport {
    /// Logical operations per second of wall time.
    pub fn throughput(&self) -> f64 {
        match self.elapsed.as_secs_f64() {
            secs if secs > 0.0 => self.operations as f64 / secs,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct WorkerStats {
    operations: u64,
    failed: u64,
}

impl WorkerStats {
    fn record(&mut self, success: bool) {
        self.operations += 1;
        if !success {
            self.failed += 1;
        }
    }
}

/// A benchmark over a single in-memory store.
#[derive(Debug)]
pub struct Benchmark {
    config: Arc<Config>,
    store: Arc<InMemoryStore>,
    keys: KeySpace,
}

impl Benchmark {
    /// Creates a benchmark with an empty store.
    pub fn new(config: Config) -> Self {
        let keys = KeySpace::new(&config.workload);
        Self {
            config: Arc::new(config),
            store: InMemoryStore::new(),
            keys,
        }
    }

    /// The store the benchmark runs against.
    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    /// Inserts all records of the keyspace.
    ///
    /// Threads claim keys from the shared load sequence until it is exhausted, so the records are
    /// divided among them.
    pub async fn load(&self) -> Result<PhaseReport> {
        tracing::info!(
            records = self.config.workload.record_count,
            threads = self.config.threads,
            "Starting load phase"
        );

        self.execute(Phase::Load, None, |engine, backend, _operations, _token| {
            let mut stats = WorkerStats::default();
            while let Some(success) = engine.load_batch(backend) {
                stats.record(success);
            }
            stats
        })
        .await
    }

    /// Runs the configured number of logical operations, or until the configured duration
    /// elapses.
    pub async fn run(&self) -> Result<PhaseReport> {
        tracing::info!(
            operations = self.config.operation_count,
            duration = ?self.config.duration,
            threads = self.config.threads,
            engine = ?self.config.engine,
            "Starting run phase"
        );

        self.execute(
            Phase::Run,
            self.config.duration,
            |engine, backend, operations, token| {
                let mut stats = WorkerStats::default();
                while operations.is_none_or(|limit| stats.operations < limit) {
                    if token.is_cancelled() {
                        break;
                    }
                    stats.record(engine.do_transaction(backend));
                }
                stats
            },
        )
        .await
    }

    async fn execute<F>(
        &self,
        phase: Phase,
        duration: Option<Duration>,
        worker: F,
    ) -> Result<PhaseReport>
    where
        F: Fn(
                &mut WorkloadEngine,
                &mut InMemoryBackend,
                Option<u64>,
                &CancellationToken,
            ) -> WorkerStats
            + Clone
            + Send
            + 'static,
    {
        let threads = self.config.threads;
        let measurements = Arc::new(Measurements::new());
        let token = CancellationToken::new();

        // all engines are built before the first thread starts
        let mut engines = Vec::with_capacity(threads);
        for index in 0..threads {
            let workload = thread_workload(&self.config.workload, index);
            let engine = WorkloadEngine::new(
                self.config.engine,
                &workload,
                self.keys.clone(),
                measurements.clone(),
            )?;
            engines.push(engine);
        }

        let bar = ProgressBar::new_spinner()
            .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
            .with_message(format!("Running {} phase:", phase.to_string().to_lowercase()));
        bar.enable_steady_tick(Duration::from_millis(100));

        let start = Instant::now();
        let timer = duration.map(|duration| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                tracing::debug!("Duration elapsed, stopping workers");
                token.cancel();
            })
        });

        let tasks: Vec<_> = engines
            .into_iter()
            .enumerate()
            .map(|(index, mut engine)| {
                let mut backend = self.store.connect();
                let operations = match phase {
                    Phase::Load => None,
                    Phase::Run => thread_operations(self.config.operation_count, threads, index),
                };
                let token = token.clone();
                let worker = worker.clone();

                tokio::task::spawn_blocking(move || {
                    let stats = worker(&mut engine, &mut backend, operations, &token);
                    tracing::debug!(
                        thread = index,
                        operations = stats.operations,
                        failed = stats.failed,
                        "Client thread finished"
                    );
                    stats
                })
            })
            .collect();

        let finished = futures::future::join_all(tasks).await;
        let elapsed = start.elapsed();
        if let Some(timer) = timer {
            timer.abort();
        }
        bar.finish_and_clear();

        let mut operations = 0;
        let mut failed = 0;
        for stats in finished {
            let stats = stats?;
            operations += stats.operations;
            failed += stats.failed;
        }

        tracing::info!(%phase, operations, failed, ?elapsed, "Phase finished");

        Ok(PhaseReport {
            phase,
            threads,
            operations,
            failed,
            elapsed,
            labels: measurements.snapshot(),
        })
    }
}

/// The workload of one client thread, with a distinct seed per thread if seeded at all.
fn thread_workload(workload: &WorkloadConfig, index: usize) -> WorkloadConfig {
    WorkloadConfig {
        seed: workload.seed.map(|seed| seed.wrapping_add(index as u64)),
        ..workload.clone()
    }
}

/// Operations for one client thread, or `None` if bounded by duration only.
///
/// The remainder of the division goes to the first threads.
fn thread_operations(total: u64, threads: usize, index: usize) -> Option<u64> {
    if total == 0 {
        return None;
    }

    let threads = threads as u64;
    let index = index as u64;
    Some(total / threads + u64::from(index < total % threads))
}
