//! Background job runner.
//!
//! Each registered job gets its own interval loop on a tokio task. All
//! loops share one `watch`-based shutdown signal; a host shutdown flips it
//! and waits for the loops to drain, bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A background job driven by a fixed interval.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Time between runs. The first run happens one interval after start.
    fn interval(&self) -> Duration;

    /// Execute one run.
    async fn run(&self) -> anyhow::Result<()>;
}

/// Owns the job tasks and their shutdown signal.
pub struct JobRunner {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobRunner {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    /// Register a job.
    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Spawn one loop per registered job.
    pub fn start(&mut self) {
        info!("Starting job runner with {} jobs", self.jobs.len());

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let name = job.name();
                let mut ticker = tokio::time::interval(job.interval());

                // interval() fires immediately; swallow the first tick so
                // jobs start one interval after boot
                ticker.tick().await;

                info!(job = name, interval_secs = job.interval().as_secs(), "Job scheduled");

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let start = std::time::Instant::now();
                            match job.run().await {
                                Ok(()) => {
                                    info!(
                                        job = name,
                                        elapsed_ms = start.elapsed().as_millis(),
                                        "Job run completed"
                                    );
                                }
                                Err(e) => {
                                    error!(
                                        job = name,
                                        elapsed_ms = start.elapsed().as_millis(),
                                        error = %e,
                                        "Job run failed"
                                    );
                                }
                            }
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!(job = name, "Job shutting down");
                                break;
                            }
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Signal all job loops to stop. Returns immediately.
    pub fn shutdown(&self) {
        info!("Initiating job runner shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all job loops to finish, bounded by `timeout`.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        let drain = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!("Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(()) => info!("All jobs stopped"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Job for CountingJob {
        fn name(&self) -> &'static str {
            "counting_job"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(20)
        }

        async fn run(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("induced failure")
            }
            Ok(())
        }
    }

    #[test]
    fn test_runner_register() {
        let mut runner = JobRunner::new();
        runner.register(CountingJob {
            runs: Arc::new(AtomicUsize::new(0)),
            fail: false,
        });
        assert_eq!(runner.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_runner_executes_and_stops() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut runner = JobRunner::new();
        runner.register(CountingJob {
            runs: Arc::clone(&runs),
            fail: false,
        });
        runner.start();

        tokio::time::sleep(Duration::from_millis(90)).await;
        runner.shutdown();
        runner.wait_for_shutdown(Duration::from_secs(1)).await;

        let count = runs.load(Ordering::SeqCst);
        assert!(count >= 1, "job should have run at least once, ran {}", count);
    }

    #[tokio::test]
    async fn test_failing_job_keeps_running() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut runner = JobRunner::new();
        runner.register(CountingJob {
            runs: Arc::clone(&runs),
            fail: true,
        });
        runner.start();

        tokio::time::sleep(Duration::from_millis(90)).await;
        runner.shutdown();
        runner.wait_for_shutdown(Duration::from_secs(1)).await;

        // Failures are logged, not fatal; the loop keeps ticking
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut runner = JobRunner::new();
        runner.register(CountingJob {
            runs: Arc::clone(&runs),
            fail: false,
        });
        runner.start();

        runner.shutdown();
        runner.wait_for_shutdown(Duration::from_secs(1)).await;
    }

    #[test]
    fn test_runner_default() {
        let runner = JobRunner::default();
        assert!(runner.jobs.is_empty());
        assert!(runner.handles.is_empty());
    }
}
