//! Process lifecycle runner with a drain-on-shutdown protocol.
//!
//! The runner owns three phases: RUNNING (app processes execute
//! concurrently), DRAINING (a termination signal or process failure cancels
//! every process, then the registered closers run under a timeout), and
//! STOPPED (the process exits). SIGINT and SIGTERM trigger identical drain
//! behavior. The exit code is 0 only when every process and every closer
//! finished cleanly; any drain error exits nonzero.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A long-running app process; runs until its cancellation token fires.
pub type Process = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

/// A cleanup step executed while draining, after all processes have stopped.
pub type Closer = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send>;

pub struct Runner {
    processes: Vec<Process>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(30),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds an app process. If any process errors, all are cancelled and the
    /// runner drains.
    pub fn with_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.with_boxed_process(Box::new(|token| Box::pin(process(token))))
    }

    /// Adds an already-boxed process, as produced by
    /// `IngestWorker::into_runner_processes`.
    pub fn with_boxed_process(mut self, process: Process) -> Self {
        self.processes.push(process);
        self
    }

    /// Adds a closer. Closers run in registration order during drain,
    /// regardless of why the processes stopped.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// Upper bound on the whole drain phase. Default 30 s.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Overrides the cancellation token, allowing external shutdown control.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs until a signal or process failure, drains, then exits the
    /// process with 0 on a clean drain and 1 otherwise.
    pub async fn run(self) {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for process in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move { process(process_token).await });
        }

        spawn_signal_handlers(token.clone());

        // RUNNING: wait for a failure or cancellation
        let mut process_failed = false;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => debug!("app process completed"),
                Ok(Err(e)) => {
                    error!(error = format!("{e:#}"), "app process error");
                    process_failed = true;
                }
                Err(e) => {
                    error!(error = %e, "app process panicked");
                    process_failed = true;
                }
            }
            if !token.is_cancelled() {
                token.cancel();
            }
        }

        // DRAINING: run closers under the timeout
        info!("draining");
        let drain_failed = match tokio::time::timeout(
            self.closer_timeout,
            run_closers(self.closers),
        )
        .await
        {
            Ok(failed) => failed,
            Err(_) => {
                error!(timeout = ?self.closer_timeout, "drain timed out");
                true
            }
        };

        // STOPPED
        if process_failed || drain_failed {
            error!("exiting after failed drain or process error");
            std::process::exit(1);
        }
        info!("drain complete, exiting");
        std::process::exit(0);
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let sigint_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received SIGINT, starting drain");
                sigint_token.cancel();
            }
            Err(e) => error!(error = %e, "failed to install SIGINT handler"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM, starting drain");
                token.cancel();
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    });
}

/// Runs closers sequentially in registration order; returns true when any
/// closer failed.
async fn run_closers(closers: Vec<Closer>) -> bool {
    let mut failed = false;
    for closer in closers {
        if let Err(e) = closer().await {
            error!(error = format!("{e:#}"), "closer error");
            failed = true;
        }
    }
    failed
}
