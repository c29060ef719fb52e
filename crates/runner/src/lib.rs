//! Runs the tracker's long-lived processes (HTTP API, collection ticker) side by
//! side and shuts them down together.
//!
//! - Every process receives the same [`CancellationToken`]
//! - SIGINT/SIGTERM, or the first process error, cancels all of them
//! - Closers run afterwards under a timeout, whatever the outcome
//!
//! # Example
//!
//! ```no_run
//! use fleet_tracker_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_named_process("ticker", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(60)) => {
//!                         tracing::info!("tick");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move { Ok(()) })
//!         .run()
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub type BoxedProcessFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

/// A long-running process: takes the shared cancellation token, resolves when it stops.
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedProcessFuture + Send>;

/// A cleanup function executed after every process has stopped.
pub type Closer = Box<dyn FnOnce() -> BoxedProcessFuture + Send>;

struct NamedProcess {
    name: String,
    process: AppProcess,
}

pub struct Runner {
    processes: Vec<NamedProcess>,
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
    /// Creates a runner with no processes and a 10 second closer timeout.
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds a process; `name` shows up in every log line about it.
    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.processes.push(NamedProcess {
            name: name.into(),
            process: Box::new(|token| Box::pin(process(token))),
        });
        self
    }

    /// Adds a cleanup function. All closers run concurrently, even if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Uses an externally owned token, so callers can trigger shutdown themselves.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs every process until shutdown, then the closers, then exits the process.
    ///
    /// Exit code is 1 if any process failed before shutdown was requested, else 0.
    pub async fn run(self) {
        let closers = self.closers;
        let closer_timeout = self.closer_timeout;
        let first_error = Self::run_processes(self.processes, self.cancellation_token).await;

        if !closers.is_empty() {
            tracing::info!("running closers with timeout of {:?}", closer_timeout);
            match tokio::time::timeout(closer_timeout, Self::run_closers(closers)).await {
                Ok(()) => tracing::info!("all closers completed"),
                Err(_) => tracing::error!("closers timed out after {:?}", closer_timeout),
            }
        }

        if let Some(err) = first_error {
            tracing::error!("application exiting with error: {:#}", err);
            std::process::exit(1);
        }
        tracing::info!("application exiting normally");
        std::process::exit(0);
    }

    /// Spawns the processes and waits for them to stop. Returns the first error
    /// raised before cancellation, if any.
    async fn run_processes(
        processes: Vec<NamedProcess>,
        token: CancellationToken,
    ) -> Option<anyhow::Error> {
        let mut join_set = JoinSet::new();
        for NamedProcess { name, process } in processes {
            let process_token = token.clone();
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        spawn_signal_handlers(token.clone());

        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((name, Ok(()))) => {
                    tracing::debug!(process = %name, "process completed");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        tracing::error!(process = %name, "process error: {:#}", err);
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(err) => {
                    tracing::error!("process panicked: {}", err);
                    token.cancel();
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        join_set.shutdown().await;
        first_error
    }

    async fn run_closers(closers: Vec<Closer>) {
        let mut closer_set = JoinSet::new();
        for closer in closers {
            closer_set.spawn(closer());
        }

        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => tracing::debug!("closer completed"),
                Ok(Err(err)) => tracing::error!("closer error: {:#}", err),
                Err(err) => tracing::error!("closer panicked: {}", err),
            }
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => tracing::error!("error setting up signal handler: {}", err),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("received SIGTERM signal");
                token.cancel();
            }
            Err(err) => tracing::error!("error setting up SIGTERM handler: {}", err),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_processes_stop_on_cancellation() {
        let token = CancellationToken::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_clone = stopped.clone();

        let runner = Runner::new().with_named_process("waiter", move |ctx| async move {
            ctx.cancelled().await;
            stopped_clone.store(true, Ordering::SeqCst);
            Ok(())
        });

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let first_error = Runner::run_processes(runner.processes, token).await;
        assert!(first_error.is_none());
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_process_error_cancels_siblings() {
        let token = CancellationToken::new();

        let runner = Runner::new()
            .with_named_process("failing", |_ctx| async move {
                Err(anyhow::anyhow!("boom"))
            })
            .with_named_process("sibling", |ctx| async move {
                ctx.cancelled().await;
                Ok(())
            });

        let first_error = Runner::run_processes(runner.processes, token.clone()).await;
        assert_eq!(first_error.unwrap().to_string(), "boom");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_closer_execution() {
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let runner = Runner::new().with_closer(move || async move {
            called_clone.store(true, Ordering::SeqCst);
            Ok(())
        });

        Runner::run_closers(runner.closers).await;
        assert!(called.load(Ordering::SeqCst));
    }
}
