//! Batch orchestration.
//!
//! Hosts of each group run in consecutive rounds of at most `forks` workers.
//! After launching a round, the orchestrator accepts one IPC connection per
//! launched worker in arrival order, decodes the result and joins that
//! worker. A round is fully joined before the next one starts.
//!
//! ```no_run
//! use conquers::{ConfigResolver, CredentialVault, MasterKey, Orchestrator, SshConnector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let groups = ConfigResolver::load("~/.conquers/conquers.yaml")?;
//! let vault = CredentialVault::load("~/.conquers/credentials")?;
//! let key = MasterKey::from_source("~/.conquers/masterkey")?;
//!
//! let report = Orchestrator::new(SshConnector).run_batch(groups, &vault, &key).await?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info, warn};

use crate::config::GroupSpec;
use crate::credentials::{CredentialVault, MasterKey};
use crate::error::RunError;
use crate::ipc::IpcEndpoint;
use crate::report::{ExecutionResult, ResultAggregator};
use crate::session::Connector;
use crate::worker::{self, WorkerHandle};

static RUN_SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Options of a batch run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Unix domain socket receiving worker results.
    ///
    /// `None` gives every run its own socket in the temp directory.
    pub socket_path: Option<PathBuf>,
}

impl RunOptions {
    pub fn with_socket_path(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: Some(path.into()),
        }
    }

    /// The socket path for the next run.
    fn run_socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(|| {
            let sequence = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
            std::env::temp_dir().join(format!(
                "conquers-{}-{}.socket",
                std::process::id(),
                sequence
            ))
        })
    }
}

/// Workers of the current round that have not been joined yet.
///
/// Every remaining worker is aborted on drop, which also aborts its host task.
#[derive(Debug, Default)]
struct LiveWorkers {
    workers: Vec<WorkerHandle>,
}

impl LiveWorkers {
    fn push(&mut self, worker: WorkerHandle) {
        self.workers.push(worker);
    }

    fn len(&self) -> usize {
        self.workers.len()
    }

    fn take(&mut self, host: &str) -> Option<WorkerHandle> {
        let index = self.workers.iter().position(|w| w.host() == host)?;
        Some(self.workers.swap_remove(index))
    }
}

impl Drop for LiveWorkers {
    fn drop(&mut self) {
        for worker in &self.workers {
            debug!("aborting worker for {}", worker.host());
            worker.abort();
        }
    }
}

/// Runs batches of hosts against devices opened by `C`.
pub struct Orchestrator<C> {
    connector: Arc<C>,
    options: RunOptions,
}

impl<C: Connector> Orchestrator<C> {
    pub fn new(connector: C) -> Self {
        Self::with_options(connector, RunOptions::default())
    }

    pub fn with_options(connector: C, options: RunOptions) -> Self {
        Self {
            connector: Arc::new(connector),
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Runs every group and returns the aggregated results.
    ///
    /// Ctrl-C or SIGTERM cancels the run: live workers are aborted and
    /// [`RunError::Cancelled`] is returned without any report.
    pub async fn run_batch(
        &self,
        groups: Vec<GroupSpec>,
        vault: &CredentialVault,
        key: &MasterKey,
    ) -> Result<ResultAggregator, RunError> {
        self.run_batch_until(groups, vault, key, shutdown_signal())
            .await
    }

    /// Like [`run_batch`](Self::run_batch), cancelled when `shutdown` completes.
    ///
    /// Credentials are attached before anything is launched; a credentials
    /// error aborts the run. An undecodable worker payload aborts the run too.
    pub async fn run_batch_until<F>(
        &self,
        mut groups: Vec<GroupSpec>,
        vault: &CredentialVault,
        key: &MasterKey,
        shutdown: F,
    ) -> Result<ResultAggregator, RunError>
    where
        F: Future<Output = ()>,
    {
        vault.attach(&mut groups, key)?;

        let endpoint = IpcEndpoint::bind(self.options.run_socket_path())?;
        let mut aggregator = ResultAggregator::new();

        tokio::select! {
            result = self.execute(&groups, &endpoint, &mut aggregator) => result?,
            () = shutdown => {
                warn!("run cancelled, terminating live workers");
                return Err(RunError::Cancelled);
            }
        }

        let summary = aggregator.summary();
        info!(
            "run finished: {} ok, {} failed, {} skipped",
            summary.ok, summary.failed, summary.skipped
        );
        Ok(aggregator)
    }

    async fn execute(
        &self,
        groups: &[GroupSpec],
        endpoint: &IpcEndpoint,
        aggregator: &mut ResultAggregator,
    ) -> Result<(), RunError> {
        for group in groups {
            info!("[GROUP] {}, forks: {}", group.name, group.forks);
            let round_count = group.round_count();

            for (index, round) in group.rounds().enumerate() {
                debug!("{} round {}/{}", group.name, index + 1, round_count);
                let mut live = LiveWorkers::default();

                for host in round {
                    info!("   *    {}", host.host);
                    if host.credentials.is_absent() {
                        aggregator.add(ExecutionResult::skipped(&group.name, host.clone()));
                        continue;
                    }
                    live.push(worker::spawn_worker(
                        Arc::clone(&self.connector),
                        group.name.clone(),
                        host.clone(),
                        endpoint.path().to_path_buf(),
                    ));
                }

                for _ in 0..live.len() {
                    let result = endpoint.accept_report().await?;

                    match live.take(&result.host) {
                        Some(worker) => {
                            if let Err(err) = worker.join().await {
                                error!("worker for {} did not exit cleanly: {}", result.host, err);
                            }
                        }
                        None => warn!("result for unexpected host {}", result.host),
                    }

                    match result.write_host_log().await {
                        Ok(Some(path)) => debug!("{} output logged to {}", result.host, path.display()),
                        Ok(None) => {}
                        Err(err) => warn!("   !    cannot write log file for {}: {}", result.host, err),
                    }

                    aggregator.add(result);
                }
            }
        }
        Ok(())
    }
}

/// Completes on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("cannot listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
