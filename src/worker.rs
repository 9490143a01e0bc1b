//! Per-host execution.
//!
//! A worker connects to one device, runs the three command phases strictly in
//! order and stops at the first error. Output of completed segments is kept
//! when a later segment fails.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error};
use tokio::task::{JoinError, JoinHandle};

use crate::commands::{CommandSet, Phase, PhaseCommands, Segment};
use crate::config::{DeviceSettings, HostConfig};
use crate::error::{ConfigTransition, ConnectorError};
use crate::ipc;
use crate::report::{ExecutionResult, PhaseOutput};
use crate::session::{ConnectTarget, Connector, DeviceSession};

/// Runs every phase for `host` and builds its result.
///
/// Never fails: any error becomes a `failed` result with a single error entry.
pub async fn run_host<C: Connector>(connector: &C, group: &str, host: HostConfig) -> ExecutionResult {
    let mut output = PhaseOutput::default();
    match drive(connector, &host, &mut output).await {
        Ok(()) => ExecutionResult::ok(group, host, output),
        Err(err) => {
            debug!("{} failed: {}", host.host, err);
            ExecutionResult::failed(group, host, output, err)
        }
    }
}

async fn drive<C: Connector>(
    connector: &C,
    host: &HostConfig,
    output: &mut PhaseOutput,
) -> Result<(), ConnectorError> {
    let settings = host.device_settings()?;
    let commands = PhaseCommands::collect(&settings).await?;
    let target = ConnectTarget::from_host(host, &settings)?;

    let mut session = connector.connect(&target).await?;
    debug!("{} connected", target.device_addr());

    let result = run_phases(&mut session, &settings, &commands, output).await;
    session.close().await;
    result
}

async fn run_phases<S: DeviceSession>(
    session: &mut S,
    settings: &DeviceSettings,
    commands: &PhaseCommands,
    output: &mut PhaseOutput,
) -> Result<(), ConnectorError> {
    run_phase(session, commands.get(Phase::Before), output.phase_mut(Phase::Before)).await?;

    let config = commands.get(Phase::Config);
    if !config.is_empty() {
        session
            .enter_config_mode(settings.config_mode.as_deref())
            .await
            .map_err(|source| config_mode_error(ConfigTransition::Enter, source))?;
        run_phase(session, config, output.phase_mut(Phase::Config)).await?;
        session
            .exit_config_mode(settings.exit_config_mode.as_deref())
            .await
            .map_err(|source| config_mode_error(ConfigTransition::Exit, source))?;
    }

    run_phase(session, commands.get(Phase::After), output.phase_mut(Phase::After)).await
}

fn config_mode_error(transition: ConfigTransition, source: ConnectorError) -> ConnectorError {
    ConnectorError::ConfigMode {
        transition,
        source: Box::new(source),
    }
}

/// Sends every segment of one phase, appending output lines after each segment.
///
/// Ordinary batches go out through [`DeviceSession::send_commands`]. An
/// interactive command is sent with a timing read; each answer is sent only
/// when its expected text occurs in the most recent output, and that answer's
/// output becomes the most recent one.
async fn run_phase<S: DeviceSession>(
    session: &mut S,
    commands: &CommandSet,
    lines: &mut Vec<String>,
) -> Result<(), ConnectorError> {
    for segment in commands.segments() {
        let text = match segment {
            Segment::Ordinary(batch) => session.send_commands(batch).await?,
            Segment::Interactive {
                command, exchanges, ..
            } => {
                let mut latest = session.send_timing(command).await?;
                let mut text = latest.clone();
                for exchange in exchanges {
                    if latest.contains(&exchange.expect) {
                        latest = session.send_timing(&exchange.answer).await?;
                        text.push_str(&latest);
                    } else {
                        debug!("expected {:?} not seen, answer skipped", exchange.expect);
                    }
                }
                text
            }
        };
        lines.extend(text.lines().map(str::to_string));
    }
    Ok(())
}

/// A launched worker: a supervising task that owns the host task.
///
/// Aborting the supervisor also aborts the host task.
#[derive(Debug)]
pub struct WorkerHandle {
    host: String,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Waits for the supervisor to finish after it delivered its result.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Launches the worker for `host` and delivers its result to `socket_path`.
///
/// The host runs in its own task. A panic there is caught by the supervisor
/// and reported as a `failed` result for that host only.
pub fn spawn_worker<C: Connector>(
    connector: Arc<C>,
    group: String,
    host: HostConfig,
    socket_path: PathBuf,
) -> WorkerHandle {
    let name = host.host.clone();
    let fallback = host.clone();

    let handle = tokio::spawn(async move {
        let task_group = group.clone();
        let mut task = AbortOnDrop(tokio::spawn(async move {
            run_host(connector.as_ref(), &task_group, host).await
        }));

        let result = match (&mut task.0).await {
            Ok(result) => result,
            Err(err) => {
                let reason = abort_reason(err);
                error!("worker for {} aborted: {}", fallback.host, reason);
                ExecutionResult::failed(
                    group,
                    fallback,
                    PhaseOutput::default(),
                    ConnectorError::WorkerAborted(reason),
                )
            }
        };

        if let Err(err) = ipc::send_report(&socket_path, &result).await {
            error!("cannot deliver result of {}: {}", result.host, err);
        }
    });

    WorkerHandle { host: name, handle }
}

fn abort_reason(err: JoinError) -> String {
    if err.is_cancelled() {
        return "task cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
