//! SSH-backed device sessions.
//!
//! The session opens an interactive PTY shell, forwards I/O through a pair of
//! channels driven by a background task, and recognizes the end of each
//! command's output by the device prompt.

use std::time::Duration;

use async_ssh2_tokio::Config;
use async_ssh2_tokio::client::{AuthMethod, Client};
use log::{debug, trace};
use russh::ChannelMsg;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::Instant;

use super::{ConnectTarget, Connector, DeviceSession};
use crate::device::{DeviceProfile, clean_line};
use crate::error::ConnectorError;

/// Silence after which a timing read considers the device done talking.
const TIMING_QUIET_PERIOD: Duration = Duration::from_secs(2);

const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

const CHANNEL_CAPACITY: usize = 256;

/// Opens [`SshSession`]s with password authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, target: &ConnectTarget) -> Result<SshSession, ConnectorError> {
        SshSession::connect(target).await
    }
}

/// An interactive shell on one device.
pub struct SshSession {
    client: Client,
    sender: Sender<String>,
    recv: Receiver<String>,
    profile: DeviceProfile,
    /// Last prompt seen, without trailing whitespace.
    prompt: String,
    read_timeout: Duration,
    device_addr: String,
}

impl SshSession {
    /// Connects, opens the shell, waits for the first prompt and turns off paging.
    ///
    /// The connection timeout covers both the SSH handshake and the first prompt.
    pub async fn connect(target: &ConnectTarget) -> Result<Self, ConnectorError> {
        let profile = DeviceProfile::for_device_type(&target.device_type)?;
        let device_addr = target.device_addr();

        let config = Config {
            preferred: target.security.preferred(),
            inactivity_timeout: Some(INACTIVITY_TIMEOUT),
            ..Default::default()
        };

        let client = tokio::time::timeout(
            target.connection_timeout,
            Client::connect_with_config(
                (target.host.clone(), target.port),
                &target.user,
                AuthMethod::with_password(target.password.expose()),
                target.security.server_check.clone(),
                config,
            ),
        )
        .await
        .map_err(|_| ConnectorError::ConnectTimeout(device_addr.clone()))??;
        debug!("{} TCP connection successful", device_addr);

        let mut channel = client.get_channel().await?;
        channel
            .request_pty(false, "xterm", 800, 600, 0, 0, &[])
            .await?;
        channel.request_shell(false).await?;
        debug!("{} Shell request successful", device_addr);

        let (sender_to_shell, mut receiver_from_user) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (sender_to_user, receiver_from_shell) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        let io_task_device_addr = device_addr.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(data) = receiver_from_user.recv() => {
                        if let Err(e) = channel.data(data.as_bytes()).await {
                            debug!("{} Failed to send data to shell: {:?}", io_task_device_addr, e);
                            break;
                        }
                    },
                    Some(msg) = channel.wait() => {
                        match msg {
                            ChannelMsg::Data { ref data } => {
                                let chunk = String::from_utf8_lossy(data).into_owned();
                                if sender_to_user.send(chunk).await.is_err() {
                                    debug!("{} Shell output receiver dropped", io_task_device_addr);
                                    break;
                                }
                            }
                            ChannelMsg::ExitStatus { exit_status } => {
                                debug!("{} Shell exited with status code: {}", io_task_device_addr, exit_status);
                                let _ = channel.eof().await;
                                break;
                            }
                            ChannelMsg::Eof => {
                                debug!("{} Shell sent EOF", io_task_device_addr);
                                break;
                            }
                            _ => {}
                        }
                    }
                    else => break,
                }
            }
            debug!("{} SSH I/O task ended", io_task_device_addr);
        });

        let timeout_addr = device_addr.clone();
        let mut session = Self {
            client,
            sender: sender_to_shell,
            recv: receiver_from_shell,
            profile,
            prompt: String::new(),
            read_timeout: target.read_timeout,
            device_addr,
        };

        session
            .read_until_prompt(target.connection_timeout)
            .await
            .map_err(|err| match err {
                ConnectorError::ReadTimeout(_) => ConnectorError::ConnectTimeout(timeout_addr),
                other => other,
            })?;
        debug!("{} initial prompt: {}", session.device_addr, session.prompt);

        if let Some(command) = session.profile.disable_paging() {
            session.exchange(command).await?;
        }

        Ok(session)
    }

    /// Checks if the underlying SSH connection is still active.
    pub fn is_connected(&self) -> bool {
        !self.client.is_closed()
    }

    /// The last prompt seen.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Sends one command and returns its output without echo and prompt.
    async fn exchange(&mut self, command: &str) -> Result<String, ConnectorError> {
        while self.recv.try_recv().is_ok() {}
        self.sender.send(format!("{command}\n")).await?;
        let output = self.read_until_prompt(self.read_timeout).await?;
        Ok(strip_echo(&output, command))
    }

    /// Reads cleaned lines until the unterminated tail of the stream is a prompt.
    ///
    /// Pagination markers are answered with a space. The prompt itself is not
    /// part of the returned output.
    async fn read_until_prompt(&mut self, timeout: Duration) -> Result<String, ConnectorError> {
        let profile = &self.profile;
        let recv = &mut self.recv;
        let sender = &self.sender;

        let mut output = String::new();
        let mut line_buffer = String::new();

        let result = tokio::time::timeout(timeout, async {
            loop {
                let Some(data) = recv.recv().await else {
                    return Err(ConnectorError::ChannelClosed);
                };
                trace!("{:?}", data);
                line_buffer.push_str(&data);

                while let Some(newline_pos) = line_buffer.find('\n') {
                    let line = line_buffer.drain(..=newline_pos).collect::<String>();
                    output.push_str(&clean_line(&line));
                }

                if line_buffer.is_empty() {
                    continue;
                }
                let pending = clean_line(&line_buffer);
                if profile.is_prompt(&pending) {
                    return Ok(pending);
                }
                if profile.is_more(&pending) {
                    line_buffer.clear();
                    if let Err(err) = sender.send(" ".to_string()).await {
                        return Err(ConnectorError::from(err));
                    }
                }
            }
        })
        .await;

        match result {
            Ok(Ok(prompt)) => {
                self.prompt = prompt.trim_end().to_string();
                Ok(output)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ConnectorError::ReadTimeout(format!(
                "{output}{}",
                clean_line(&line_buffer)
            ))),
        }
    }
}

impl DeviceSession for SshSession {
    async fn send_commands(&mut self, commands: &[String]) -> Result<String, ConnectorError> {
        let mut outputs = Vec::with_capacity(commands.len());
        for command in commands {
            debug!("{} sending: {}", self.device_addr, command);
            outputs.push(self.exchange(command).await?);
        }
        Ok(outputs.join("\n"))
    }

    async fn send_timing(&mut self, line: &str) -> Result<String, ConnectorError> {
        while self.recv.try_recv().is_ok() {}
        debug!("{} sending (timing): {}", self.device_addr, line);
        self.sender.send(format!("{line}\n")).await?;

        let deadline = Instant::now() + self.read_timeout;
        let mut raw = String::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                if raw.is_empty() {
                    return Err(ConnectorError::ReadTimeout(String::new()));
                }
                break;
            }
            match tokio::time::timeout(TIMING_QUIET_PERIOD.min(remaining), self.recv.recv()).await
            {
                Ok(Some(data)) => {
                    trace!("{:?}", data);
                    raw.push_str(&data);
                }
                Ok(None) => return Err(ConnectorError::ChannelClosed),
                Err(_) if raw.is_empty() => continue,
                Err(_) => break,
            }
        }

        let output = raw.split_inclusive('\n').map(clean_line).collect::<String>();
        if let Some(last) = output.rsplit('\n').next()
            && self.profile.is_prompt(last)
        {
            self.prompt = last.trim_end().to_string();
        }
        Ok(strip_echo(&output, line))
    }

    async fn enter_config_mode(&mut self, command: Option<&str>) -> Result<String, ConnectorError> {
        let command = command.unwrap_or(self.profile.config_command());
        let output = self.exchange(command).await?;
        if !self.profile.is_config_prompt(&self.prompt) {
            return Err(ConnectorError::UnexpectedPrompt(self.prompt.clone()));
        }
        Ok(output)
    }

    async fn exit_config_mode(&mut self, command: Option<&str>) -> Result<String, ConnectorError> {
        let command = command.unwrap_or(self.profile.exit_config_command());
        let output = self.exchange(command).await?;
        if self.profile.is_config_prompt(&self.prompt) {
            return Err(ConnectorError::UnexpectedPrompt(self.prompt.clone()));
        }
        Ok(output)
    }

    async fn close(&mut self) {
        debug!("{} closing SSH session", self.device_addr);
        self.recv.close();

        if self.is_connected() {
            if let Err(e) = self.sender.send("exit\n".to_string()).await {
                debug!("{} Failed to send exit command: {:?}", self.device_addr, e);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        // async-ssh2-tokio closes the connection when the client is dropped.
    }
}

/// Removes the echoed command and surrounding blank lines.
fn strip_echo(output: &str, command: &str) -> String {
    let content = match output.strip_prefix(command) {
        Some(rest) if !command.is_empty() => rest.trim_start_matches('\n'),
        _ => output,
    };
    content.trim_end_matches('\n').to_string()
}
