//! Device sessions.
//!
//! A worker drives one device through the [`DeviceSession`] trait and opens it
//! through a [`Connector`]. The production connector is [`SshConnector`], which
//! talks to an interactive shell over SSH; tests plug in scripted fakes.
//!
//! # Main Components
//!
//! - [`Connector`] - Opens a session for a [`ConnectTarget`]
//! - [`DeviceSession`] - Prompt-aware command exchange with one device
//! - [`ConnectionSecurityOptions`] - SSH algorithm policy and host key checking

use std::future::Future;
use std::time::Duration;

use crate::config::{DeviceSettings, HostConfig};
use crate::credentials::{Credentials, Secret};
use crate::error::ConnectorError;

mod security;
pub mod ssh;

pub use security::{ConnectionSecurityOptions, SecurityLevel};
pub use ssh::{SshConnector, SshSession};

/// Fallbacks when a configured timeout is negative or not finite.
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to open a session with one device.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    /// Address used for the connection.
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub device_type: String,
    pub connection_timeout: Duration,
    pub read_timeout: Duration,
    pub security: ConnectionSecurityOptions,
}

impl ConnectTarget {
    /// Builds the target from a host's resolved credentials and typed settings.
    ///
    /// Fails with [`ConnectorError::MissingCredentials`] when the host has no
    /// attached credentials.
    pub fn from_host(host: &HostConfig, settings: &DeviceSettings) -> Result<Self, ConnectorError> {
        let Credentials::Present(credentials) = &host.credentials else {
            return Err(ConnectorError::MissingCredentials);
        };

        Ok(Self {
            host: credentials.host.clone(),
            port: settings.port,
            user: credentials.user.clone(),
            password: credentials.pass.clone(),
            device_type: settings.device_type.clone(),
            connection_timeout: Duration::try_from_secs_f64(settings.connection_timeout)
                .unwrap_or(DEFAULT_CONNECTION_TIMEOUT),
            read_timeout: Duration::try_from_secs_f64(settings.read_timeout)
                .unwrap_or(DEFAULT_READ_TIMEOUT),
            security: ConnectionSecurityOptions::for_level(settings.security_level),
        })
    }

    /// `user@host:port`, used in log lines.
    pub fn device_addr(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Prompt-aware command exchange with one connected device.
///
/// Every method that sends a command returns the cleaned device output.
/// Timeouts surface as [`ConnectorError::ReadTimeout`] carrying the partial
/// output read so far.
pub trait DeviceSession: Send {
    /// Sends each command and waits for the device prompt after each one.
    ///
    /// Outputs are joined with `\n`.
    fn send_commands(
        &mut self,
        commands: &[String],
    ) -> impl Future<Output = Result<String, ConnectorError>> + Send;

    /// Sends one line and reads until the output goes quiet.
    ///
    /// Used for interactive exchanges where the device answers with a question
    /// instead of a prompt.
    fn send_timing(
        &mut self,
        line: &str,
    ) -> impl Future<Output = Result<String, ConnectorError>> + Send;

    /// Enters configuration mode, with `command` overriding the device default.
    fn enter_config_mode(
        &mut self,
        command: Option<&str>,
    ) -> impl Future<Output = Result<String, ConnectorError>> + Send;

    /// Leaves configuration mode, with `command` overriding the device default.
    fn exit_config_mode(
        &mut self,
        command: Option<&str>,
    ) -> impl Future<Output = Result<String, ConnectorError>> + Send;

    /// Closes the session. Errors are logged, never returned.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens device sessions.
pub trait Connector: Send + Sync + 'static {
    type Session: DeviceSession + 'static;

    fn connect(
        &self,
        target: &ConnectTarget,
    ) -> impl Future<Output = Result<Self::Session, ConnectorError>> + Send;
}
