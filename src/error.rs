//! Error types for configuration, credentials, device sessions and batch runs.
//!
//! Each kind maps to one propagation rule: configuration and credential errors
//! are fatal before any execution starts, connector errors stay scoped to one
//! host, and IPC decode errors abort the whole run.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc::error::SendError;

/// Errors raised while loading or resolving the configuration document.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist or cannot be read.
    #[error("cannot read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Only YAML documents are accepted.
    #[error("unsupported configuration file extension for {0}, expected .yaml or .yml")]
    UnsupportedExtension(PathBuf),

    /// The document is not valid YAML.
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The document root or the `defaults` block is not a mapping.
    #[error("configuration must be a mapping with a `defaults` block")]
    MissingDefaults,

    /// A group block is not a mapping.
    #[error("group {0} must be a mapping")]
    InvalidGroup(String),

    /// A group block has no `hosts` list.
    #[error("group {0} has no hosts list")]
    MissingHosts(String),

    /// A `hosts` entry is neither a hostname nor a single-key mapping.
    #[error("group {group} has an invalid host entry: {entry}")]
    InvalidHostEntry { group: String, entry: String },

    /// `forks` is missing or not a positive integer.
    #[error("group {0} has no positive forks value")]
    InvalidForks(String),

    /// A required device setting is absent after the cascade.
    #[error("host {host} in group {group} is missing required key {key}")]
    MissingKey {
        group: String,
        host: String,
        key: &'static str,
    },
}

/// Errors raised by authenticated encryption of stored passwords.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The stored value is not valid base64.
    #[error("encrypted password is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The decoded value is shorter than nonce plus tag.
    #[error("encrypted password is truncated ({0} bytes)")]
    Truncated(usize),

    /// The authentication tag did not verify: wrong master key or corrupted record.
    #[error("MAC check failed, the master key is probably not correct")]
    Verification,

    /// The decrypted bytes are not UTF-8.
    #[error("decrypted password is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Errors raised by the credential vault.
#[derive(Error, Debug)]
pub enum CredentialsError {
    /// Master keys are limited to the AES-256 key size.
    #[error("master key can only be 32 bytes long, got {0}")]
    KeyTooLong(usize),

    /// The credentials file cannot be read or written.
    #[error("credentials file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line does not follow `user@hostPattern:encrypted_pass`.
    #[error("malformed credentials entry on line {0}")]
    MalformedLine(usize),

    /// A wildcard host pattern is not a valid regular expression.
    #[error("invalid host pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Decryption of a matched record failed.
    #[error("cannot decrypt credentials for {host}: {source}")]
    Crypto {
        host: String,
        #[source]
        source: CryptoError,
    },

    /// Encryption of a new record failed.
    #[error("cannot encrypt password: {0}")]
    Encrypt(CryptoError),
}

/// Which side of a configuration-mode bracket failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTransition {
    Enter,
    Exit,
}

impl std::fmt::Display for ConfigTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTransition::Enter => {
                f.write_str("enter configuration mode, try setting config_mode")
            }
            ConfigTransition::Exit => {
                f.write_str("exit configuration mode, try setting exit_config_mode")
            }
        }
    }
}

/// Errors raised by a device session during one host's run.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// No credentials were attached to the host.
    #[error("credentials error, probably no entry for host")]
    MissingCredentials,

    /// Typed settings could not be built from the effective settings map.
    #[error("invalid host settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    /// No device profile exists for the configured device type.
    #[error("unsupported device type {0}")]
    UnsupportedDevice(String),

    /// A built-in device profile failed to compile.
    #[error("invalid device profile: {0}")]
    InvalidDeviceProfile(String),

    /// A command file referenced by the settings cannot be read.
    #[error("cannot read command file {path}: {source}")]
    CommandFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connecting did not finish within the connection timeout.
    #[error("connection to {0} timed out")]
    ConnectTimeout(String),

    /// Reading device output did not finish within the read timeout.
    #[error("read timeout, partial output: {0}")]
    ReadTimeout(String),

    /// The shell channel was closed by the device.
    #[error("channel closed by device")]
    ChannelClosed,

    /// Entering or leaving configuration mode failed.
    #[error("failed to {transition}: {source}")]
    ConfigMode {
        transition: ConfigTransition,
        #[source]
        source: Box<ConnectorError>,
    },

    /// The device did not reach the expected prompt.
    #[error("unexpected prompt: {0}")]
    UnexpectedPrompt(String),

    /// A worker task ended without producing a result.
    #[error("worker aborted: {0}")]
    WorkerAborted(String),

    /// An error occurred in the async-ssh2-tokio library.
    #[error("async ssh2 error: {0}")]
    Ssh2Error(#[from] async_ssh2_tokio::Error),

    /// An error occurred in the russh library.
    #[error("russh error: {0}")]
    RusshError(#[from] russh::Error),

    /// Failed to send data through the shell channel.
    #[error("failed to send data: {0}")]
    SendDataError(#[from] SendError<String>),
}

/// Errors that abort a whole batch run.
#[derive(Error, Debug)]
pub enum RunError {
    /// Credentials could not be attached to the hosts.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// The IPC endpoint failed.
    #[error("ipc endpoint {path}: {source}")]
    Ipc {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A worker result could not be encoded.
    #[error("cannot encode worker payload: {0}")]
    IpcEncode(#[source] serde_json::Error),

    /// A worker payload could not be decoded.
    #[error("cannot decode worker payload: {0}")]
    IpcDecode(#[source] serde_json::Error),

    /// The run was interrupted; no report is produced.
    #[error("run cancelled")]
    Cancelled,
}
