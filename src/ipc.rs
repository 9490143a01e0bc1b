//! Result transport between workers and the orchestrator.
//!
//! Each worker opens one connection to the run's Unix domain socket, writes
//! its [`ExecutionResult`] as UTF-8 JSON and closes the connection. The close
//! frames the message.

use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::error::RunError;
use crate::report::ExecutionResult;

/// The listening side, shared by every round of a run.
///
/// The socket file is removed when the endpoint is dropped.
#[derive(Debug)]
pub struct IpcEndpoint {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcEndpoint {
    /// Binds the socket.
    ///
    /// A socket file left by an earlier run is replaced only when nothing
    /// accepts connections on it. A live socket or any other file is an error.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self, RunError> {
        let path = path.into();
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(ipc_error(
                    &path,
                    std::io::Error::new(ErrorKind::AlreadyExists, "path exists and is not a socket"),
                ));
            }
            if std::os::unix::net::UnixStream::connect(&path).is_ok() {
                return Err(ipc_error(
                    &path,
                    std::io::Error::new(ErrorKind::AddrInUse, "socket is in use by another run"),
                ));
            }
            debug!("Removing stale socket {}", path.display());
            std::fs::remove_file(&path).map_err(|source| ipc_error(&path, source))?;
        }
        let listener = UnixListener::bind(&path).map_err(|source| ipc_error(&path, source))?;
        debug!("Listening for worker results on {}", path.display());
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepts the next connection, reads until the peer closes and decodes
    /// the payload.
    pub async fn accept_report(&self) -> Result<ExecutionResult, RunError> {
        let (mut stream, _) = self
            .listener
            .accept()
            .await
            .map_err(|source| ipc_error(&self.path, source))?;

        let mut payload = Vec::new();
        stream
            .read_to_end(&mut payload)
            .await
            .map_err(|source| ipc_error(&self.path, source))?;
        debug!("Received {} bytes of worker payload", payload.len());

        decode_report(&payload)
    }
}

impl Drop for IpcEndpoint {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Decodes one worker payload.
pub fn decode_report(payload: &[u8]) -> Result<ExecutionResult, RunError> {
    serde_json::from_slice(payload).map_err(RunError::IpcDecode)
}

/// Connects to the endpoint at `path`, writes `result` and closes the connection.
pub async fn send_report(path: &Path, result: &ExecutionResult) -> Result<(), RunError> {
    let payload = serde_json::to_vec(result).map_err(RunError::IpcEncode)?;
    let mut stream = UnixStream::connect(path)
        .await
        .map_err(|source| ipc_error(path, source))?;
    stream
        .write_all(&payload)
        .await
        .map_err(|source| ipc_error(path, source))?;
    stream
        .shutdown()
        .await
        .map_err(|source| ipc_error(path, source))?;
    Ok(())
}

fn ipc_error(path: &Path, source: std::io::Error) -> RunError {
    RunError::Ipc {
        path: path.to_path_buf(),
        source,
    }
}
