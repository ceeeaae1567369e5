use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Directory that holds the background process's IPC socket by default.
pub const IPC_DIR: &str = "/tmp/rerouter";

/// Transport layer for the bridge socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "address")]
pub enum Transport {
    /// Unix domain socket at the given filesystem path.
    Ipc(PathBuf),

    /// TCP, used by tests and when client and background run on different hosts.
    Tcp { host: String, port: u16 },
}

impl Transport {
    /// IPC transport for a named socket under [`IPC_DIR`].
    pub fn ipc(name: &str) -> Self {
        Self::Ipc(Path::new(IPC_DIR).join(format!("{name}.sock")))
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// The ZeroMQ endpoint address string.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Ipc(path) => format!("ipc://{}", path.display()),
            Self::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }

    /// For IPC transports, create the socket's parent directory.
    pub fn ensure_ipc_dir(&self) -> std::io::Result<()> {
        if let Self::Ipc(path) = self {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Remove an IPC socket file left behind by a previous run.
    ///
    /// A leftover `.sock` file makes the next bind fail with `EADDRINUSE`.
    pub fn remove_stale_socket(&self) -> std::io::Result<()> {
        if let Self::Ipc(path) = self {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed stale IPC socket");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl FromStr for Transport {
    type Err = BridgeError;

    /// Parse `ipc://<path>` or `tcp://<host>:<port>`.
    fn from_str(endpoint: &str) -> Result<Self, Self::Err> {
        if let Some(path) = endpoint.strip_prefix("ipc://") {
            if path.is_empty() {
                return Err(BridgeError::Transport(format!("empty IPC path in {endpoint}")));
            }
            return Ok(Self::Ipc(PathBuf::from(path)));
        }
        if let Some(addr) = endpoint.strip_prefix("tcp://") {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| BridgeError::Transport(format!("missing port in {endpoint}")))?;
            let port = port
                .parse()
                .map_err(|_| BridgeError::Transport(format!("invalid port in {endpoint}")))?;
            return Ok(Self::tcp(host, port));
        }
        Err(BridgeError::Transport(format!(
            "unsupported endpoint {endpoint} (expected ipc:// or tcp://)"
        )))
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}
