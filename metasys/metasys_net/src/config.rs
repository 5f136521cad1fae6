//! Listener configuration.

use crate::socket::SocketFlags;
use metasys_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Options applied by [`crate::TcpServerSocket::listen_init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenOptions {
    /// Length of the pending connection queue
    #[serde(default = "default_backlog")]
    pub backlog: i32,

    /// Set `SO_REUSEPORT` before binding
    #[serde(default = "default_reuse_port")]
    pub reuse_port: bool,

    /// Set `SO_REUSEADDR` before binding
    #[serde(default)]
    pub reuse_addr: bool,

    /// Create the socket non-blocking
    #[serde(default)]
    pub nonblocking: bool,

    /// Create the socket close-on-exec
    #[serde(default = "default_cloexec")]
    pub cloexec: bool,
}

fn default_backlog() -> i32 {
    32
}

fn default_reuse_port() -> bool {
    true
}

fn default_cloexec() -> bool {
    true
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            backlog: default_backlog(),
            reuse_port: default_reuse_port(),
            reuse_addr: false,
            nonblocking: false,
            cloexec: default_cloexec(),
        }
    }
}

impl ListenOptions {
    /// Check the options for values the kernel would silently adjust.
    pub fn validate(&self) -> Result<()> {
        if self.backlog <= 0 {
            return Err(Error::Config(format!(
                "backlog must be positive, got {}",
                self.backlog
            )));
        }
        Ok(())
    }

    /// The socket creation flags these options select.
    pub fn flags(&self) -> SocketFlags {
        let mut flags = SocketFlags::empty();
        flags.set(SocketFlags::NONBLOCK, self.nonblocking);
        flags.set(SocketFlags::CLOEXEC, self.cloexec);
        flags
    }

    /// The same options with another backlog.
    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }
}
