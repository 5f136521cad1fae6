//! # Metasys Net
//!
//! IPv4 networking on top of the `metasys_core` handle framework.
//!
//! ## Crate Structure
//!
//! - **address**: `sockaddr_in` as a value type
//! - **addrinfo**: owned `getaddrinfo` result lists and TCP endpoint lookup
//! - **socket**: socket capability layers (options, bind, listen, connect,
//!   accept)
//! - **tcp**: TCP client and server sockets
//! - **config**: listener options loaded through serde
//!
//! ## Example
//!
//! ```no_run
//! use metasys_net::{InetAddress, ListenOptions, SocketFlags, TcpServerSocket, Accepting};
//! use metasys_core::Writable;
//!
//! let server = TcpServerSocket::listen_init(&InetAddress::any(8080), &ListenOptions::default())?;
//! let peer = server.accept(None, SocketFlags::CLOEXEC)?;
//! peer.write(b"hello\n")?;
//! # Ok::<(), metasys_core::SystemError>(())
//! ```

#![warn(missing_docs)]

pub mod address;
pub mod addrinfo;
pub mod config;
pub mod socket;
pub mod tcp;

pub use address::InetAddress;
pub use addrinfo::{AddrInfoEntry, AddrInfoIter, AddrInfoList, AddressInfo, Hints, TcpAddress};
pub use config::ListenOptions;
pub use socket::{Accepting, Bindable, Connecting, Listening, SocketFlags, SocketOptions};
pub use tcp::{Shutdown, TcpServerSocket, TcpSocket};
