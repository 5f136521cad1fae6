//! TCP client and server sockets.

use crate::address::InetAddress;
use crate::config::ListenOptions;
use crate::socket::{
    open_stream, Accepting, Bindable, Connecting, Listening, SocketFlags, SocketOptions, SOCKET,
};
use metasys_core::descriptor::FdHandle;
use metasys_core::outcome::Outcome;
use metasys_core::{contract, owned_descriptor, Closable, Readable, SysResult, Writable};
use std::mem;
use std::os::fd::RawFd;

contract!(SHUTDOWN: "shutdown" => EBADF, EINVAL, ENOTSOCK);
contract!(PEERNAME: "getpeername" => EBADF, EFAULT, EINVAL, ENOTSOCK);

/// Which direction [`TcpSocket::shutdown`] closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// No more receptions
    Read,
    /// No more transmissions
    Write,
    /// Both directions
    Both,
}

impl Shutdown {
    fn as_raw(self) -> libc::c_int {
        match self {
            Self::Read => libc::SHUT_RD,
            Self::Write => libc::SHUT_WR,
            Self::Both => libc::SHUT_RDWR,
        }
    }
}

macro_rules! socket_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Default)]
        pub struct $name {
            handle: FdHandle,
        }

        owned_descriptor!($name, handle);
        impl Closable for $name {}
        impl SocketOptions for $name {}
        impl Bindable for $name {}

        impl From<FdHandle> for $name {
            fn from(handle: FdHandle) -> Self {
                Self { handle }
            }
        }

        impl $name {
            /// A socket holding no descriptor.
            pub fn new() -> Self {
                Self::default()
            }

            /// Whether a descriptor is held.
            pub fn valid(&self) -> bool {
                self.handle.valid()
            }

            /// Raw `socket(2)` for IPv4 TCP.
            ///
            /// # Panics
            ///
            /// Panics if a descriptor is already held.
            pub fn open_with<F, R>(&mut self, flags: SocketFlags, handler: F) -> R
            where
                F: FnOnce(Outcome<RawFd>) -> R,
            {
                open_stream(&mut self.handle, flags, handler)
            }

            /// Create the socket.
            pub fn open(&mut self, flags: SocketFlags) -> SysResult<()> {
                self.open_with(flags, |outcome| {
                    outcome.check(|fd| fd < 0, &SOCKET).map(|_| ())
                })
            }

            /// A newly created socket.
            pub fn open_init(flags: SocketFlags) -> SysResult<Self> {
                let mut socket = Self::new();
                socket.open(flags)?;
                Ok(socket)
            }

            /// A socket after one raw creation; invalid if it failed.
            pub fn open_init_with<F>(flags: SocketFlags, handler: F) -> Self
            where
                F: FnOnce(Outcome<RawFd>),
            {
                let mut socket = Self::new();
                socket.open_with(flags, handler);
                socket
            }
        }
    };
}

socket_type!(
    /// A connected (or connectable) TCP stream.
    TcpSocket
);

socket_type!(
    /// A TCP socket that listens for and accepts connections.
    TcpServerSocket
);

impl Readable for TcpSocket {}
impl Writable for TcpSocket {}
impl Connecting for TcpSocket {}

impl TcpSocket {
    /// A socket connected to `address`.
    pub fn connect_init(address: &InetAddress, flags: SocketFlags) -> SysResult<Self> {
        let socket = Self::open_init(flags)?;
        socket.connect(address)?;
        Ok(socket)
    }

    /// A socket after creation and one raw connect. The handler sees the
    /// outcome of whichever step ended the sequence; on failure the socket
    /// is closed and returned invalid.
    pub fn connect_init_with<F>(address: &InetAddress, flags: SocketFlags, handler: F) -> Self
    where
        F: FnOnce(Outcome<libc::c_int>),
    {
        let mut socket = Self::new();
        let opened = socket.open_with(flags, |outcome| outcome);
        if opened.value() < 0 {
            handler(opened);
            return socket;
        }
        let connected = socket.connect_with(address, |outcome| outcome);
        if connected.value() == -1 {
            socket.handle.release();
        }
        handler(connected);
        socket
    }

    /// Raw `shutdown(2)`.
    pub fn shutdown_with<F, R>(&self, how: Shutdown, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        SHUTDOWN.require(self.valid(), "socket is not open");
        let fd = self.handle.raw();
        handler(Outcome::invoke(|| unsafe { libc::shutdown(fd, how.as_raw()) }))
    }

    /// Close one or both directions of the connection.
    pub fn shutdown(&self, how: Shutdown) -> SysResult<()> {
        self.shutdown_with(how, |outcome| outcome.check_status(&SHUTDOWN))
    }

    /// The address of the connected peer.
    pub fn peer_address(&self) -> SysResult<InetAddress> {
        PEERNAME.require(self.valid(), "socket is not open");
        let fd = self.handle.raw();
        let mut address = InetAddress::any(0);
        let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        Outcome::invoke(|| unsafe { libc::getpeername(fd, address.as_mut_sockaddr(), &mut len) })
            .check_status(&PEERNAME)?;
        Ok(address)
    }
}

impl Listening for TcpServerSocket {}

impl Accepting for TcpServerSocket {
    type Peer = TcpSocket;
}

impl TcpServerSocket {
    /// Default queue length for [`Listening::listen`].
    pub const DEFAULT_BACKLOG: i32 = 32;

    /// A socket listening on `address`.
    pub fn listen_init(address: &InetAddress, options: &ListenOptions) -> SysResult<Self> {
        let socket = Self::open_init(options.flags())?;
        if options.reuse_addr {
            socket.set_reuse_addr(true)?;
        }
        if options.reuse_port {
            socket.set_reuse_port(true)?;
        }
        socket.bind(address)?;
        socket.listen(options.backlog)?;
        log::debug!("listening on {} with backlog {}", address, options.backlog);
        Ok(socket)
    }

    /// A socket after open, option setup, bind and listen in raw form. The
    /// handler sees the outcome of the step that ended the sequence; on
    /// failure the socket is closed and returned invalid.
    pub fn listen_init_with<F>(address: &InetAddress, options: &ListenOptions, handler: F) -> Self
    where
        F: FnOnce(Outcome<libc::c_int>),
    {
        let mut socket = Self::new();
        let outcome = socket.open_with(options.flags(), |outcome| outcome);
        if outcome.value() < 0 {
            handler(outcome);
            return socket;
        }

        let on: libc::c_int = 1;
        let steps = [
            (options.reuse_addr, libc::SO_REUSEADDR),
            (options.reuse_port, libc::SO_REUSEPORT),
        ];
        let mut outcome = Outcome::new(0, 0);
        for (enabled, name) in steps {
            if enabled && outcome.value() == 0 {
                // SAFETY: the reuse options take a plain c_int.
                outcome = unsafe {
                    socket.setsockopt_with(libc::SOL_SOCKET, name, &on, |outcome| outcome)
                };
            }
        }
        if outcome.value() == 0 {
            outcome = socket.bind_with(address, |outcome| outcome);
        }
        if outcome.value() == 0 {
            outcome = socket.listen_with(options.backlog, |outcome| outcome);
        }
        if outcome.value() == -1 {
            socket.handle.release();
        }
        handler(outcome);
        socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasys_core::SystemError;

    fn listener() -> TcpServerSocket {
        let options = ListenOptions::default().with_backlog(4);
        TcpServerSocket::listen_init(&InetAddress::localhost(0), &options).unwrap()
    }

    #[test]
    fn test_sockets_start_invalid() {
        assert!(!TcpSocket::new().valid());
        assert!(!TcpServerSocket::default().valid());
    }

    #[test]
    fn test_connect_and_exchange() {
        let server = listener();
        let address = server.local_address().unwrap();

        let client = TcpSocket::connect_init(&address, SocketFlags::CLOEXEC).unwrap();
        let mut from = InetAddress::any(0);
        let peer = server.accept(Some(&mut from), SocketFlags::CLOEXEC).unwrap();
        assert_eq!(from, client.local_address().unwrap());
        assert_eq!(client.peer_address().unwrap(), address);

        assert_eq!(client.write(b"ping"), Ok(4));
        let mut buf = [0u8; 4];
        assert_eq!(peer.read(&mut buf), Ok(4));
        assert_eq!(&buf, b"ping");

        client.shutdown(Shutdown::Write).unwrap();
        assert_eq!(peer.read(&mut buf), Ok(0));
    }

    #[test]
    fn test_accept_without_pending_peer() {
        let options = ListenOptions {
            nonblocking: true,
            ..ListenOptions::default()
        };
        let server = TcpServerSocket::listen_init(&InetAddress::localhost(0), &options).unwrap();

        let (valid, errno) = server.accept_with(None, SocketFlags::empty(), |peer, outcome| {
            (peer.valid(), outcome.errno())
        });
        assert!(!valid);
        assert_eq!(errno, libc::EAGAIN);
        assert_eq!(
            server.accept(None, SocketFlags::empty()).err(),
            Some(SystemError::WouldBlock)
        );
    }

    #[test]
    fn test_connect_init_with_closes_on_refusal() {
        let port = {
            let server = listener();
            server.local_address().unwrap().port()
        };
        let mut errno = 0;
        let socket = TcpSocket::connect_init_with(
            &InetAddress::localhost(port),
            SocketFlags::CLOEXEC,
            |outcome| errno = outcome.errno(),
        );
        assert!(!socket.valid());
        assert_eq!(errno, libc::ECONNREFUSED);
    }

    #[test]
    fn test_listen_init_with_reports_bind_failure() {
        let server = listener();
        let taken = server.local_address().unwrap();
        let options = ListenOptions {
            reuse_port: false,
            ..ListenOptions::default()
        };

        let mut failure = None;
        let socket = TcpServerSocket::listen_init_with(&taken, &options, |outcome| {
            failure = Some((outcome.value(), outcome.errno()))
        });
        assert!(!socket.valid());
        assert_eq!(failure, Some((-1, libc::EADDRINUSE)));
    }
}
