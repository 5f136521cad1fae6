//! Socket capability layers.
//!
//! Like the descriptor layers in `metasys_core`, these are traits with
//! default methods only. A socket composite lists the layers it supports:
//! a client socket is [`Bindable`] and [`Connecting`], a server socket is
//! [`Bindable`], [`Listening`] and [`Accepting`].

use crate::address::InetAddress;
use bitflags::bitflags;
use metasys_core::descriptor::FdHandle;
use metasys_core::outcome::Outcome;
use metasys_core::{contract, Descriptor, SysResult, SystemError};
use std::mem;
use std::os::fd::RawFd;
use std::time::Duration;

contract!(pub(crate) SOCKET: "socket" => EINVAL, EAFNOSUPPORT, EPROTONOSUPPORT);
contract!(SOCKOPT: "sockopt" => EBADF, EFAULT, EINVAL, ENOPROTOOPT, ENOTSOCK);
contract!(SOCKNAME: "getsockname" => EBADF, EFAULT, EINVAL, ENOTSOCK);
contract!(BIND: "bind" => EBADF, EINVAL, ENOTSOCK, EFAULT, ENAMETOOLONG);
contract!(CONNECT: "connect" => EAFNOSUPPORT, EALREADY, EBADF, EFAULT, EISCONN, ENOTSOCK, EPROTOTYPE);
contract!(LISTEN: "listen" => EBADF, ENOTSOCK, EOPNOTSUPP);
contract!(ACCEPT: "accept" => EBADF, EFAULT, EINVAL, ENOTSOCK, EOPNOTSUPP);

bitflags! {
    /// Flags applied when a socket descriptor is created or accepted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SocketFlags: i32 {
        /// `SOCK_NONBLOCK`
        const NONBLOCK = libc::SOCK_NONBLOCK;
        /// `SOCK_CLOEXEC`
        const CLOEXEC = libc::SOCK_CLOEXEC;
    }
}

/// Create an IPv4 stream socket into `handle`.
pub(crate) fn open_stream<F, R>(handle: &mut FdHandle, flags: SocketFlags, handler: F) -> R
where
    F: FnOnce(Outcome<RawFd>) -> R,
{
    SOCKET.require(!handle.valid(), "socket is already open");
    let outcome = Outcome::invoke(|| unsafe {
        libc::socket(
            libc::AF_INET,
            libc::SOCK_STREAM | flags.bits(),
            libc::IPPROTO_TCP,
        )
    });
    if outcome.value() >= 0 {
        log::trace!("opened socket {}", outcome.value());
        // SAFETY: the descriptor was just created and is unowned.
        unsafe { handle.reset(outcome.value()) };
    }
    handler(outcome)
}

const fn addrlen() -> libc::socklen_t {
    mem::size_of::<libc::sockaddr_in>() as libc::socklen_t
}

/// Socket option access and local address lookup.
///
/// The generic accessors copy raw option bytes in and out of a `T` and are
/// `unsafe`. The typed accessors cover the integer, `linger` and `timeval`
/// options and are safe.
pub trait SocketOptions: Descriptor {
    /// Raw `getsockopt(2)` into `value`.
    ///
    /// # Safety
    ///
    /// `T` must be plain data that is valid for every bit pattern of its
    /// size, such as `c_int`, `linger` or `timeval`. The kernel overwrites
    /// `value` with whatever bytes the option holds.
    unsafe fn getsockopt_with<T, F, R>(&self, level: i32, name: i32, value: &mut T, handler: F) -> R
    where
        T: Copy,
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        SOCKOPT.require(self.valid(), "socket is not open");
        let fd = self.fd();
        let mut len = mem::size_of::<T>() as libc::socklen_t;
        handler(Outcome::invoke(|| unsafe {
            libc::getsockopt(fd, level, name, (value as *mut T).cast(), &mut len)
        }))
    }

    /// Read an option of type `T`.
    ///
    /// # Safety
    ///
    /// Same contract as [`SocketOptions::getsockopt_with`].
    unsafe fn getsockopt<T: Copy + Default>(&self, level: i32, name: i32) -> SysResult<T> {
        let mut value = T::default();
        self.getsockopt_with(level, name, &mut value, |outcome| {
            outcome.check_status(&SOCKOPT)
        })?;
        Ok(value)
    }

    /// Raw `setsockopt(2)` from `value`.
    ///
    /// # Safety
    ///
    /// `T` must be the plain data type the option expects, with no padding
    /// or pointers. Its bytes are handed to the kernel as they are.
    unsafe fn setsockopt_with<T, F, R>(&self, level: i32, name: i32, value: &T, handler: F) -> R
    where
        T: Copy,
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        SOCKOPT.require(self.valid(), "socket is not open");
        let fd = self.fd();
        let len = mem::size_of::<T>() as libc::socklen_t;
        handler(Outcome::invoke(|| unsafe {
            libc::setsockopt(fd, level, name, (value as *const T).cast(), len)
        }))
    }

    /// Set an option of type `T`.
    ///
    /// # Safety
    ///
    /// Same contract as [`SocketOptions::setsockopt_with`].
    unsafe fn setsockopt<T: Copy>(&self, level: i32, name: i32, value: &T) -> SysResult<()> {
        self.setsockopt_with(level, name, value, |outcome| {
            outcome.check_status(&SOCKOPT)
        })
    }

    /// Read an integer option.
    fn int_option(&self, level: i32, name: i32) -> SysResult<libc::c_int> {
        // SAFETY: every bit pattern is a valid c_int.
        unsafe { self.getsockopt::<libc::c_int>(level, name) }
    }

    /// Set an integer option.
    fn set_int_option(&self, level: i32, name: i32, value: libc::c_int) -> SysResult<()> {
        // SAFETY: c_int is plain data without padding.
        unsafe { self.setsockopt(level, name, &value) }
    }

    /// `SO_LINGER`: how long `close` waits for unsent data, `None` when
    /// lingering is off.
    fn linger(&self) -> SysResult<Option<Duration>> {
        let mut value = libc::linger { l_onoff: 0, l_linger: 0 };
        // SAFETY: linger is two c_ints, valid for every bit pattern.
        unsafe {
            self.getsockopt_with(libc::SOL_SOCKET, libc::SO_LINGER, &mut value, |outcome| {
                outcome.check_status(&SOCKOPT)
            })?;
        }
        Ok((value.l_onoff != 0).then(|| Duration::from_secs(value.l_linger.max(0) as u64)))
    }

    /// Set `SO_LINGER`. Sub-second parts are dropped.
    fn set_linger(&self, linger: Option<Duration>) -> SysResult<()> {
        let value = libc::linger {
            l_onoff: libc::c_int::from(linger.is_some()),
            l_linger: linger.map_or(0, |d| d.as_secs().min(libc::c_int::MAX as u64) as libc::c_int),
        };
        // SAFETY: linger is two c_ints without padding.
        unsafe { self.setsockopt(libc::SOL_SOCKET, libc::SO_LINGER, &value) }
    }

    /// Read a `timeval` option such as `SO_RCVTIMEO`. `None` means no
    /// timeout.
    fn timeout_option(&self, name: i32) -> SysResult<Option<Duration>> {
        let mut value = libc::timeval { tv_sec: 0, tv_usec: 0 };
        // SAFETY: timeval is two integers, valid for every bit pattern.
        unsafe {
            self.getsockopt_with(libc::SOL_SOCKET, name, &mut value, |outcome| {
                outcome.check_status(&SOCKOPT)
            })?;
        }
        let timeout = Duration::from_secs(value.tv_sec.max(0) as u64)
            + Duration::from_micros(value.tv_usec.max(0) as u64);
        Ok((!timeout.is_zero()).then_some(timeout))
    }

    /// Set a `timeval` option such as `SO_SNDTIMEO`. `None` or a zero
    /// duration clears the timeout.
    fn set_timeout_option(&self, name: i32, timeout: Option<Duration>) -> SysResult<()> {
        let timeout = timeout.unwrap_or(Duration::ZERO);
        let value = libc::timeval {
            tv_sec: timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };
        // SAFETY: timeval is two integers without padding on Linux.
        unsafe { self.setsockopt(libc::SOL_SOCKET, name, &value) }
    }

    /// `SO_RCVTIMEO`
    fn read_timeout(&self) -> SysResult<Option<Duration>> {
        self.timeout_option(libc::SO_RCVTIMEO)
    }

    /// Set `SO_RCVTIMEO`.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> SysResult<()> {
        self.set_timeout_option(libc::SO_RCVTIMEO, timeout)
    }

    /// `SO_REUSEADDR`
    fn set_reuse_addr(&self, enabled: bool) -> SysResult<()> {
        self.set_int_option(libc::SOL_SOCKET, libc::SO_REUSEADDR, libc::c_int::from(enabled))
    }

    /// `SO_REUSEPORT`
    fn set_reuse_port(&self, enabled: bool) -> SysResult<()> {
        self.set_int_option(libc::SOL_SOCKET, libc::SO_REUSEPORT, libc::c_int::from(enabled))
    }

    /// Whether `SO_REUSEPORT` is set.
    fn reuse_port(&self) -> SysResult<bool> {
        self.int_option(libc::SOL_SOCKET, libc::SO_REUSEPORT)
            .map(|value| value != 0)
    }

    /// Fetch and clear the pending socket error (`SO_ERROR`).
    fn pending_error(&self) -> SysResult<Option<SystemError>> {
        let code = self.int_option(libc::SOL_SOCKET, libc::SO_ERROR)?;
        Ok((code != 0).then(|| SystemError::from_errno(code)))
    }

    /// Raw `getsockname(2)` into `address`.
    fn local_address_with<F, R>(&self, address: &mut InetAddress, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        SOCKNAME.require(self.valid(), "socket is not open");
        let fd = self.fd();
        let mut len = addrlen();
        handler(Outcome::invoke(|| unsafe {
            libc::getsockname(fd, address.as_mut_sockaddr(), &mut len)
        }))
    }

    /// The address the socket is bound to.
    fn local_address(&self) -> SysResult<InetAddress> {
        let mut address = InetAddress::any(0);
        self.local_address_with(&mut address, |outcome| outcome.check_status(&SOCKNAME))?;
        Ok(address)
    }
}

/// Assign a local address.
pub trait Bindable: Descriptor {
    /// Raw `bind(2)`.
    ///
    /// # Panics
    ///
    /// Panics if no descriptor is held.
    fn bind_with<F, R>(&self, address: &InetAddress, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        BIND.require(self.valid(), "socket is not open");
        let fd = self.fd();
        handler(Outcome::invoke(|| unsafe {
            libc::bind(fd, address.as_sockaddr(), addrlen())
        }))
    }

    /// Bind to `address`.
    fn bind(&self, address: &InetAddress) -> SysResult<()> {
        self.bind_with(address, |outcome| outcome.check_status(&BIND))
    }
}

/// Mark a socket passive.
pub trait Listening: Descriptor {
    /// Raw `listen(2)`.
    ///
    /// # Panics
    ///
    /// Panics if no descriptor is held.
    fn listen_with<F, R>(&self, backlog: i32, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        LISTEN.require(self.valid(), "socket is not open");
        let fd = self.fd();
        handler(Outcome::invoke(|| unsafe { libc::listen(fd, backlog) }))
    }

    /// Accept connections with a queue of `backlog` pending peers.
    fn listen(&self, backlog: i32) -> SysResult<()> {
        self.listen_with(backlog, |outcome| outcome.check_status(&LISTEN))
    }
}

/// Start and drop connections.
pub trait Connecting: Descriptor {
    /// Raw `connect(2)`.
    ///
    /// # Panics
    ///
    /// Panics if no descriptor is held.
    fn connect_with<F, R>(&self, address: &InetAddress, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        CONNECT.require(self.valid(), "socket is not open");
        let fd = self.fd();
        handler(Outcome::invoke(|| unsafe {
            libc::connect(fd, address.as_sockaddr(), addrlen())
        }))
    }

    /// Connect to `address`.
    fn connect(&self, address: &InetAddress) -> SysResult<()> {
        self.connect_with(address, |outcome| outcome.check_status(&CONNECT))
    }

    /// Raw dissolve of the association, a `connect(2)` to `AF_UNSPEC`.
    fn disconnect_with<F, R>(&self, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        CONNECT.require(self.valid(), "socket is not open");
        let fd = self.fd();
        // SAFETY: an all-zero sockaddr is a valid AF_UNSPEC address.
        let unspec: libc::sockaddr = unsafe { mem::zeroed() };
        handler(Outcome::invoke(|| unsafe {
            libc::connect(fd, &unspec, mem::size_of::<libc::sockaddr>() as libc::socklen_t)
        }))
    }

    /// Dissolve the association with the peer.
    fn disconnect(&self) -> SysResult<()> {
        self.disconnect_with(|outcome| outcome.check_status(&CONNECT))
    }
}

/// Take pending connections off a listening socket.
pub trait Accepting: Descriptor {
    /// The composite a connection is handed out as.
    type Peer: From<FdHandle>;

    /// Raw `accept4(2)`.
    ///
    /// The result is wrapped in a fresh peer before `handler` runs, so the
    /// handler always owns a determinate peer; it is invalid when the call
    /// failed. When `from` is given it receives the peer's address.
    ///
    /// # Panics
    ///
    /// Panics if no descriptor is held.
    fn accept_with<F, R>(&self, from: Option<&mut InetAddress>, flags: SocketFlags, handler: F) -> R
    where
        F: FnOnce(Self::Peer, Outcome<RawFd>) -> R,
    {
        ACCEPT.require(self.valid(), "socket is not open");
        let fd = self.fd();
        let mut len = addrlen();
        let outcome = Outcome::invoke(|| unsafe {
            match from {
                Some(address) => libc::accept4(fd, address.as_mut_sockaddr(), &mut len, flags.bits()),
                None => libc::accept4(fd, std::ptr::null_mut(), std::ptr::null_mut(), flags.bits()),
            }
        });
        if outcome.value() >= 0 {
            log::trace!("accepted socket {} on {}", outcome.value(), fd);
        }
        // SAFETY: a non-negative result is a new, unowned descriptor and -1
        // is the sentinel.
        let peer = Self::Peer::from(unsafe { FdHandle::from_raw(outcome.value()) });
        handler(peer, outcome)
    }

    /// Wait for and return the next connection.
    fn accept(&self, from: Option<&mut InetAddress>, flags: SocketFlags) -> SysResult<Self::Peer> {
        self.accept_with(from, flags, |peer, outcome| {
            outcome.check(|fd| fd < 0, &ACCEPT).map(|_| peer)
        })
    }
}
