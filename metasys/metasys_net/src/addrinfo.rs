//! Name resolution through `getaddrinfo(3)`.
//!
//! [`AddressInfo`] owns the result list and frees it with
//! `freeaddrinfo(3)`. [`TcpAddress`] is the common case: resolve a host and
//! service to the first IPv4 TCP address.

use crate::address::InetAddress;
use metasys_core::outcome::Outcome;
use metasys_core::{Handle, ResolveError, Resource};
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::mem;
use std::ptr;

/// Resource kind for `addrinfo` lists.
#[derive(Debug)]
pub enum AddrInfoList {}

impl Resource for AddrInfoList {
    type Id = *mut libc::addrinfo;
    const SENTINEL: *mut libc::addrinfo = ptr::null_mut();
    const NAME: &'static str = "address list";

    fn release(id: *mut libc::addrinfo) {
        // SAFETY: the handle owned the list and gives it up here.
        unsafe { libc::freeaddrinfo(id) };
    }
}

fn raise(code: i32, errno: i32) -> ResolveError {
    let error = ResolveError::from_code(code, errno);
    assert!(
        code != libc::EAI_BADFLAGS && code != libc::EAI_SOCKTYPE,
        "getaddrinfo: contract violation: {}",
        error.message()
    );
    log::debug!("getaddrinfo failed: {}", error);
    error
}

/// Selection criteria passed to `getaddrinfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hints {
    /// `AI_*` flags.
    pub flags: i32,
    /// Address family, `AF_UNSPEC` for any.
    pub family: i32,
    /// Socket type, zero for any.
    pub socktype: i32,
    /// Protocol, zero for any.
    pub protocol: i32,
}

impl Hints {
    /// IPv4 stream sockets over TCP.
    pub const TCP: Self = Self {
        flags: 0,
        family: libc::AF_INET,
        socktype: libc::SOCK_STREAM,
        protocol: libc::IPPROTO_TCP,
    };

    /// The same hints with `flags` added.
    pub fn with_flags(mut self, flags: i32) -> Self {
        self.flags |= flags;
        self
    }

    fn to_raw(self) -> libc::addrinfo {
        // SAFETY: `struct addrinfo` is plain data; null pointers and zero
        // fields are what getaddrinfo expects in hints.
        let mut raw: libc::addrinfo = unsafe { mem::zeroed() };
        raw.ai_flags = self.flags;
        raw.ai_family = self.family;
        raw.ai_socktype = self.socktype;
        raw.ai_protocol = self.protocol;
        raw
    }
}

/// An owned `getaddrinfo` result list.
#[derive(Debug, Default)]
pub struct AddressInfo {
    handle: Handle<AddrInfoList>,
}

impl AddressInfo {
    /// An empty result holding no list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a list is held.
    pub fn valid(&self) -> bool {
        self.handle.valid()
    }

    /// Raw `getaddrinfo(3)`. The handler receives the returned code; on
    /// `EAI_SYSTEM` the outcome's errno holds the cause. A node or service
    /// containing a NUL byte is reported as `EAI_SYSTEM` with `EINVAL`.
    ///
    /// # Panics
    ///
    /// Panics if a list is already held.
    pub fn resolve_with<F, R>(
        &mut self,
        node: Option<&str>,
        service: Option<&str>,
        hints: Option<&Hints>,
        handler: F,
    ) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        assert!(!self.valid(), "getaddrinfo: result list already held");
        let (node, service) = match (
            node.map(CString::new).transpose(),
            service.map(CString::new).transpose(),
        ) {
            (Ok(node), Ok(service)) => (node, service),
            _ => return handler(Outcome::new(libc::EAI_SYSTEM, libc::EINVAL)),
        };
        let hints = hints.map(|hints| hints.to_raw());

        let mut list: *mut libc::addrinfo = ptr::null_mut();
        let outcome = Outcome::invoke(|| unsafe {
            libc::getaddrinfo(
                node.as_ref().map_or(ptr::null(), |node| node.as_ptr()),
                service.as_ref().map_or(ptr::null(), |service| service.as_ptr()),
                hints.as_ref().map_or(ptr::null(), |hints| hints as *const libc::addrinfo),
                &mut list,
            )
        });
        if outcome.value() == 0 {
            // SAFETY: the list was just allocated and is unowned.
            unsafe { self.handle.reset(list) };
        }
        handler(outcome)
    }

    /// Resolve `node` and `service`.
    pub fn resolve(
        &mut self,
        node: Option<&str>,
        service: Option<&str>,
        hints: Option<&Hints>,
    ) -> Result<(), ResolveError> {
        self.resolve_with(node, service, hints, |outcome| match outcome.value() {
            0 => Ok(()),
            code => Err(raise(code, outcome.errno())),
        })
    }

    /// A resolved list.
    pub fn resolve_init(
        node: Option<&str>,
        service: Option<&str>,
        hints: Option<&Hints>,
    ) -> Result<Self, ResolveError> {
        let mut info = Self::new();
        info.resolve(node, service, hints)?;
        Ok(info)
    }

    /// A list after one raw resolution; empty if it failed.
    pub fn resolve_init_with<F>(
        node: Option<&str>,
        service: Option<&str>,
        hints: Option<&Hints>,
        handler: F,
    ) -> Self
    where
        F: FnOnce(Outcome<libc::c_int>),
    {
        let mut info = Self::new();
        info.resolve_with(node, service, hints, handler);
        info
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> AddrInfoIter<'_> {
        AddrInfoIter {
            next: self.handle.raw(),
            _list: PhantomData,
        }
    }

    /// The first entry.
    pub fn first(&self) -> Option<AddrInfoEntry<'_>> {
        self.iter().next()
    }

    /// Whether the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.handle.raw().is_null()
    }

    /// All IPv4 addresses in the list, in order.
    pub fn inet_addresses(&self) -> Vec<InetAddress> {
        self.iter().filter_map(|entry| entry.inet_address()).collect()
    }
}

impl<'a> IntoIterator for &'a AddressInfo {
    type Item = AddrInfoEntry<'a>;
    type IntoIter = AddrInfoIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One entry of an [`AddressInfo`] list.
#[derive(Clone, Copy)]
pub struct AddrInfoEntry<'a> {
    raw: &'a libc::addrinfo,
}

impl<'a> AddrInfoEntry<'a> {
    /// Address family.
    pub fn family(&self) -> i32 {
        self.raw.ai_family
    }

    /// Socket type.
    pub fn socktype(&self) -> i32 {
        self.raw.ai_socktype
    }

    /// Protocol.
    pub fn protocol(&self) -> i32 {
        self.raw.ai_protocol
    }

    /// Flags echoed from the hints.
    pub fn flags(&self) -> i32 {
        self.raw.ai_flags
    }

    /// Canonical name, present on the first entry with `AI_CANONNAME`.
    pub fn canonical_name(&self) -> Option<&'a CStr> {
        if self.raw.ai_canonname.is_null() {
            None
        } else {
            // SAFETY: non-null names are NUL terminated and live with the list.
            Some(unsafe { CStr::from_ptr(self.raw.ai_canonname) })
        }
    }

    /// The entry's address, when it is IPv4.
    pub fn inet_address(&self) -> Option<InetAddress> {
        let fits = self.raw.ai_addrlen as usize >= mem::size_of::<libc::sockaddr_in>();
        if self.raw.ai_family != libc::AF_INET || self.raw.ai_addr.is_null() || !fits {
            return None;
        }
        // SAFETY: an AF_INET entry points at a sockaddr_in of ai_addrlen bytes.
        let raw = unsafe { ptr::read_unaligned(self.raw.ai_addr.cast::<libc::sockaddr_in>()) };
        Some(InetAddress::from_raw(raw))
    }
}

impl std::fmt::Debug for AddrInfoEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddrInfoEntry")
            .field("family", &self.family())
            .field("socktype", &self.socktype())
            .field("protocol", &self.protocol())
            .field("address", &self.inet_address())
            .finish()
    }
}

/// Iterator over an [`AddressInfo`] list.
pub struct AddrInfoIter<'a> {
    next: *mut libc::addrinfo,
    _list: PhantomData<&'a AddressInfo>,
}

impl<'a> Iterator for AddrInfoIter<'a> {
    type Item = AddrInfoEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next.is_null() {
            return None;
        }
        // SAFETY: entries stay alive as long as the borrowed list.
        let raw: &'a libc::addrinfo = unsafe { &*self.next };
        self.next = raw.ai_next;
        Some(AddrInfoEntry { raw })
    }
}

/// Resolution of TCP endpoints over IPv4.
#[derive(Debug)]
pub enum TcpAddress {}

impl TcpAddress {
    /// Raw resolution with [`Hints::TCP`] into `dest`.
    pub fn resolve_with<F, R>(dest: &mut AddressInfo, node: &str, service: &str, handler: F) -> R
    where
        F: FnOnce(Outcome<libc::c_int>) -> R,
    {
        dest.resolve_with(Some(node), Some(service), Some(&Hints::TCP), handler)
    }

    /// Resolve into `dest` with [`Hints::TCP`].
    pub fn resolve(dest: &mut AddressInfo, node: &str, service: &str) -> Result<(), ResolveError> {
        dest.resolve(Some(node), Some(service), Some(&Hints::TCP))
    }

    /// The first TCP address for `node` and a named or numeric `service`.
    pub fn instance(node: &str, service: &str) -> Result<InetAddress, ResolveError> {
        let info = AddressInfo::resolve_init(Some(node), Some(service), Some(&Hints::TCP))?;
        info.first()
            .and_then(|entry| entry.inet_address())
            .ok_or(ResolveError::Service)
    }

    /// The first TCP address for `node` on a numeric port.
    pub fn instance_port(node: &str, port: u16) -> Result<InetAddress, ResolveError> {
        let hints = Hints::TCP.with_flags(libc::AI_NUMERICSERV);
        let service = port.to_string();
        let info = AddressInfo::resolve_init(Some(node), Some(service.as_str()), Some(&hints))?;
        info.first()
            .and_then(|entry| entry.inet_address())
            .ok_or(ResolveError::Service)
    }
}
