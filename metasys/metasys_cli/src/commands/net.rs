//! Network commands: `resolve`, `probe` and the `serve` echo server.

use super::write_fully;
use crate::config::ServeConfig;
use anyhow::{bail, Context, Result};
use clap::Args;
use metasys_core::{log_event, LogLevel, Readable, SystemError};
use metasys_io::{Epoll, EpollEvent, EpollFlags};
use metasys_net::{
    Accepting, AddressInfo, Hints, InetAddress, SocketFlags, SocketOptions, TcpAddress,
    TcpServerSocket, TcpSocket,
};
use std::collections::HashMap;
use std::os::fd::{AsRawFd, RawFd};

/// Arguments for the resolve command
#[derive(Args)]
pub struct ResolveArgs {
    /// Host name or dotted address
    pub node: String,

    /// Service name or port number
    pub service: String,

    /// Print the canonical name of the host
    #[clap(long)]
    pub canonical: bool,
}

/// Arguments for the probe command
#[derive(Args)]
pub struct ProbeArgs {
    /// Host name or dotted address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on; 0 picks a free one
    #[clap(long, default_value_t = 7007)]
    pub port: u16,

    /// Listen on all interfaces instead of loopback
    #[clap(long)]
    pub public: bool,

    /// Exit after the first client disconnects
    #[clap(long)]
    pub once: bool,
}

/// Implementation of the resolve command
pub fn execute_resolve(args: &ResolveArgs) -> Result<()> {
    let mut hints = Hints::TCP;
    if args.canonical {
        hints = hints.with_flags(libc::AI_CANONNAME);
    }
    let info = AddressInfo::resolve_init(
        Some(args.node.as_str()),
        Some(args.service.as_str()),
        Some(&hints),
    )
    .with_context(|| format!("resolving {}:{}", args.node, args.service))?;

    if args.canonical {
        if let Some(name) = info.first().and_then(|entry| entry.canonical_name()) {
            println!("canonical name: {}", name.to_string_lossy());
        }
    }
    let addresses = info.inet_addresses();
    if addresses.is_empty() {
        bail!("{}:{} has no IPv4 TCP address", args.node, args.service);
    }
    for address in addresses {
        println!("{}", address);
    }
    Ok(())
}

/// Implementation of the probe command
pub fn execute_probe(args: &ProbeArgs) -> Result<()> {
    let address = TcpAddress::instance_port(&args.host, args.port)
        .with_context(|| format!("resolving {}", args.host))?;
    let socket = TcpSocket::connect_init(&address, SocketFlags::CLOEXEC)
        .with_context(|| format!("connecting to {}", address))?;
    let local = socket.local_address().context("reading local address")?;
    println!("{} is accepting connections (local end {})", address, local);
    Ok(())
}

/// Echo server state: the listener plus one socket per connected client,
/// all registered with one epoll instance keyed by descriptor.
struct EchoServer {
    epoll: Epoll,
    listener: TcpServerSocket,
    peers: HashMap<RawFd, TcpSocket>,
    buf: Vec<u8>,
    served: usize,
}

impl EchoServer {
    fn new(address: &InetAddress, config: &ServeConfig, buffer_size: usize) -> Result<Self> {
        let mut options = config.listen.clone();
        options.nonblocking = true;
        options.validate()?;

        let listener = TcpServerSocket::listen_init(address, &options)
            .with_context(|| format!("listening on {}", address))?;
        let epoll = Epoll::create_init(true).context("creating epoll instance")?;
        epoll
            .add(&listener, EpollFlags::IN, listener.as_raw_fd())
            .context("watching listener")?;

        Ok(Self {
            epoll,
            listener,
            peers: HashMap::new(),
            buf: vec![0u8; buffer_size],
            served: 0,
        })
    }

    fn accept_pending(&mut self) -> Result<()> {
        loop {
            let mut from = InetAddress::any(0);
            let peer = match self
                .listener
                .accept(Some(&mut from), SocketFlags::NONBLOCK | SocketFlags::CLOEXEC)
            {
                Ok(peer) => peer,
                Err(SystemError::WouldBlock) => return Ok(()),
                Err(SystemError::ConnectionAborted) => continue,
                Err(e) => return Err(e).context("accepting connection"),
            };
            let fd = peer.as_raw_fd();
            self.epoll
                .add(&peer, EpollFlags::IN | EpollFlags::RDHUP, fd)
                .context("watching client")?;
            log_event!(LogLevel::Info, "client connected", peer => from, fd => fd);
            self.peers.insert(fd, peer);
        }
    }

    /// Echo what the client sent. Returns false once the client is gone.
    fn echo(&mut self, fd: RawFd) -> Result<bool> {
        let Some(peer) = self.peers.get(&fd) else {
            return Ok(true);
        };
        loop {
            match peer.read(&mut self.buf) {
                Ok(0) => return Ok(false),
                Ok(count) => {
                    if let Err(e) = write_fully(peer, &self.buf[..count]) {
                        log::warn!("dropping client on descriptor {}: {}", fd, e);
                        return Ok(false);
                    }
                }
                Err(SystemError::WouldBlock) => return Ok(true),
                Err(e) => {
                    log::warn!("dropping client on descriptor {}: {}", fd, e);
                    return Ok(false);
                }
            }
        }
    }

    fn disconnect(&mut self, fd: RawFd) -> Result<()> {
        if let Some(peer) = self.peers.remove(&fd) {
            self.epoll.delete(&peer).context("unwatching client")?;
            log_event!(LogLevel::Info, "client disconnected", fd => fd);
            self.served += 1;
        }
        Ok(())
    }

    fn run(&mut self, config: &ServeConfig, once: bool) -> Result<()> {
        let listener_fd = self.listener.as_raw_fd();
        let mut events: Vec<EpollEvent<RawFd>> = (0..config.max_events)
            .map(|_| EpollEvent::new(EpollFlags::empty(), -1))
            .collect();

        loop {
            let ready = self
                .epoll
                .wait(&mut events, config.timeout_ms)
                .context("waiting for events")?;
            if ready == 0 {
                log::debug!("no activity within {} ms", config.timeout_ms);
                continue;
            }
            for event in &events[..ready] {
                let fd = event.data();
                if fd == listener_fd {
                    self.accept_pending()?;
                    continue;
                }
                let mut open = true;
                if event.flags().intersects(EpollFlags::IN) {
                    open = self.echo(fd)?;
                }
                if event
                    .flags()
                    .intersects(EpollFlags::RDHUP | EpollFlags::HUP | EpollFlags::ERR)
                {
                    open = false;
                }
                if !open {
                    self.disconnect(fd)?;
                }
            }
            if once && self.served > 0 {
                return Ok(());
            }
        }
    }
}

/// Implementation of the serve command
pub fn execute_serve(args: &ServeArgs, config: &ServeConfig, buffer_size: usize) -> Result<()> {
    let address = if args.public {
        InetAddress::any(args.port)
    } else {
        InetAddress::localhost(args.port)
    };
    let mut server = EchoServer::new(&address, config, buffer_size)?;
    let bound = server
        .listener
        .local_address()
        .context("reading listener address")?;
    println!("listening on {}", bound);
    server.run(config, args.once)
}
