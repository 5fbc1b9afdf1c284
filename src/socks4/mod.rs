//! SOCKS4 and SOCKS4a client.
//!
//! A [`Socks4Dialer`] is configured once and then shared by any number of
//! concurrent dials. Each dial goes through the same steps:
//!
//! 1. reject non-TCP networks, a missing context, and malformed targets
//!    without touching the network;
//! 2. reach the proxy, through the configured upstream dialer if there is
//!    one (which is how proxies are chained);
//! 3. send the CONNECT frame, read exactly eight reply bytes and decode them,
//!    all while racing the context.
//!
//! On success the transport is handed to the caller inside a [`Socks4Conn`].
//! On failure it is dropped, and therefore closed, before the error is
//! returned.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::rc::Rc;

use futures::{future, Future, Poll};
use tokio_core::reactor::Handle;
use tokio_io::io::{read_exact, write_all};
use tokio_io::{AsyncRead, AsyncWrite};

use crate::addr::{Host, Target};
use crate::constants::socks4::REPLY_LEN;
use crate::context::Context;
use crate::error::{Error, OpError};
use crate::redirect::{check_network, Dial, DialFuture, Direct, Transport};
use crate::resolve::{default_resolver, Resolve};
use crate::socks_helpers::FutureExt;

pub mod codec;

use self::codec::{Destination, Request};

/// The address the proxy reports for its side of the relayed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundAddr(SocketAddrV4);

impl BoundAddr {
    pub fn new(ip: Ipv4Addr, port: u16) -> BoundAddr {
        BoundAddr(SocketAddrV4::new(ip, port))
    }

    pub fn ip(&self) -> &Ipv4Addr {
        self.0.ip()
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn network(&self) -> &'static str {
        "socks"
    }
}

impl fmt::Display for BoundAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A connection relayed by a SOCKS4 proxy.
///
/// Owns the transport to the proxy; dropping it closes the relay.
pub struct Socks4Conn {
    conn: Box<Transport>,
    bound: BoundAddr,
}

impl Socks4Conn {
    /// Address assigned by the proxy for connecting to the target.
    pub fn bound_addr(&self) -> BoundAddr {
        self.bound
    }

    pub fn into_inner(self) -> Box<Transport> {
        self.conn
    }
}

impl fmt::Debug for Socks4Conn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Socks4Conn")
            .field("bound", &self.bound)
            .finish()
    }
}

impl Read for Socks4Conn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.conn.read(buf)
    }
}

impl Write for Socks4Conn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.conn.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.conn.flush()
    }
}

impl AsyncRead for Socks4Conn {}

impl AsyncWrite for Socks4Conn {
    fn shutdown(&mut self) -> Poll<(), io::Error> {
        self.conn.shutdown()
    }
}

pub type ConnectFuture = Box<Future<Item = Socks4Conn, Error = OpError>>;

/// SOCKS4/4a dialer settings. Immutable once built.
pub struct Socks4Dialer {
    proxy_network: String,
    proxy_address: String,
    proxy_dial: Option<Rc<Dial>>,
    user: String,
    support_dns: bool,
    resolver: Rc<Resolve>,
}

impl Socks4Dialer {
    /// A dialer for the proxy at `address`, reached over `network`.
    pub fn new(network: &str, address: &str) -> Socks4Dialer {
        Socks4Dialer {
            proxy_network: network.to_owned(),
            proxy_address: address.to_owned(),
            proxy_dial: None,
            user: String::new(),
            support_dns: false,
            resolver: default_resolver(),
        }
    }

    /// Reach the proxy through `dial` instead of a plain TCP connection.
    pub fn proxy_dial(mut self, dial: Rc<Dial>) -> Socks4Dialer {
        self.proxy_dial = Some(dial);
        self
    }

    /// User ID sent in every request.
    pub fn user(mut self, user: &str) -> Socks4Dialer {
        self.user = user.to_owned();
        self
    }

    /// Let the proxy resolve hostnames (SOCKS4a).
    pub fn support_dns(mut self, enabled: bool) -> Socks4Dialer {
        self.support_dns = enabled;
        self
    }

    pub fn resolver(mut self, resolver: Rc<Resolve>) -> Socks4Dialer {
        self.resolver = resolver;
        self
    }

    fn op_error(&self, network: &str, address: &str, err: Error) -> OpError {
        OpError::connect(network, &self.proxy_address, address, err)
    }

    /// Validation shared by both entry points; performs no I/O.
    fn validate<'a>(
        &self,
        ctx: Option<&'a Context>,
        network: &str,
        address: &str,
    ) -> Result<(&'a Context, Target), Error> {
        check_network(network)?;
        let ctx = ctx.ok_or(Error::InvalidContext)?;
        let target = Target::parse(address)?;
        match target.host {
            Host::V6(_) => {
                return Err(Error::InvalidAddress(format!(
                    "{}: SOCKS4 cannot carry IPv6 destinations",
                    address
                )))
            }
            // NUL terminates the hostname field on the wire
            Host::Name(ref name) if name.contains('\0') => {
                return Err(Error::InvalidAddress(format!(
                    "{:?}: NUL byte in host name",
                    address
                )))
            }
            _ => {}
        }
        if self.user.contains('\0') {
            return Err(Error::InvalidParams(
                "SOCKS4 user id contains a NUL byte".to_owned(),
            ));
        }
        Ok((ctx, target))
    }

    /// Connects to `address` through the proxy.
    ///
    /// Fails with `InvalidContext` when `ctx` is `None`. The returned error
    /// names the proxy and the target whatever went wrong.
    pub fn connect(&self, ctx: Option<&Context>, network: &str, address: &str) -> ConnectFuture {
        let (ctx, target) = match self.validate(ctx, network, address) {
            Ok((ctx, target)) => (ctx.clone(), target),
            Err(e) => return future::err(self.op_error(network, address, e)).into_box(),
        };

        let transport = match self.proxy_dial {
            Some(ref dial) => dial.dial_context(&ctx, &self.proxy_network, &self.proxy_address),
            None => Direct::with_resolver(self.resolver.clone()).dial_context(
                &ctx,
                &self.proxy_network,
                &self.proxy_address,
            ),
        };

        let handshake = self.handshake_fn(target);
        let proxy = self.proxy_address.clone();
        let (network, address) = (network.to_owned(), address.to_owned());
        transport
            .map_err(proxy_connect_error)
            .and_then(move |conn| {
                debug!("Connected to SOCKS4 proxy {}", proxy);
                handshake(&ctx, conn)
            })
            .map_err({
                let proxy = self.proxy_address.clone();
                move |e| {
                    info!("SOCKS4 dial to {} via {} failed: {}", address, proxy, e);
                    OpError::connect(&network, &proxy, &address, e)
                }
            })
            .into_box()
    }

    /// Runs the handshake over `conn`, which must already be connected to
    /// the proxy. The connection is consumed; on success it comes back inside
    /// the returned [`Socks4Conn`].
    pub fn connect_with_conn(
        &self,
        ctx: Option<&Context>,
        conn: Box<Transport>,
        network: &str,
        address: &str,
    ) -> ConnectFuture {
        let (ctx, target) = match self.validate(ctx, network, address) {
            Ok(validated) => validated,
            Err(e) => return future::err(self.op_error(network, address, e)).into_box(),
        };

        let proxy = self.proxy_address.clone();
        let (network, address) = (network.to_owned(), address.to_owned());
        (self.handshake_fn(target))(ctx, conn)
            .map_err(move |e| OpError::connect(&network, &proxy, &address, e))
            .into_box()
    }

    /// Captures what the handshake needs so it can run after the proxy
    /// connection is up without borrowing `self`.
    fn handshake_fn(
        &self,
        target: Target,
    ) -> impl FnOnce(&Context, Box<Transport>) -> Box<Future<Item = Socks4Conn, Error = Error>>
    {
        let user_id = self.user.clone();
        let support_dns = self.support_dns;
        let resolver = self.resolver.clone();
        move |ctx: &Context, conn: Box<Transport>| {
            let port = target.port;
            let exchange = destination(&*resolver, support_dns, target.host)
                .and_then(move |dst| {
                    let request = Request { port, dst, user_id }.encode();
                    debug!("Sending SOCKS4 request of {} bytes", request.len());
                    write_all(conn, request).map_err(Error::Io)
                })
                .and_then(|(conn, _)| read_exact(conn, [0u8; REPLY_LEN]).map_err(Error::Io))
                .and_then(|(conn, reply)| match codec::decode_reply(&reply) {
                    Ok(bound) => {
                        debug!("SOCKS4 proxy bound {}", bound);
                        Ok(Socks4Conn { conn, bound })
                    }
                    Err(e) => {
                        drop(conn);
                        Err(e)
                    }
                });
            ctx.bound(exchange)
        }
    }
}

/// Picks how the target goes on the wire. Literal IPv4 addresses are always
/// sent as such; hostnames go to the proxy only with SOCKS4a.
fn destination(
    resolver: &Resolve,
    support_dns: bool,
    host: Host,
) -> Box<Future<Item = Destination, Error = Error>> {
    match host {
        Host::V4(ip) => future::ok(Destination::Ip(ip)).into_box(),
        Host::V6(ip) => {
            future::err(Error::InvalidAddress(format!("{}: not an IPv4 address", ip))).into_box()
        }
        Host::Name(name) => {
            if support_dns {
                return future::ok(Destination::Domain(name)).into_box();
            }
            resolver
                .resolve(&name)
                .then(move |res| match res {
                    Ok(addrs) => addrs
                        .into_iter()
                        .filter_map(|ip| match ip {
                            IpAddr::V4(ip) => Some(ip),
                            _ => None,
                        })
                        .next()
                        .map(Destination::Ip)
                        .ok_or_else(|| {
                            Error::UnresolvedHost(io::Error::new(
                                io::ErrorKind::NotFound,
                                format!("no IPv4 address for {}", name),
                            ))
                        }),
                    Err(e) => Err(Error::UnresolvedHost(e)),
                })
                .into_box()
        }
    }
}

/// Keeps a cancellation reported by the upstream dialer recognisable, both
/// from plain dialers and from proxy dialers that tag their errors.
fn proxy_connect_error(err: io::Error) -> Error {
    let cancelled = match err.get_ref().and_then(|e| e.downcast_ref::<Error>()) {
        Some(&Error::Cancelled(reason)) => Some(reason),
        _ => match OpError::from_io(&err) {
            Some(&OpError {
                source: Error::Cancelled(reason),
                ..
            }) => Some(reason),
            _ => None,
        },
    };
    match cancelled {
        Some(reason) => Error::Cancelled(reason),
        None => Error::ProxyConnectFailure(err),
    }
}

impl Dial for Socks4Dialer {
    fn dial(&self, handle: &Handle, network: &str, address: &str) -> DialFuture {
        self.dial_context(&Context::background(handle), network, address)
    }

    fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> DialFuture {
        self.connect(Some(ctx), network, address)
            .map(|conn| Box::new(conn) as Box<Transport>)
            .map_err(io::Error::from)
            .into_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancelReason;
    use crate::error::ErrorKind;
    use std::net::TcpListener;
    use std::thread;
    use tokio_core::reactor::Core;

    fn reject_all() -> Rc<Resolve> {
        struct Nope;
        impl Resolve for Nope {
            fn resolve(
                &self,
                host: &str,
            ) -> Box<Future<Item = Vec<IpAddr>, Error = io::Error>> {
                future::err(io::Error::new(io::ErrorKind::NotFound, host.to_owned())).into_box()
            }
        }
        Rc::new(Nope)
    }

    #[test]
    fn udp_fails_before_any_io() {
        let mut core = Core::new().unwrap();
        let ctx = Context::background(&core.handle());
        // Nothing listens on port 1; reaching it would be a different error.
        let dialer = Socks4Dialer::new("tcp", "127.0.0.1:1");
        let err = core
            .run(dialer.connect(Some(&ctx), "udp", "1.2.3.4:53"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedNetwork);
        assert_eq!(err.network, "udp");
    }

    #[test]
    fn missing_context_is_rejected() {
        let mut core = Core::new().unwrap();
        let dialer = Socks4Dialer::new("tcp", "127.0.0.1:1");
        let err = core
            .run(dialer.connect(None, "tcp", "1.2.3.4:80"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidContext);
        assert_eq!(err.proxy, "127.0.0.1:1");
        assert_eq!(err.target, "1.2.3.4:80");
    }

    #[test]
    fn bad_port_touches_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let proxy = listener.local_addr().unwrap().to_string();

        let mut core = Core::new().unwrap();
        let ctx = Context::background(&core.handle());
        let dialer = Socks4Dialer::new("tcp", &proxy);
        for address in &["example.com:0", "example.com:70000", "example.com:ssh"] {
            let err = core
                .run(dialer.connect(Some(&ctx), "tcp", address))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        }
        assert_eq!(
            listener.accept().unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[test]
    fn ipv6_target_is_invalid() {
        let mut core = Core::new().unwrap();
        let ctx = Context::background(&core.handle());
        let dialer = Socks4Dialer::new("tcp", "127.0.0.1:1").support_dns(true);
        let err = core
            .run(dialer.connect(Some(&ctx), "tcp", "[::1]:80"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
    }

    #[test]
    fn unreachable_proxy_is_a_connect_failure() {
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let proxy = format!("127.0.0.1:{}", port);

        let mut core = Core::new().unwrap();
        let ctx = Context::background(&core.handle());
        let dialer = Socks4Dialer::new("tcp", &proxy).resolver(reject_all());
        let err = core
            .run(dialer.connect(Some(&ctx), "tcp", "10.0.0.1:80"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProxyConnectFailure);
        assert_eq!(err.proxy, proxy);
        assert_eq!(err.target, "10.0.0.1:80");
    }

    #[test]
    fn literal_ip_ignores_passthrough() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let proxy = listener.local_addr().unwrap().to_string();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 12];
            sock.read_exact(&mut buf).unwrap();
            sock.write_all(&[0, 0x5a, 0, 0, 0, 0, 0, 0]).unwrap();
            buf
        });

        let mut core = Core::new().unwrap();
        let ctx = Context::background(&core.handle());
        let dialer = Socks4Dialer::new("tcp", &proxy)
            .user("me!")
            .support_dns(true)
            .resolver(reject_all());
        let conn = core
            .run(dialer.connect(Some(&ctx), "tcp", "93.184.216.34:443"))
            .unwrap();
        assert_eq!(conn.bound_addr(), BoundAddr::new(Ipv4Addr::new(0, 0, 0, 0), 0));

        let sent = server.join().unwrap();
        assert_eq!(
            sent,
            [0x04, 0x01, 0x01, 0xbb, 93, 184, 216, 34, b'm', b'e', b'!', 0]
        );
    }

    #[test]
    fn nul_in_host_name_touches_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let proxy = listener.local_addr().unwrap().to_string();

        let mut core = Core::new().unwrap();
        let ctx = Context::background(&core.handle());
        let dialer = Socks4Dialer::new("tcp", &proxy).support_dns(true);
        let err = core
            .run(dialer.connect(Some(&ctx), "tcp", "evil.com\0good.com:80"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        assert_eq!(
            listener.accept().unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[test]
    fn nul_in_user_id_touches_nothing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let proxy = listener.local_addr().unwrap().to_string();

        let mut core = Core::new().unwrap();
        let ctx = Context::background(&core.handle());
        let dialer = Socks4Dialer::new("tcp", &proxy).user("root\0evil");
        let err = core
            .run(dialer.connect(Some(&ctx), "tcp", "10.0.0.1:80"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        assert_eq!(
            listener.accept().unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[test]
    fn upstream_cancellation_stays_cancelled() {
        let upstream: io::Error = OpError::connect(
            "tcp",
            "127.0.0.1:1080",
            "10.9.9.9:1080",
            Error::Cancelled(CancelReason::DeadlineExceeded),
        )
        .into();
        match proxy_connect_error(upstream) {
            Error::Cancelled(reason) => assert_eq!(reason, CancelReason::DeadlineExceeded),
            other => panic!("unexpected error: {}", other),
        }

        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(
            proxy_connect_error(refused).kind(),
            ErrorKind::ProxyConnectFailure
        );
    }

    #[test]
    fn bound_addr_display() {
        let bound = BoundAddr::new(Ipv4Addr::new(127, 0, 0, 1), 80);
        assert_eq!(bound.to_string(), "127.0.0.1:80");
        assert_eq!(bound.network(), "socks");
    }
}
