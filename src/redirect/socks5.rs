use std::io;
use std::net::{IpAddr, SocketAddr};
use std::rc::Rc;

use futures::{future, Future};
use num::FromPrimitive;
use tokio_core::reactor::Handle;
use tokio_io::io::{read_exact, write_all};

use crate::addr::{Host, Target};
use crate::constants::socks5::*;
use crate::context::Context;
use crate::redirect::{check_network, flatten_io, Dial, DialFuture, Direct, Transport};
use crate::resolve::Resolve;
use crate::socks_helpers::FutureExt;

/// SOCKS5 CONNECT client, no authentication.
///
/// With `remote_dns` set (`socks5h`) hostnames are sent to the proxy as-is;
/// otherwise they are resolved locally first.
pub struct Socks5 {
    proxy_network: String,
    proxy_addr: String,
    remote_dns: bool,
    forward: Rc<Dial>,
    resolver: Rc<Resolve>,
}

enum Dst {
    Ip(SocketAddr),
    Domain(String, u16),
}

impl Socks5 {
    pub fn new(
        proxy_network: &str,
        proxy_addr: &str,
        remote_dns: bool,
        forward: Option<Rc<Dial>>,
        resolver: Rc<Resolve>,
    ) -> Socks5 {
        let forward = forward
            .unwrap_or_else(|| Rc::new(Direct::with_resolver(resolver.clone())) as Rc<Dial>);
        Socks5 {
            proxy_network: proxy_network.to_owned(),
            proxy_addr: proxy_addr.to_owned(),
            remote_dns,
            forward,
            resolver,
        }
    }

    fn destination(&self, target: Target) -> Box<Future<Item = Dst, Error = io::Error>> {
        let port = target.port;
        match target.host {
            Host::V4(ip) => {
                future::ok::<_, io::Error>(Dst::Ip(SocketAddr::new(IpAddr::V4(ip), port)))
                    .into_box()
            }
            Host::V6(ip) => {
                future::ok::<_, io::Error>(Dst::Ip(SocketAddr::new(IpAddr::V6(ip), port)))
                    .into_box()
            }
            Host::Name(name) => {
                if self.remote_dns {
                    if name.len() > 255 {
                        return future::err(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "Domain name too long",
                        ))
                        .into_box();
                    }
                    return future::ok(Dst::Domain(name, port)).into_box();
                }
                self.resolver
                    .resolve(&name)
                    .and_then(move |mut addrs| match addrs.pop() {
                        Some(ip) => Ok(Dst::Ip(SocketAddr::new(ip, port))),
                        None => tokio_err!("Cannot resolve domain name"),
                    })
                    .into_box()
            }
        }
    }
}

fn handshake(
    conn: Box<Transport>,
    dst: Dst,
) -> Box<Future<Item = Box<Transport>, Error = io::Error>> {
    let auth_ok = write_all(conn, [SOCKS5_VERSION, 1, NO_AUTHENTICATION_REQUIRED])
        .and_then(|(conn, _)| read_exact(conn, [0u8; 2]))
        .and_then(|(conn, buf)| {
            check_socks_version!(buf[0], SOCKS5_VERSION);
            // We do not support authentication
            if buf[1] != NO_AUTHENTICATION_REQUIRED {
                return tokio_err!("No acceptable authentication methods");
            }
            Ok(conn)
        });

    let req = auth_ok.and_then(move |conn| {
        let mut msg = vec![SOCKS5_VERSION, CONNECT_CMD, RESERVED_CODE];
        let port = match dst {
            Dst::Ip(SocketAddr::V4(addr)) => {
                msg.push(AYTP::IPv4 as u8);
                msg.extend(&addr.ip().octets());
                addr.port()
            }
            Dst::Ip(SocketAddr::V6(addr)) => {
                msg.push(AYTP::IPv6 as u8);
                msg.extend(&addr.ip().octets());
                addr.port()
            }
            Dst::Domain(ref name, port) => {
                msg.push(AYTP::DomainName as u8);
                msg.push(name.len() as u8);
                msg.extend(name.as_bytes());
                port
            }
        };
        msg.push((port >> 8) as u8);
        msg.push(port as u8);
        write_all(conn, msg).map(|(conn, _)| conn)
    });

    // The bound address is read and discarded
    let ack = req.and_then(|conn| {
        read_exact(conn, [0u8; 4])
            .and_then(|(conn, buf)| {
                check_socks_version!(buf[0], SOCKS5_VERSION);
                if buf[1] != SUCCEEDED_REPLY {
                    return tokio_err!(format!("Request not succeeded: {}", buf[1]));
                }
                if buf[2] != RESERVED_CODE {
                    return tokio_err!(format!("Expect reserved code, but {}", buf[2]));
                }
                match FromPrimitive::from_u8(buf[3]) {
                    Some(aytp) => Ok((conn, aytp)),
                    None => tokio_err!("Unknown AYTP"),
                }
            })
            .and_then(|(conn, aytp)| match aytp {
                AYTP::IPv4 => read_exact(conn, [0u8; 6]).map(|(conn, _)| conn).into_box(),
                AYTP::IPv6 => read_exact(conn, [0u8; 18]).map(|(conn, _)| conn).into_box(),
                AYTP::DomainName => read_exact(conn, [0u8])
                    .map(|(conn, buf)| (conn, buf[0]))
                    .and_then(|(conn, domain_len)| {
                        read_exact(conn, vec![0u8; (domain_len as usize) + 2])
                            .map(|(conn, _)| conn)
                    })
                    .into_box(),
            })
    });

    ack.into_box()
}

impl Dial for Socks5 {
    fn dial(&self, handle: &Handle, network: &str, address: &str) -> DialFuture {
        self.dial_context(&Context::background(handle), network, address)
    }

    fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> DialFuture {
        if let Err(e) = check_network(network) {
            return future::err(e.into_io()).into_box();
        }
        let target = match Target::parse(address) {
            Ok(target) => target,
            Err(e) => return future::err(e.into_io()).into_box(),
        };

        let connect = self
            .forward
            .dial_context(ctx, &self.proxy_network, &self.proxy_addr);
        let work = self
            .destination(target)
            .join(connect)
            .and_then(|(dst, conn)| handshake(conn, dst));

        ctx.bound(work).map_err(flatten_io).into_box()
    }
}
