use std::io;
use std::net::{IpAddr, SocketAddr};
use std::rc::Rc;

use futures::{future, Future};
use tokio_core::net::TcpStream;
use tokio_core::reactor::Handle;

use crate::addr::{Host, Target};
use crate::redirect::{check_network, Dial, DialFuture, Transport};
use crate::resolve::{default_resolver, Resolve};
use crate::socks_helpers::FutureExt;

/// Plain TCP, no proxy in between.
#[derive(Clone)]
pub struct Direct {
    resolver: Rc<Resolve>,
}

impl Direct {
    pub fn new() -> Direct {
        Direct::with_resolver(default_resolver())
    }

    pub fn with_resolver(resolver: Rc<Resolve>) -> Direct {
        Direct { resolver }
    }
}

impl Default for Direct {
    fn default() -> Direct {
        Direct::new()
    }
}

fn network_accepts(network: &str, ip: &IpAddr) -> bool {
    match network {
        "tcp4" => ip.is_ipv4(),
        "tcp6" => ip.is_ipv6(),
        _ => true,
    }
}

impl Dial for Direct {
    fn dial(&self, handle: &Handle, network: &str, address: &str) -> DialFuture {
        if let Err(e) = check_network(network) {
            return future::err(e.into_io()).into_box();
        }
        let target = match Target::parse(address) {
            Ok(target) => target,
            Err(e) => return future::err(e.into_io()).into_box(),
        };

        let port = target.port;
        let network = network.to_owned();
        let addr = match target.host {
            Host::V4(ip) => {
                future::ok::<_, io::Error>(SocketAddr::new(IpAddr::V4(ip), port)).into_box()
            }
            Host::V6(ip) => {
                future::ok::<_, io::Error>(SocketAddr::new(IpAddr::V6(ip), port)).into_box()
            }
            Host::Name(name) => self
                .resolver
                .resolve(&name)
                .and_then(move |addrs| {
                    match addrs.into_iter().find(|ip| network_accepts(&network, ip)) {
                        Some(ip) => Ok(SocketAddr::new(ip, port)),
                        None => tokio_err!(format!("Cannot resolve {} for {}", name, network)),
                    }
                })
                .into_box(),
        };

        let handle = handle.clone();
        addr.and_then(move |addr| {
            debug!("Connecting {}", addr);
            TcpStream::connect(&addr, &handle)
        })
        .map(|conn| Box::new(conn) as Box<Transport>)
        .into_box()
    }
}
