use std::io;
use std::net::IpAddr;
use std::rc::Rc;

use futures::Future;
use tokio_dns::{CpuPoolResolver, Resolver};

use crate::socks_helpers::FutureExt;

/// Turns a hostname into addresses.
pub trait Resolve {
    fn resolve(&self, host: &str) -> Box<Future<Item = Vec<IpAddr>, Error = io::Error>>;
}

impl Resolve for CpuPoolResolver {
    fn resolve(&self, host: &str) -> Box<Future<Item = Vec<IpAddr>, Error = io::Error>> {
        debug!("Resolving {}", host);
        Resolver::resolve(self, host).into_box()
    }
}

thread_local! {
    static DEFAULT_RESOLVER: Rc<CpuPoolResolver> = Rc::new(CpuPoolResolver::new(num_cpus::get()));
}

/// The resolver used when none is configured. Its thread pool is created on
/// first use and shared by every caller on the same thread.
pub fn default_resolver() -> Rc<Resolve> {
    DEFAULT_RESOLVER.with(|resolver| resolver.clone() as Rc<Resolve>)
}
