//! Resolving a proxy from its URI.
//!
//! The scheme picks a constructor from a [`Registry`]; the constructor turns
//! the rest of the URI into a dialer. Registries are plain values, so callers
//! that want extra schemes build their own instead of mutating shared state.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use percent_encoding::percent_decode_str;
use tokio_core::reactor::Handle;
use url::Url;

use crate::addr::with_default_port;
use crate::constants::{http, socks4, socks5};
use crate::context::Context;
use crate::error::Error;
use crate::redirect::{Dial, DialFuture, Direct, HttpConnect, Socks5};
use crate::resolve::{default_resolver, Resolve};
use crate::socks4::Socks4Dialer;

/// Builds a dialer from a parsed proxy URI and an optional upstream dialer
/// used to reach the proxy itself.
pub type Constructor = fn(&Url, Option<Rc<Dial>>, &Rc<Resolve>) -> Result<Rc<Dial>, Error>;

/// A proxy resolved from a URI, usable anywhere a [`Dial`] is.
#[derive(Clone)]
pub struct Proxy {
    url: Url,
    dialer: Rc<Dial>,
}

impl Proxy {
    pub fn new(url: Url, dialer: Rc<Dial>) -> Proxy {
        Proxy { url, dialer }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn dialer(&self) -> Rc<Dial> {
        self.dialer.clone()
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Proxy").field("url", &self.url.as_str()).finish()
    }
}

impl Dial for Proxy {
    fn dial(&self, handle: &Handle, network: &str, address: &str) -> DialFuture {
        self.dialer.dial(handle, network, address)
    }

    fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> DialFuture {
        self.dialer.dial_context(ctx, network, address)
    }
}

pub struct Registry {
    constructors: HashMap<String, Constructor>,
    resolver: Rc<Resolve>,
}

impl Registry {
    /// A registry with no schemes at all.
    pub fn empty(resolver: Rc<Resolve>) -> Registry {
        Registry {
            constructors: HashMap::new(),
            resolver,
        }
    }

    /// A registry knowing every built-in scheme, sharing `resolver` between
    /// the dialers it builds.
    pub fn with_resolver(resolver: Rc<Resolve>) -> Registry {
        let mut registry = Registry::empty(resolver);
        registry.register("direct", direct_dialer);
        registry.register("http", http_dialer);
        registry.register("https", http_dialer);
        registry.register("socks4", socks4_dialer);
        registry.register("socks4a", socks4_dialer);
        registry.register("socks5", socks5_dialer);
        registry.register("socks5h", socks5_dialer);
        registry
    }

    /// Adds `scheme`, replacing any constructor it had.
    pub fn register(&mut self, scheme: &str, constructor: Constructor) {
        self.constructors.insert(scheme.to_ascii_lowercase(), constructor);
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.constructors.keys().map(|s| s.as_str()).collect();
        schemes.sort();
        schemes
    }

    pub fn resolve(&self, uri: &str, upstream: Option<Rc<Dial>>) -> Result<Proxy, Error> {
        let url = Url::parse(uri)?;
        self.resolve_url(url, upstream)
    }

    pub fn resolve_url(&self, url: Url, upstream: Option<Rc<Dial>>) -> Result<Proxy, Error> {
        let constructor = match self.constructors.get(url.scheme()) {
            Some(constructor) => constructor,
            None => return Err(Error::UnknownScheme(url.scheme().to_owned())),
        };
        let dialer = constructor(&url, upstream, &self.resolver)?;
        debug!("Resolved proxy {}", url);
        Ok(Proxy::new(url, dialer))
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::with_resolver(default_resolver())
    }
}

fn proxy_address(url: &Url, default_port: u16) -> Result<String, Error> {
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(with_default_port(host, url.port(), default_port)),
        _ => Err(Error::InvalidParams(format!("{}: missing proxy host", url))),
    }
}

fn require_scheme(url: &Url, schemes: &[&str]) -> Result<(), Error> {
    if schemes.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(Error::InvalidParams(format!("{}: expected one of {:?}", url, schemes)))
    }
}

/// The SOCKS4 user id carried by the URI, percent-decoded.
fn user_id(url: &Url) -> Result<String, Error> {
    let user = percent_decode_str(url.username())
        .decode_utf8()
        .map_err(|e| Error::InvalidParams(format!("{}: user id is not UTF-8: {}", url, e)))?;
    if user.contains('\0') {
        return Err(Error::InvalidParams(format!(
            "{}: user id contains a NUL byte",
            url
        )));
    }
    Ok(user.into_owned())
}

fn direct_dialer(
    _: &Url,
    _: Option<Rc<Dial>>,
    resolver: &Rc<Resolve>,
) -> Result<Rc<Dial>, Error> {
    Ok(Rc::new(Direct::with_resolver(resolver.clone())))
}

fn socks4_dialer(
    url: &Url,
    upstream: Option<Rc<Dial>>,
    resolver: &Rc<Resolve>,
) -> Result<Rc<Dial>, Error> {
    require_scheme(url, &["socks4", "socks4a"])?;
    let address = proxy_address(url, socks4::DEFAULT_PORT)?;
    let user = user_id(url)?;
    let mut dialer = Socks4Dialer::new("tcp", &address)
        .user(&user)
        .support_dns(url.scheme() == "socks4a")
        .resolver(resolver.clone());
    if let Some(upstream) = upstream {
        dialer = dialer.proxy_dial(upstream);
    }
    Ok(Rc::new(dialer))
}

fn socks5_dialer(
    url: &Url,
    upstream: Option<Rc<Dial>>,
    resolver: &Rc<Resolve>,
) -> Result<Rc<Dial>, Error> {
    require_scheme(url, &["socks5", "socks5h"])?;
    let address = proxy_address(url, socks5::DEFAULT_PORT)?;
    Ok(Rc::new(Socks5::new(
        "tcp",
        &address,
        url.scheme() == "socks5h",
        upstream,
        resolver.clone(),
    )))
}

fn http_dialer(
    url: &Url,
    upstream: Option<Rc<Dial>>,
    resolver: &Rc<Resolve>,
) -> Result<Rc<Dial>, Error> {
    require_scheme(url, &["http", "https"])?;
    let tls = url.scheme() == "https";
    let default_port = if tls {
        http::DEFAULT_TLS_PORT
    } else {
        http::DEFAULT_PORT
    };
    let address = proxy_address(url, default_port)?;
    let upstream = upstream
        .unwrap_or_else(|| Rc::new(Direct::with_resolver(resolver.clone())) as Rc<Dial>);
    Ok(Rc::new(HttpConnect::new("tcp", &address, tls, upstream)))
}
