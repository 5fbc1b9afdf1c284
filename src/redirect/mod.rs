//! Outbound dialers.
//!
//! Everything that can produce a connection implements [`Dial`], so dialers
//! nest: a SOCKS4 dialer can reach its proxy through an HTTP tunnel, which in
//! turn reaches its proxy directly.

use std::io;

use futures::Future;
use tokio_core::reactor::Handle;
use tokio_io::{AsyncRead, AsyncWrite};

use crate::context::Context;
use crate::error::Error;
use crate::socks_helpers::FutureExt;

mod direct;
pub use self::direct::Direct;

mod socks5;
pub use self::socks5::Socks5;

mod http;
pub use self::http::HttpConnect;

/// A byte stream a dialer can hand out.
pub trait Transport: AsyncRead + AsyncWrite {}

impl<T: AsyncRead + AsyncWrite> Transport for T {}

pub type DialFuture = Box<Future<Item = Box<Transport>, Error = io::Error>>;

pub trait Dial {
    /// Connects without any way to give up early.
    fn dial(&self, handle: &Handle, network: &str, address: &str) -> DialFuture;

    /// Connects, giving up when `ctx` stops.
    ///
    /// The provided implementation races [`Dial::dial`] against the context.
    /// The losing dial is dropped, so a connection that would have completed
    /// after cancellation is closed rather than leaked.
    fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> DialFuture {
        ctx.bound(self.dial(ctx.handle(), network, address))
            .map_err(flatten_io)
            .into_box()
    }
}

/// Unwraps a plain I/O failure, or carries a classified one inside an
/// `io::Error`.
pub fn flatten_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => other.into_io(),
    }
}

/// Accepts the TCP network names and nothing else.
pub fn check_network(network: &str) -> Result<(), Error> {
    match network {
        "tcp" | "tcp4" | "tcp6" => Ok(()),
        _ => Err(Error::UnsupportedNetwork(network.to_owned())),
    }
}
