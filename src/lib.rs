#[macro_use]
extern crate futures;
extern crate num;
extern crate num_cpus;
#[macro_use]
extern crate num_derive;
extern crate percent_encoding;
#[macro_use]
extern crate slog;
extern crate slog_async;
#[macro_use]
extern crate slog_scope;
extern crate slog_term;
extern crate tokio_core;
extern crate tokio_dns;
extern crate tokio_io;
extern crate url;

#[macro_use]
mod socks_helpers;
mod constants;

pub mod addr;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod redirect;
pub mod registry;
pub mod resolve;
pub mod socks4;

pub use crate::addr::{Host, Target};
pub use crate::context::{CancelReason, Canceller, Context};
pub use crate::error::{Error, OpError};
pub use crate::redirect::{Dial, DialFuture, Direct, Transport};
pub use crate::registry::{Proxy, Registry};
pub use crate::resolve::Resolve;
pub use crate::socks4::{BoundAddr, Socks4Conn, Socks4Dialer};
pub use crate::socks_helpers::FutureExt;
