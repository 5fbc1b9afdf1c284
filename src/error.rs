//! Errors surfaced by dial operations.
//!
//! Every failed dial is reported as an [`OpError`], which records what was
//! attempted (operation, network kind, proxy endpoint, target) around a
//! classified [`Error`]. Callers that only see an `io::Error` can recover the
//! [`OpError`] through `io::Error::get_ref`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::context::CancelReason;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("unable to find IP address of host: {0}")]
    UnresolvedHost(#[source] io::Error),

    #[error("network not implemented: {0}")]
    UnsupportedNetwork(String),

    #[error("nil context")]
    InvalidContext,

    #[error("unable to reach proxy: {0}")]
    ProxyConnectFailure(#[source] io::Error),

    #[error("socks4 server require valid identd: {0}")]
    IdentdRequired(u8),

    #[error("connection rejected: {0}")]
    ConnectionRejected(u8),

    #[error("{0}")]
    Cancelled(CancelReason),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("unknown proxy URI scheme {0:?}")]
    UnknownScheme(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("invalid proxy URI: {0}")]
    Url(#[from] url::ParseError),

    #[error("{}:{line}: {source}", .path.display())]
    ProxyList {
        path: PathBuf,
        line: usize,
        #[source]
        source: Box<Error>,
    },
}

/// Fieldless mirror of [`Error`] for matching without borrowing the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidAddress,
    UnresolvedHost,
    UnsupportedNetwork,
    InvalidContext,
    ProxyConnectFailure,
    IdentdRequired,
    ConnectionRejected,
    Cancelled,
    Io,
    UnknownScheme,
    InvalidParams,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Error::InvalidAddress(_) => ErrorKind::InvalidAddress,
            Error::UnresolvedHost(_) => ErrorKind::UnresolvedHost,
            Error::UnsupportedNetwork(_) => ErrorKind::UnsupportedNetwork,
            Error::InvalidContext => ErrorKind::InvalidContext,
            Error::ProxyConnectFailure(_) => ErrorKind::ProxyConnectFailure,
            Error::IdentdRequired(_) => ErrorKind::IdentdRequired,
            Error::ConnectionRejected(_) => ErrorKind::ConnectionRejected,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Io(_) => ErrorKind::Io,
            Error::UnknownScheme(_) => ErrorKind::UnknownScheme,
            Error::InvalidParams(_) | Error::Url(_) => ErrorKind::InvalidParams,
            Error::ProxyList { ref source, .. } => source.kind(),
        }
    }

    /// Carries the error inside an `io::Error` without an operation tag.
    pub fn into_io(self) -> io::Error {
        io::Error::new(self.io_kind(), self)
    }

    fn io_kind(&self) -> io::ErrorKind {
        match *self {
            Error::InvalidAddress(_)
            | Error::UnsupportedNetwork(_)
            | Error::InvalidContext
            | Error::UnknownScheme(_)
            | Error::InvalidParams(_)
            | Error::Url(_) => io::ErrorKind::InvalidInput,
            Error::UnresolvedHost(_) => io::ErrorKind::NotFound,
            Error::ProxyConnectFailure(ref e) | Error::Io(ref e) => e.kind(),
            Error::IdentdRequired(_) => io::ErrorKind::PermissionDenied,
            Error::ConnectionRejected(_) => io::ErrorKind::ConnectionRefused,
            Error::Cancelled(CancelReason::DeadlineExceeded) => io::ErrorKind::TimedOut,
            Error::Cancelled(CancelReason::Canceled) => io::ErrorKind::Interrupted,
            Error::ProxyList { ref source, .. } => source.io_kind(),
        }
    }
}

/// A failed dial, tagged with where it was going and through what.
#[derive(Debug, Error)]
#[error("{op} {network} {proxy}->{target}: {source}")]
pub struct OpError {
    pub op: &'static str,
    pub network: String,
    pub proxy: String,
    pub target: String,
    #[source]
    pub source: Error,
}

impl OpError {
    pub fn connect(network: &str, proxy: &str, target: &str, source: Error) -> OpError {
        OpError {
            op: "connect",
            network: network.to_owned(),
            proxy: proxy.to_owned(),
            target: target.to_owned(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Extracts the dial error carried by an `io::Error`, if any.
    pub fn from_io(err: &io::Error) -> Option<&OpError> {
        err.get_ref().and_then(|e| e.downcast_ref::<OpError>())
    }
}

impl From<OpError> for io::Error {
    fn from(err: OpError) -> io::Error {
        io::Error::new(err.source.io_kind(), err)
    }
}
