//! Validation of `host:port` dial targets.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
    Name(String),
}

impl Host {
    /// Classifies a bare host (no port, no brackets).
    pub fn classify(host: &str) -> Host {
        match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => Host::V4(ip),
            Ok(IpAddr::V6(ip)) => Host::V6(ip),
            Err(_) => Host::Name(host.to_owned()),
        }
    }

    pub fn is_literal(&self) -> bool {
        match *self {
            Host::Name(_) => false,
            _ => true,
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Host::V4(ref ip) => write!(f, "{}", ip),
            Host::V6(ref ip) => write!(f, "[{}]", ip),
            Host::Name(ref name) => f.write_str(name),
        }
    }
}

/// A destination with a port in `1..=65535`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: Host,
    pub port: u16,
}

impl Target {
    pub fn parse(address: &str) -> Result<Target, Error> {
        let (host, port) = split_host_port(address)?;
        Ok(Target {
            host: Host::classify(host),
            port,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Splits `host:port` or `[v6]:port`, requiring a numeric port in range.
pub fn split_host_port(address: &str) -> Result<(&str, u16), Error> {
    let invalid = |why: &str| Error::InvalidAddress(format!("{}: {}", address, why));

    let (host, port) = if address.starts_with('[') {
        let end = address.find(']').ok_or_else(|| invalid("missing ']'"))?;
        let rest = &address[end + 1..];
        if !rest.starts_with(':') {
            return Err(invalid("missing port"));
        }
        (&address[1..end], &rest[1..])
    } else {
        let colon = address.rfind(':').ok_or_else(|| invalid("missing port"))?;
        let host = &address[..colon];
        if host.contains(':') {
            return Err(invalid("too many colons"));
        }
        (host, &address[colon + 1..])
    };

    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("port is not a number"));
    }
    match port.parse::<u32>() {
        Ok(n) if n >= 1 && n <= 0xffff => Ok((host, n as u16)),
        _ => Err(invalid(&format!("port number out of range {}", port))),
    }
}

/// Appends `:port` to an authority that lacks one.
pub fn with_default_port(host: &str, port: Option<u16>, default: u16) -> String {
    let port = port.unwrap_or(default);
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
