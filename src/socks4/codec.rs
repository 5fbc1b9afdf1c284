//! SOCKS4/4a CONNECT frames.
//!
//! ```text
//! Request: 0x04 0x01 <port:2 BE> <ip4:4> <userid> 0x00 [<hostname> 0x00]
//! Reply:   0x00 <status:1> <port:2 BE> <ip4:4>
//! ```

use std::net::Ipv4Addr;

use num::FromPrimitive;

use super::BoundAddr;
use crate::constants::socks4::*;
use crate::error::Error;

/// Where the proxy should connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Ip(Ipv4Addr),
    /// Resolved by the proxy (SOCKS4a).
    Domain(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub port: u16,
    pub dst: Destination,
    pub user_id: String,
}

impl Request {
    pub fn encode(&self) -> Vec<u8> {
        let mut msg = match self.dst {
            Destination::Ip(_) => Vec::with_capacity(9 + self.user_id.len()),
            Destination::Domain(ref name) => {
                Vec::with_capacity(10 + self.user_id.len() + name.len())
            }
        };
        msg.push(SOCKS4_VERSION);
        msg.push(CONNECT_CMD);
        msg.push((self.port >> 8) as u8);
        msg.push(self.port as u8);
        match self.dst {
            Destination::Ip(ref ip) => msg.extend(&ip.octets()),
            Destination::Domain(_) => msg.extend(&PASSTHROUGH_IP),
        }
        msg.extend(self.user_id.as_bytes());
        msg.push(0);
        if let Destination::Domain(ref name) = self.dst {
            msg.extend(name.as_bytes());
            msg.push(0);
        }
        msg
    }

    /// Reads back a complete CONNECT frame. Used to inspect what a client
    /// sent; trailing bytes after the frame are rejected.
    pub fn parse(buf: &[u8]) -> Option<Request> {
        if buf.len() < 9 || buf[0] != SOCKS4_VERSION || buf[1] != CONNECT_CMD {
            return None;
        }
        let port = ((buf[2] as u16) << 8) | buf[3] as u16;
        let ip = [buf[4], buf[5], buf[6], buf[7]];

        let rest = &buf[8..];
        let user_end = rest.iter().position(|&b| b == 0)?;
        let user_id = String::from_utf8(rest[..user_end].to_vec()).ok()?;
        let rest = &rest[user_end + 1..];

        // 0.0.0.x with x != 0 announces a trailing hostname
        let dst = if ip[..3] == [0, 0, 0] && ip[3] != 0 {
            let name_end = rest.iter().position(|&b| b == 0)?;
            if name_end + 1 != rest.len() {
                return None;
            }
            Destination::Domain(String::from_utf8(rest[..name_end].to_vec()).ok()?)
        } else {
            if !rest.is_empty() {
                return None;
            }
            Destination::Ip(Ipv4Addr::from(ip))
        };

        Some(Request { port, dst, user_id })
    }
}

/// Decodes the 8-byte reply into the proxy's bound address, or the
/// rejection it carries.
pub fn decode_reply(buf: &[u8; REPLY_LEN]) -> Result<BoundAddr, Error> {
    if buf[0] != 0 {
        debug!("SOCKS4 reply version byte is {}, expected 0", buf[0]);
    }
    match FromPrimitive::from_u8(buf[1]) {
        Some(Status::Granted) => {}
        Some(Status::IdentdRequired) | Some(Status::IdentdFailed) => {
            return Err(Error::IdentdRequired(buf[1]))
        }
        Some(Status::Rejected) | None => return Err(Error::ConnectionRejected(buf[1])),
    }
    let port = ((buf[2] as u16) << 8) | buf[3] as u16;
    let ip = Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]);
    Ok(BoundAddr::new(ip, port))
}

/// Builds the reply frame a proxy would send. Handy for fake proxies.
pub fn encode_reply(status: u8, bound: &BoundAddr) -> [u8; REPLY_LEN] {
    let ip = bound.ip().octets();
    let port = bound.port();
    [
        0,
        status,
        (port >> 8) as u8,
        port as u8,
        ip[0],
        ip[1],
        ip[2],
        ip[3],
    ]
}
