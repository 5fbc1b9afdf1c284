use std::io;
use std::rc::Rc;

use futures::{future, Async, Future, Poll};
use tokio_core::reactor::Handle;
use tokio_io::io::write_all;
use tokio_io::AsyncRead;

use crate::addr::Target;
use crate::constants::http::MAX_RESPONSE_HEAD;
use crate::context::Context;
use crate::redirect::{check_network, flatten_io, Dial, DialFuture, Transport};
use crate::socks_helpers::FutureExt;

/// HTTP/1.1 `CONNECT` tunnel through a web proxy.
pub struct HttpConnect {
    proxy_network: String,
    proxy_addr: String,
    tls: bool,
    forward: Rc<Dial>,
}

impl HttpConnect {
    pub fn new(
        proxy_network: &str,
        proxy_addr: &str,
        tls: bool,
        forward: Rc<Dial>,
    ) -> HttpConnect {
        HttpConnect {
            proxy_network: proxy_network.to_owned(),
            proxy_addr: proxy_addr.to_owned(),
            tls,
            forward,
        }
    }
}

fn connect_request(target: &Target) -> Vec<u8> {
    format!("CONNECT {0} HTTP/1.1\r\nHost: {0}\r\n\r\n", target).into_bytes()
}

/// Reads the proxy's response head one byte at a time so nothing that
/// belongs to the tunnel is consumed.
struct ResponseHead {
    conn: Option<Box<Transport>>,
    buf: Vec<u8>,
}

impl Future for ResponseHead {
    type Item = Box<Transport>;
    type Error = io::Error;

    fn poll(&mut self) -> Poll<Box<Transport>, io::Error> {
        loop {
            let mut byte = [0u8];
            let n = match self.conn {
                Some(ref mut conn) => try_ready!(conn.poll_read(&mut byte)),
                None => panic!("poll a ResponseHead after it's done"),
            };
            if n == 0 {
                return tokio_err!("unexpected eof while tunneling");
            }
            self.buf.push(byte[0]);
            if self.buf.ends_with(b"\r\n\r\n") {
                check_status_line(&self.buf)?;
                return match self.conn.take() {
                    Some(conn) => Ok(Async::Ready(conn)),
                    None => tokio_err!("tunnel already established"),
                };
            }
            if self.buf.len() >= MAX_RESPONSE_HEAD {
                return tokio_err!("proxy response head too large");
            }
        }
    }
}

fn check_status_line(head: &[u8]) -> io::Result<()> {
    let line_end = head.iter().position(|&b| b == b'\r').unwrap_or(head.len());
    let line = String::from_utf8_lossy(&head[..line_end]);
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    let status = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") {
        return tokio_err!(format!("malformed proxy response: {}", line));
    }
    if status != "200" {
        return tokio_err!(format!("unsuccessful tunnel: {}", line));
    }
    Ok(())
}

impl Dial for HttpConnect {
    fn dial(&self, handle: &Handle, network: &str, address: &str) -> DialFuture {
        self.dial_context(&Context::background(handle), network, address)
    }

    fn dial_context(&self, ctx: &Context, network: &str, address: &str) -> DialFuture {
        if let Err(e) = check_network(network) {
            return future::err(e.into_io()).into_box();
        }
        if self.tls {
            return future::err(io::Error::new(
                io::ErrorKind::Other,
                "TLS connections to the proxy are not supported",
            ))
            .into_box();
        }
        let target = match Target::parse(address) {
            Ok(target) => target,
            Err(e) => return future::err(e.into_io()).into_box(),
        };

        let request = connect_request(&target);
        let work = self
            .forward
            .dial_context(ctx, &self.proxy_network, &self.proxy_addr)
            .and_then(move |conn| write_all(conn, request))
            .and_then(|(conn, _)| {
                debug!("Waiting for CONNECT response");
                ResponseHead {
                    conn: Some(conn),
                    buf: Vec::with_capacity(128),
                }
            });

        ctx.bound(work).map_err(flatten_io).into_box()
    }
}
