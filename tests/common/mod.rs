#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, TcpListener, TcpStream};
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use futures::{future, Future};
use proxydial::socks4::codec::{encode_reply, Request};
use proxydial::{BoundAddr, FutureExt, Resolve};

pub const GRANTED: u8 = 0x5a;

/// Runs `serve` on the first connection accepted by a fresh listener.
/// Returns the listener address and the serving thread.
pub fn fake_proxy<F, T>(serve: F) -> (String, JoinHandle<T>)
where
    F: FnOnce(TcpStream) -> T + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = thread::spawn(move || {
        let (sock, _) = listener.accept().unwrap();
        serve(sock)
    });
    (addr, handle)
}

/// Like [`fake_proxy`], serving `n` connections each on its own thread.
pub fn fake_proxies<F, T>(n: usize, serve: F) -> (String, JoinHandle<Vec<T>>)
where
    F: Fn(TcpStream) -> T + Send + Sync + Clone + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = thread::spawn(move || {
        let workers: Vec<_> = (0..n)
            .map(|_| {
                let (sock, _) = listener.accept().unwrap();
                let serve = serve.clone();
                thread::spawn(move || serve(sock))
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    (addr, handle)
}

/// Reads one SOCKS4 CONNECT frame, byte by byte so nothing past it is
/// consumed. Returns the raw bytes.
pub fn read_request(sock: &mut TcpStream) -> Vec<u8> {
    let mut frame = vec![0u8; 8];
    sock.read_exact(&mut frame).unwrap();
    let domain_follows = frame[4..7] == [0, 0, 0] && frame[7] != 0;
    let terminators = if domain_follows { 2 } else { 1 };
    let mut seen = 0;
    while seen < terminators {
        let mut byte = [0u8];
        sock.read_exact(&mut byte).unwrap();
        frame.push(byte[0]);
        if byte[0] == 0 {
            seen += 1;
        }
    }
    frame
}

pub fn parse_request(frame: &[u8]) -> Request {
    Request::parse(frame).unwrap()
}

pub fn reply(sock: &mut TcpStream, status: u8, bound: BoundAddr) {
    sock.write_all(&encode_reply(status, &bound)).unwrap();
}

pub fn grant(sock: &mut TcpStream, bound: BoundAddr) {
    reply(sock, GRANTED, bound);
}

pub fn bound(a: u8, b: u8, c: u8, d: u8, port: u16) -> BoundAddr {
    BoundAddr::new(Ipv4Addr::new(a, b, c, d), port)
}

/// Reads until the peer closes, giving up after a few seconds. Returns the
/// number of bytes received.
pub fn drain_until_eof(sock: &mut TcpStream) -> io::Result<usize> {
    sock.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut buf = Vec::new();
    sock.read_to_end(&mut buf)?;
    Ok(buf.len())
}

/// A resolver answering every query with the same fixed result.
pub struct FixedResolver(pub Result<Vec<IpAddr>, io::ErrorKind>);

impl Resolve for FixedResolver {
    fn resolve(&self, host: &str) -> Box<Future<Item = Vec<IpAddr>, Error = io::Error>> {
        match self.0 {
            Ok(ref addrs) => future::ok::<_, io::Error>(addrs.clone()).into_box(),
            Err(kind) => future::err(io::Error::new(kind, host.to_owned())).into_box(),
        }
    }
}

pub fn resolver(result: Result<Vec<IpAddr>, io::ErrorKind>) -> Rc<Resolve> {
    Rc::new(FixedResolver(result))
}
