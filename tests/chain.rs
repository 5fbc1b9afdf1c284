mod common;

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpStream as StdStream};
use std::rc::Rc;

use futures::Future;
use tokio_core::reactor::Core;
use tokio_io::io::write_all;

use proxydial::redirect::HttpConnect;
use proxydial::socks4::codec::Destination;
use proxydial::{Context, Dial, Direct, Registry, Socks4Dialer};

use common::*;

fn read_http_head(sock: &mut StdStream) -> String {
    let mut head = Vec::new();
    while !head.ends_with(b"\r\n\r\n") {
        let mut byte = [0u8];
        sock.read_exact(&mut byte).unwrap();
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

#[test]
fn socks4_behind_an_http_tunnel() {
    let (proxy, server) = fake_proxy(|mut sock| {
        let head = read_http_head(&mut sock);
        sock.write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .unwrap();
        let request = parse_request(&read_request(&mut sock));
        grant(&mut sock, bound(198, 51, 100, 4, 5555));
        (head, request)
    });

    let mut core = Core::new().unwrap();
    let ctx = Context::background(&core.handle());
    let tunnel = HttpConnect::new("tcp", &proxy, false, Rc::new(Direct::new()));
    let dialer = Socks4Dialer::new("tcp", "10.7.7.7:1080").proxy_dial(Rc::new(tunnel));
    let conn = core
        .run(dialer.connect(Some(&ctx), "tcp", "10.2.2.2:25"))
        .unwrap();
    assert_eq!(conn.bound_addr(), bound(198, 51, 100, 4, 5555));

    let (head, request) = server.join().unwrap();
    assert!(head.starts_with("CONNECT 10.7.7.7:1080 HTTP/1.1\r\n"));
    assert_eq!(request.dst, Destination::Ip(Ipv4Addr::new(10, 2, 2, 2)));
    assert_eq!(request.port, 25);
}

#[test]
fn registry_chains_socks4_through_an_upstream_proxy() {
    let (proxy, server) = fake_proxy(|mut sock| {
        let outer = parse_request(&read_request(&mut sock));
        grant(&mut sock, bound(0, 0, 0, 0, 0));
        let inner = parse_request(&read_request(&mut sock));
        grant(&mut sock, bound(0, 0, 0, 0, 0));
        (outer, inner)
    });

    let mut core = Core::new().unwrap();
    let ctx = Context::background(&core.handle());
    let registry = Registry::default();
    let first = registry
        .resolve(&format!("socks4://{}", proxy), None)
        .unwrap();
    let second = registry
        .resolve("socks4a://10.8.8.8", Some(Rc::new(first)))
        .unwrap();
    core.run(second.dial_context(&ctx, "tcp", "db.internal:5432"))
        .unwrap();

    let (outer, inner) = server.join().unwrap();
    assert_eq!(outer.dst, Destination::Ip(Ipv4Addr::new(10, 8, 8, 8)));
    assert_eq!(outer.port, 1080);
    assert_eq!(inner.dst, Destination::Domain("db.internal".into()));
    assert_eq!(inner.port, 5432);
}

#[test]
fn socks5h_sends_the_hostname() {
    let (proxy, server) = fake_proxy(|mut sock| {
        let mut greeting = [0u8; 3];
        sock.read_exact(&mut greeting).unwrap();
        sock.write_all(&[0x05, 0x00]).unwrap();

        let mut head = [0u8; 5];
        sock.read_exact(&mut head).unwrap();
        let mut rest = vec![0u8; head[4] as usize + 2];
        sock.read_exact(&mut rest).unwrap();

        sock.write_all(&[0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0x1f, 0x90])
            .unwrap();
        (greeting, head, rest)
    });

    let mut core = Core::new().unwrap();
    let ctx = Context::background(&core.handle());
    let dialer = Registry::default()
        .resolve(&format!("socks5h://{}", proxy), None)
        .unwrap();
    core.run(dialer.dial_context(&ctx, "tcp", "example.net:8443"))
        .unwrap();

    let (greeting, head, rest) = server.join().unwrap();
    assert_eq!(greeting, [0x05, 0x01, 0x00]);
    assert_eq!(head, [0x05, 0x01, 0x00, 0x03, 11]);
    let mut expected = b"example.net".to_vec();
    expected.extend(&[0x20, 0xfb]);
    assert_eq!(rest, expected);
}

#[test]
fn direct_scheme_connects_straight_through() {
    let (addr, server) = fake_proxy(|mut sock| {
        let mut hello = [0u8; 5];
        sock.read_exact(&mut hello).unwrap();
        hello
    });

    let mut core = Core::new().unwrap();
    let ctx = Context::background(&core.handle());
    let dialer = Registry::default().resolve("direct://", None).unwrap();
    let work = dialer
        .dial_context(&ctx, "tcp", &addr)
        .and_then(|conn| write_all(conn, b"hello"));
    core.run(work).unwrap();

    assert_eq!(&server.join().unwrap(), b"hello");
}
