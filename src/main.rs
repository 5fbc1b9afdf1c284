extern crate clap;
extern crate futures;
extern crate proxydial;
#[macro_use]
extern crate slog;
#[macro_use]
extern crate slog_scope;
extern crate tokio_core;
extern crate tokio_io;

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::{App, Arg, ArgMatches};
use futures::{future, Future};
use tokio_core::reactor::Core;
use tokio_io::io::{read_to_end, write_all};

use proxydial::{config, logger, Context, Dial, Error, FutureExt, Registry};

fn cli<'a, 'b>() -> App<'a, 'b> {
    App::new("proxydial")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Opens a TCP connection through a SOCKS4, SOCKS5 or HTTP proxy")
        .arg(
            Arg::with_name("proxy")
                .short("p")
                .long("proxy")
                .value_name("URI")
                .help("Proxy to dial through, e.g. socks4a://user@127.0.0.1:1080")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("proxy-file")
                .short("f")
                .long("proxy-file")
                .value_name("PATH")
                .help("File with one proxy URI per line")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1),
        )
        .arg(
            Arg::with_name("timeout")
                .short("t")
                .long("timeout")
                .value_name("SECS")
                .help("Give up after this many seconds")
                .takes_value(true)
                .validator(|v| {
                    v.parse::<u64>()
                        .map(|_| ())
                        .map_err(|e| format!("{}: {}", v, e))
                }),
        )
        .arg(
            Arg::with_name("send")
                .short("s")
                .long("send")
                .value_name("TEXT")
                .help("Write TEXT once connected and print the reply; \\r and \\n are unescaped")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("More logging; repeat for more"),
        )
        .arg(
            Arg::with_name("TARGET")
                .help("host:port to connect to")
                .required(true)
                .index(1),
        )
}

fn unescape(text: &str) -> Vec<u8> {
    text.replace("\\r", "\r").replace("\\n", "\n").into_bytes()
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let registry = Registry::default();
    let files: Vec<&str> = matches
        .values_of("proxy-file")
        .map(|values| values.collect())
        .unwrap_or_default();
    let uri = matches.value_of("proxy").unwrap_or("");
    let proxies = config::parse_proxies(&registry, uri, &files)?;
    let proxy = match proxies.first() {
        Some(proxy) => proxy,
        None => return Err(Error::InvalidParams("no proxy configured".to_owned())),
    };
    if proxies.len() > 1 {
        debug!("{} proxies configured, using {}", proxies.len(), proxy.url());
    }

    let target = matches.value_of("TARGET").unwrap_or("").to_owned();
    let payload = matches.value_of("send").map(unescape);

    let mut core = Core::new()?;
    let mut ctx = Context::background(&core.handle());
    if let Some(secs) = matches.value_of("timeout") {
        let secs = secs
            .parse::<u64>()
            .map_err(|e| Error::InvalidParams(format!("timeout {}: {}", secs, e)))?;
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    info!("Dialing {} via {}", target, proxy.url());
    let work = proxy
        .dial_context(&ctx, "tcp", &target)
        .and_then(move |conn| {
            info!("Connected to {}", target);
            match payload {
                Some(payload) => write_all(conn, payload)
                    .and_then(|(conn, _)| read_to_end(conn, Vec::new()))
                    .map(|(_, reply)| reply)
                    .into_box(),
                None => future::ok::<_, io::Error>(Vec::new()).into_box(),
            }
        });

    let reply = core.run(ctx.bound(work))?;
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    stdout.write_all(&reply)?;
    stdout.flush()?;
    Ok(())
}

fn main() {
    let matches = cli().get_matches();
    let code = {
        let _guard = logger::init(matches.occurrences_of("verbose"));
        match run(&matches) {
            Ok(()) => 0,
            Err(e) => {
                error!("{}", e);
                eprintln!("proxydial: {}", e);
                1
            }
        }
    };
    process::exit(code);
}
