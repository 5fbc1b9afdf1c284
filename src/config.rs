//! Loading proxy lists from the command line and from files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Error;
use crate::registry::{Proxy, Registry};

/// URI of the proxy used when nothing else is configured.
pub const DIRECT_URI: &str = "direct://localhost";

/// Appends the proxy `uri` names. Empty strings are ignored.
pub fn parse_proxy_uri(
    registry: &Registry,
    proxies: &mut Vec<Proxy>,
    uri: &str,
) -> Result<(), Error> {
    if uri.is_empty() {
        return Ok(());
    }
    proxies.push(registry.resolve(uri, None)?);
    Ok(())
}

/// Appends one proxy per line of the file at `path`.
///
/// Surrounding whitespace is trimmed; blank lines and lines starting with `#`
/// are skipped. Stops at the first line that does not resolve, reporting its
/// line number. Proxies from earlier lines stay in `proxies`.
pub fn parse_proxy_file<P: AsRef<Path>>(
    registry: &Registry,
    proxies: &mut Vec<Proxy>,
    path: P,
) -> Result<(), Error> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let uri = line.trim();
        if uri.starts_with('#') {
            continue;
        }
        parse_proxy_uri(registry, proxies, uri).map_err(|e| Error::ProxyList {
            path: path.to_owned(),
            line: index + 1,
            source: Box::new(e),
        })?;
    }
    debug!("Loaded proxy list {}", path.display());
    Ok(())
}

/// Builds the full proxy list: `uri` first, then every file in order.
/// Falls back to a single direct proxy when nothing was configured.
pub fn parse_proxies<P: AsRef<Path>>(
    registry: &Registry,
    uri: &str,
    files: &[P],
) -> Result<Vec<Proxy>, Error> {
    let mut proxies = Vec::new();
    parse_proxy_uri(registry, &mut proxies, uri)?;
    for file in files {
        parse_proxy_file(registry, &mut proxies, file)?;
    }
    if proxies.is_empty() {
        proxies.push(registry.resolve(DIRECT_URI, None)?);
    }
    Ok(proxies)
}
