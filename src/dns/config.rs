//! Loading of the system resolver configuration. Failure here is never
//! fatal; the caller falls back to the built-in default server.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::dns::DEFAULT_DNS_PORT;

/// First `nameserver` line wins; everything else in the file is ignored.
pub fn parse_nameserver(contents: &str) -> Option<String> {
    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        if fields.next() == Some("nameserver") {
            if let Some(addr) = fields.next() {
                return Some(addr.to_string());
            }
        }
    }

    None
}

pub fn load_nameserver<P: AsRef<Path>>(path: P) -> Option<String> {
    match fs::read_to_string(path.as_ref()) {
        Ok(contents) => parse_nameserver(&contents),
        Err(e) => {
            warn!(path = %path.as_ref().display(), error = %e, "could not read resolver configuration");
            None
        }
    }
}

/// Split `host[:port]`, defaulting the port to 53. An unparsable port also
/// falls back to 53 rather than failing the lookup.
pub fn split_endpoint(endpoint: &str) -> (&str, u16) {
    match endpoint.split_once(':') {
        Some((host, port)) => (host, port.parse().unwrap_or(DEFAULT_DNS_PORT)),
        None => (endpoint, DEFAULT_DNS_PORT),
    }
}
