//! The blocking fallback: name resolution through the operating system.
//!
//! These calls stall the whole thread, not just the task, and the libc
//! machinery underneath is not reentrant everywhere, so every call is
//! serialized behind a process-wide lock. Code on the cooperative path
//! should use [`DnsResolver`](crate::dns::resolve::DnsResolver) instead.
//!
//! Errors here are the operating system's own, surfaced verbatim as
//! `io::Error`, a deliberately separate surface from
//! [`DnsError`](crate::dns::DnsError).

use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Mutex;

/// Results returned per call are capped at this many entries.
pub const MAX_HOST_RESULTS: usize = 16;

static RESOLVER_LOCK: Mutex<()> = Mutex::new(());

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressFamily {
    V4,
    V6,
}

/// Resolve `name` to addresses of the requested family.
pub fn gethostbyname(name: &str, family: AddressFamily) -> io::Result<Vec<IpAddr>> {
    let _guard = RESOLVER_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let mut addrs = Vec::new();
    for addr in (name, 0u16).to_socket_addrs()? {
        let ip = addr.ip();
        let keep = match family {
            AddressFamily::V4 => ip.is_ipv4(),
            AddressFamily::V6 => ip.is_ipv6(),
        };
        if keep {
            addrs.push(ip);
        }
        if addrs.len() == MAX_HOST_RESULTS {
            break;
        }
    }

    Ok(addrs)
}

/// Resolve `host` plus a port into socket addresses, both families.
pub fn getaddrinfo(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    let _guard = RESOLVER_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    Ok((host, port)
        .to_socket_addrs()?
        .take(MAX_HOST_RESULTS)
        .collect())
}
