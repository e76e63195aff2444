//! The lookup orchestrator: build a query, send it, await the response,
//! validate and parse it. One linear pass per call; the only suspension
//! points are the socket send and receive.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;

use crate::dns::buffer::{BytePacketBuffer, PacketBuffer};
use crate::dns::client::{DnsSocket, UdpDnsSocket};
use crate::dns::config;
use crate::dns::protocol::{build_query, parse_response};
use crate::dns::{
    DnsError, Result, DEFAULT_DNS_SERVER, MAX_ANSWER_RECORDS, MAX_PACKET_SIZE, RESOLV_CONF_PATH,
};

pub struct DnsResolver {
    /// Transaction ids are handed out by incrementing this counter, wrapping
    /// mod 65536, so two in-flight lookups never share an id within a wrap
    /// cycle whatever the scheduler does. The starting point is randomized.
    next_id: AtomicU16,

    /// The nameserver endpoint, loaded at most once on first use.
    server: OnceLock<String>,

    conf_path: PathBuf,
    answer_cap: usize,
}

impl DnsResolver {
    pub fn new() -> DnsResolver {
        DnsResolver {
            next_id: AtomicU16::new(rand::random()),
            server: OnceLock::new(),
            conf_path: PathBuf::from(RESOLV_CONF_PATH),
            answer_cap: MAX_ANSWER_RECORDS,
        }
    }

    /// A resolver pinned to `server` (`host[:port]`), skipping the
    /// configuration file entirely.
    pub fn with_server(server: &str) -> DnsResolver {
        let resolver = DnsResolver::new();
        let _ = resolver.server.set(server.to_string());

        resolver
    }

    pub fn conf_path<P: Into<PathBuf>>(mut self, path: P) -> DnsResolver {
        self.conf_path = path.into();
        self
    }

    pub fn answer_cap(mut self, cap: usize) -> DnsResolver {
        self.answer_cap = cap;
        self
    }

    fn server_endpoint(&self) -> &str {
        self.server.get_or_init(|| {
            config::load_nameserver(&self.conf_path)
                .unwrap_or_else(|| DEFAULT_DNS_SERVER.to_string())
        })
    }

    /// Resolve `qname` to IPv4 addresses, in answer order, duplicates
    /// preserved. With a timeout set, both the send and the wait for the
    /// response are bounded by it.
    ///
    /// A CNAME-only response resolves to an empty list; canonical names are
    /// not followed.
    pub async fn lookup(&self, qname: &str, timeout: Option<Duration>) -> Result<Vec<Ipv4Addr>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // encode failure aborts before a socket is even bound
        let query = build_query(id, qname)?;

        let socket = UdpDnsSocket::new().await?;

        self.exchange(&socket, qname, id, query, timeout).await
    }

    /// Like [`lookup`](Self::lookup), but over a caller-supplied socket.
    pub async fn lookup_with<S: DnsSocket>(
        &self,
        socket: &S,
        qname: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<Ipv4Addr>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let query = build_query(id, qname)?;

        self.exchange(socket, qname, id, query, timeout).await
    }

    async fn exchange<S: DnsSocket>(
        &self,
        socket: &S,
        qname: &str,
        id: u16,
        query: BytePacketBuffer,
        timeout: Option<Duration>,
    ) -> Result<Vec<Ipv4Addr>> {
        let (host, port) = config::split_endpoint(self.server_endpoint());
        debug!(domain = qname, id, server = host, port, "starting lookup");

        let send = socket.send_to(&query.buf[..query.pos()], host, port);
        let _ = match timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| DnsError::Timeout)??,
            None => send.await?,
        };

        let mut response = [0u8; MAX_PACKET_SIZE];
        let recv = socket.recv(&mut response);
        let len = match timeout {
            Some(limit) => tokio::time::timeout(limit, recv)
                .await
                .map_err(|_| DnsError::Timeout)??,
            None => recv.await?,
        };

        parse_response(&response[..len], id, self.answer_cap)
    }

    /// The forgiving variant: every failure mode collapses into an empty
    /// list, for callers who only care whether addresses came back.
    pub async fn lookup_or_empty(&self, qname: &str, timeout: Option<Duration>) -> Vec<Ipv4Addr> {
        match self.lookup(qname, timeout).await {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(domain = qname, error = %e, "lookup failed");
                Vec::new()
            }
        }
    }
}

impl Default for DnsResolver {
    fn default() -> DnsResolver {
        DnsResolver::new()
    }
}
