//! The socket collaborator: a task-suspending UDP socket behind a trait, so
//! the lookup path can be driven by a real socket or by a test double.

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::dns::Result;

#[async_trait]
pub trait DnsSocket {
    async fn send_to(&self, buf: &[u8], host: &str, port: u16) -> Result<usize>;
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;
}

/// One socket per lookup, bound to an ephemeral port and released when the
/// lookup ends, on every exit path. Nothing is pooled or shared between
/// concurrent lookups.
pub struct UdpDnsSocket {
    socket: UdpSocket,
}

impl UdpDnsSocket {
    pub async fn new() -> Result<UdpDnsSocket> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;

        Ok(UdpDnsSocket { socket })
    }
}

#[async_trait]
impl DnsSocket for UdpDnsSocket {
    async fn send_to(&self, buf: &[u8], host: &str, port: u16) -> Result<usize> {
        let sent = self.socket.send_to(buf, (host, port)).await?;
        debug!(server = host, port, bytes = sent, "query sent");

        Ok(sent)
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let (len, from) = self.socket.recv_from(buf).await?;
        debug!(from = %from, bytes = len, "response received");

        Ok(len)
    }
}
