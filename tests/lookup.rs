//! End-to-end lookup tests against an in-process UDP responder, plus
//! orchestration tests over a scripted socket.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use iris::dns::buffer::{PacketBuffer, VectorPacketBuffer};
use iris::dns::client::DnsSocket;
use iris::dns::protocol::{DnsHeader, DnsQuestion, QueryType};
use iris::{DnsError, DnsResolver};

/// A well-formed response for `qname`: the echoed question followed by one
/// A record per address, each answer name a compression pointer back to the
/// question name at offset 12.
fn build_a_response(id: u16, qname: &str, addrs: &[Ipv4Addr]) -> Vec<u8> {
    let mut buffer = VectorPacketBuffer::new();

    let mut header = DnsHeader::new();
    header.id = id;
    header.response = true;
    header.recursion_desired = true;
    header.recursion_available = true;
    header.questions = 1;
    header.answers = addrs.len() as u16;
    header.write(&mut buffer).unwrap();

    DnsQuestion::new(qname, QueryType::A)
        .write(&mut buffer)
        .unwrap();

    for addr in addrs {
        buffer.write_u8(0xC0).unwrap();
        buffer.write_u8(0x0C).unwrap();
        buffer.write_u16(QueryType::A.to_num()).unwrap();
        buffer.write_u16(1).unwrap();
        buffer.write_u32(300).unwrap();
        buffer.write_u16(4).unwrap();
        buffer.write_u32(u32::from(*addr)).unwrap();
    }

    buffer.buffer
}

/// Bind a responder on a loopback ephemeral port. For every query received
/// it calls `respond` with the query's transaction id; `None` means stay
/// silent (for timeout tests).
async fn spawn_responder<F>(respond: F) -> u16
where
    F: Fn(u16) -> Option<Vec<u8>> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();

    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let (len, from) = socket.recv_from(&mut buf).await.unwrap();
            if len < 2 {
                continue;
            }
            let id = ((buf[0] as u16) << 8) | buf[1] as u16;
            if let Some(response) = respond(id) {
                socket.send_to(&response, from).await.unwrap();
            }
        }
    });

    port
}

#[tokio::test]
async fn test_lookup_returns_a_records_in_order() {
    let addrs = vec![
        Ipv4Addr::new(93, 184, 216, 34),
        Ipv4Addr::new(93, 184, 216, 34),
        Ipv4Addr::new(10, 11, 12, 13),
    ];
    let expected = addrs.clone();

    let port = spawn_responder(move |id| Some(build_a_response(id, "www.example.com", &addrs))).await;
    let resolver = DnsResolver::with_server(&format!("127.0.0.1:{}", port));

    let result = resolver
        .lookup("www.example.com", Some(Duration::from_secs(2)))
        .await
        .unwrap();

    // order preserved, duplicates not collapsed
    assert_eq!(expected, result);
}

#[tokio::test]
async fn test_lookup_times_out_without_response() {
    let port = spawn_responder(|_| None).await;
    let resolver = DnsResolver::with_server(&format!("127.0.0.1:{}", port));

    let result = resolver
        .lookup("www.example.com", Some(Duration::from_millis(200)))
        .await;

    assert!(matches!(result, Err(DnsError::Timeout)));
}

#[tokio::test]
async fn test_lookup_rejects_spoofed_id() {
    let port = spawn_responder(|id| {
        Some(build_a_response(
            id.wrapping_add(1),
            "www.example.com",
            &[Ipv4Addr::new(6, 6, 6, 6)],
        ))
    })
    .await;
    let resolver = DnsResolver::with_server(&format!("127.0.0.1:{}", port));

    let result = resolver
        .lookup("www.example.com", Some(Duration::from_secs(2)))
        .await;
    assert!(matches!(result, Err(DnsError::IdMismatch)));

    let collapsed = resolver
        .lookup_or_empty("www.example.com", Some(Duration::from_secs(2)))
        .await;
    assert!(collapsed.is_empty());
}

#[tokio::test]
async fn test_lookup_invalid_name_fails_before_io() {
    // nothing listens here; an encode failure must abort before sending
    let resolver = DnsResolver::with_server("127.0.0.1:9");

    let result = resolver
        .lookup("www.example.com.", Some(Duration::from_secs(2)))
        .await;

    assert!(matches!(result, Err(DnsError::InvalidName(_))));
}

/// A scripted socket: records the id of every query it is handed and
/// answers each with an empty but well-formed response.
struct MockSocket {
    seen_ids: Arc<Mutex<Vec<u16>>>,
    pending: Mutex<Option<u16>>,
}

impl MockSocket {
    fn new(seen_ids: Arc<Mutex<Vec<u16>>>) -> MockSocket {
        MockSocket {
            seen_ids,
            pending: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DnsSocket for MockSocket {
    async fn send_to(&self, buf: &[u8], _host: &str, _port: u16) -> iris::Result<usize> {
        let id = ((buf[0] as u16) << 8) | buf[1] as u16;
        self.seen_ids.lock().unwrap().push(id);
        *self.pending.lock().unwrap() = Some(id);

        Ok(buf.len())
    }

    async fn recv(&self, buf: &mut [u8]) -> iris::Result<usize> {
        let id = self.pending.lock().unwrap().take().unwrap();
        let response = build_a_response(id, "www.example.com", &[]);
        buf[..response.len()].copy_from_slice(&response);

        Ok(response.len())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_get_distinct_ids() {
    const LOOKUPS: usize = 256;

    let resolver = Arc::new(DnsResolver::with_server("127.0.0.1:53"));
    let seen_ids = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for _ in 0..LOOKUPS {
        let resolver = resolver.clone();
        let seen_ids = seen_ids.clone();
        handles.push(tokio::spawn(async move {
            let socket = MockSocket::new(seen_ids);
            resolver
                .lookup_with(&socket, "www.example.com", None)
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let ids = seen_ids.lock().unwrap();
    let distinct: HashSet<u16> = ids.iter().copied().collect();

    assert_eq!(LOOKUPS, ids.len());
    assert_eq!(LOOKUPS, distinct.len());
}
