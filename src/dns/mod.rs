//! The dns module implements the subset of the DNS protocol needed to
//! resolve a name to IPv4 addresses, and the lookup orchestration around it.

use derive_more::{Display, From};

pub mod buffer;
pub mod client;
pub mod config;
pub mod protocol;
pub mod resolve;
pub mod system;

/// Largest UDP payload we send or accept.
pub const MAX_PACKET_SIZE: usize = 512;

/// Answer records processed per response, regardless of what the header
/// claims. A hostile ancount must not translate into unbounded work.
pub const MAX_ANSWER_RECORDS: usize = 10;

/// Longest encoded name, including length prefixes and the terminal zero.
pub const MAX_NAME_LEN: usize = 255;

/// Longest single label.
pub const MAX_LABEL_LEN: usize = 63;

/// Compression pointers followed per name before decoding is abandoned.
/// Pointers may target other pointers, so without a cap a crafted packet
/// can loop forever.
pub const MAX_JUMPS: usize = 5;

pub const DEFAULT_DNS_SERVER: &str = "8.8.8.8";
pub const DEFAULT_DNS_PORT: u16 = 53;
pub const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

#[derive(Debug, Display, From)]
pub enum DnsError {
    Io(std::io::Error),
    InvalidName(String),
    LabelTooLong,
    NameTooLong,
    EndOfBuffer,
    TooManyJumps,
    IdMismatch,
    Timeout,
}

impl std::error::Error for DnsError {}

pub type Result<T> = std::result::Result<T, DnsError>;
