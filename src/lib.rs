//! iris is a minimal DNS stub client for async code: it speaks the DNS wire
//! protocol directly over UDP so a lookup suspends the calling task instead
//! of blocking a thread in the operating system's resolver.
//!
//! Only A lookups are performed. CNAME answers are decoded but not followed,
//! and a response that carries nothing but CNAMEs yields an empty list.
//!
//! ```no_run
//! use std::time::Duration;
//! use iris::DnsResolver;
//!
//! # async fn run() -> iris::Result<()> {
//! let resolver = DnsResolver::new();
//! let addrs = resolver.lookup("www.example.com", Some(Duration::from_secs(5))).await?;
//! for addr in addrs {
//!     println!("{}", addr);
//! }
//! # Ok(())
//! # }
//! ```

pub mod dns;

pub use dns::resolve::DnsResolver;
pub use dns::{DnsError, Result};
