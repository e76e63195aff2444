use std::fmt;
use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::dns::buffer::{BytePacketBuffer, PacketBuffer, VectorPacketBuffer};
use crate::dns::{DnsError, Result};

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum QueryType {
    UNKNOWN = 0,
    A = 1,
    CNAME = 5,
    MX = 15,
    AAAA = 28,
}

impl QueryType {
    pub fn from_num(num: u16) -> QueryType {
        match num {
            1 => QueryType::A,
            5 => QueryType::CNAME,
            15 => QueryType::MX,
            28 => QueryType::AAAA,
            _ => QueryType::UNKNOWN,
        }
    }

    pub fn to_num(self) -> u16 {
        self as u16
    }
}

#[derive(Clone, Debug)]
pub struct DnsHeader {
    pub id: u16, // 16 bits

    pub recursion_desired: bool,    // 1 bit
    pub truncated_message: bool,    // 1 bit
    pub authoritative_answer: bool, // 1 bit
    pub opcode: u8,                 // 4 bits
    pub response: bool,             // 1 bit

    pub rescode: u8,               // 4 bits
    pub z: u8,                     // 3 bits, reserved
    pub recursion_available: bool, // 1 bit

    pub questions: u16,             // 16 bits
    pub answers: u16,               // 16 bits
    pub authoritative_entries: u16, // 16 bits
    pub resource_entries: u16,      // 16 bits
}

impl DnsHeader {
    pub fn new() -> DnsHeader {
        DnsHeader {
            id: 0,

            recursion_desired: false,
            truncated_message: false,
            authoritative_answer: false,
            opcode: 0,
            response: false,

            rescode: 0,
            z: 0,
            recursion_available: false,

            questions: 0,
            answers: 0,
            authoritative_entries: 0,
            resource_entries: 0,
        }
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_u16(self.id)?;

        buffer.write_u8(
            (self.recursion_desired as u8)
                | ((self.truncated_message as u8) << 1)
                | ((self.authoritative_answer as u8) << 2)
                | (self.opcode << 3)
                | ((self.response as u8) << 7),
        )?;

        buffer.write_u8(
            self.rescode | ((self.z & 0x07) << 4) | ((self.recursion_available as u8) << 7),
        )?;

        buffer.write_u16(self.questions)?;
        buffer.write_u16(self.answers)?;
        buffer.write_u16(self.authoritative_entries)?;
        buffer.write_u16(self.resource_entries)?;

        Ok(())
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        self.id = buffer.read_u16()?;

        let flags = buffer.read_u16()?;
        let a = (flags >> 8) as u8;
        let b = (flags & 0xFF) as u8;
        self.recursion_desired = (a & (1 << 0)) > 0;
        self.truncated_message = (a & (1 << 1)) > 0;
        self.authoritative_answer = (a & (1 << 2)) > 0;
        self.opcode = (a >> 3) & 0x0F;
        self.response = (a & (1 << 7)) > 0;

        self.rescode = b & 0x0F;
        self.z = (b >> 4) & 0x07;
        self.recursion_available = (b & (1 << 7)) > 0;

        self.questions = buffer.read_u16()?;
        self.answers = buffer.read_u16()?;
        self.authoritative_entries = buffer.read_u16()?;
        self.resource_entries = buffer.read_u16()?;

        Ok(())
    }
}

impl Default for DnsHeader {
    fn default() -> DnsHeader {
        DnsHeader::new()
    }
}

impl fmt::Display for DnsHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "DnsHeader {{ id: {}, response: {}, rescode: {}, questions: {}, answers: {} }}",
            self.id, self.response, self.rescode, self.questions, self.answers
        )
    }
}

#[derive(Debug, Clone)]
pub struct DnsQuestion {
    pub name: String,
    pub qtype: QueryType,
}

impl DnsQuestion {
    pub fn new(name: &str, qtype: QueryType) -> DnsQuestion {
        DnsQuestion {
            name: name.to_string(),
            qtype,
        }
    }

    pub fn write<T: PacketBuffer>(&self, buffer: &mut T) -> Result<()> {
        buffer.write_qname(&self.name)?;

        buffer.write_u16(self.qtype.to_num())?;
        buffer.write_u16(1)?; // class IN

        Ok(())
    }

    pub fn read<T: PacketBuffer>(&mut self, buffer: &mut T) -> Result<()> {
        buffer.read_qname(&mut self.name)?;
        self.qtype = QueryType::from_num(buffer.read_u16()?); // qtype
        let _ = buffer.read_u16()?; // class

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRecord {
    A {
        domain: String,
        addr: Ipv4Addr,
        ttl: u32,
    }, // 1
    Cname {
        domain: String,
        host: String,
        ttl: u32,
    }, // 5
    Unknown {
        domain: String,
        qtype: u16,
        data_len: u16,
        ttl: u32,
    }, // anything else
}

impl ResourceRecord {
    /// Read one record, leaving the buffer position exactly `rdlength`
    /// bytes past the record data no matter what the type was. That keeps
    /// record boundaries intact even for types we don't interpret.
    pub fn read<T: PacketBuffer>(buffer: &mut T) -> Result<ResourceRecord> {
        let mut domain = String::new();
        buffer.read_qname(&mut domain)?;

        let qtype_num = buffer.read_u16()?;
        let qtype = QueryType::from_num(qtype_num);
        let _class = buffer.read_u16()?;
        let ttl = buffer.read_u32()?;
        let data_len = buffer.read_u16()?;
        let data_start = buffer.pos();

        let record = match qtype {
            QueryType::A if data_len == 4 => {
                let raw_addr = buffer.read_u32()?;
                let addr = Ipv4Addr::new(
                    ((raw_addr >> 24) & 0xFF) as u8,
                    ((raw_addr >> 16) & 0xFF) as u8,
                    ((raw_addr >> 8) & 0xFF) as u8,
                    (raw_addr & 0xFF) as u8,
                );

                ResourceRecord::A { domain, addr, ttl }
            }
            QueryType::A => {
                warn!(domain = %domain, data_len, "A record with bogus rdlength, ignoring");

                ResourceRecord::Unknown {
                    domain,
                    qtype: qtype_num,
                    data_len,
                    ttl,
                }
            }
            QueryType::CNAME => {
                let mut host = String::new();
                buffer.read_qname(&mut host)?;

                ResourceRecord::Cname { domain, host, ttl }
            }
            _ => ResourceRecord::Unknown {
                domain,
                qtype: qtype_num,
                data_len,
                ttl,
            },
        };

        buffer.seek(data_start + data_len as usize)?;

        Ok(record)
    }
}

/// Assemble a type A, class IN query for `qname` carrying transaction id
/// `id`. The returned buffer's position is the exact number of bytes
/// written. A name that fails to encode aborts before anything is sent.
pub fn build_query(id: u16, qname: &str) -> Result<BytePacketBuffer> {
    let mut buffer = BytePacketBuffer::new();

    let mut header = DnsHeader::new();
    header.id = id;
    header.recursion_desired = true;
    header.questions = 1;
    header.write(&mut buffer)?;

    let question = DnsQuestion::new(qname, QueryType::A);
    question.write(&mut buffer)?;

    Ok(buffer)
}

/// Decode a response and return its A record addresses in answer order.
///
/// The answer count from the wire is clamped to `answer_cap` so a hostile
/// header can't buy unbounded work, and the echoed question section is
/// skipped without inspection. CNAME answers are decoded (they have to be,
/// to keep the cursor honest) but never followed; a response that only
/// carries CNAMEs yields an empty list. If the header's transaction id
/// differs from `expected_id` everything parsed is discarded.
pub fn parse_response(data: &[u8], expected_id: u16, answer_cap: usize) -> Result<Vec<Ipv4Addr>> {
    let mut buffer = VectorPacketBuffer::from(data);

    let mut header = DnsHeader::new();
    header.read(&mut buffer)?;

    // qdcount gets the same defensive cap as ancount; a forged count must
    // not desynchronize the cursor or stall the parser.
    let questions = (header.questions as usize).min(answer_cap);
    for _ in 0..questions {
        let mut question = DnsQuestion::new("", QueryType::UNKNOWN);
        question.read(&mut buffer)?;
    }

    let answers = (header.answers as usize).min(answer_cap);

    let mut addrs = Vec::new();
    for _ in 0..answers {
        match ResourceRecord::read(&mut buffer)? {
            ResourceRecord::A { addr, .. } => {
                addrs.push(addr);
            }
            ResourceRecord::Cname { domain, host, .. } => {
                debug!(domain = %domain, cname = %host, "cname answer, not followed");
            }
            ResourceRecord::Unknown { .. } => {}
        }
    }

    if header.id != expected_id {
        warn!(
            expected = expected_id,
            received = header.id,
            "transaction id mismatch, discarding response"
        );
        return Err(DnsError::IdMismatch);
    }

    Ok(addrs)
}
