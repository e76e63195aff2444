use crate::dns::{DnsError, Result, MAX_JUMPS, MAX_LABEL_LEN, MAX_NAME_LEN, MAX_PACKET_SIZE};

pub trait PacketBuffer {
    fn read(&mut self) -> Result<u8>;
    fn get(&self, pos: usize) -> Result<u8>;
    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]>;
    fn write(&mut self, val: u8) -> Result<()>;
    fn pos(&self) -> usize;
    fn seek(&mut self, pos: usize) -> Result<()>;

    fn write_u8(&mut self, val: u8) -> Result<()> {
        self.write(val)
    }

    fn write_u16(&mut self, val: u16) -> Result<()> {
        self.write((val >> 8) as u8)?;
        self.write((val & 0xFF) as u8)?;

        Ok(())
    }

    fn write_u32(&mut self, val: u32) -> Result<()> {
        self.write(((val >> 24) & 0xFF) as u8)?;
        self.write(((val >> 16) & 0xFF) as u8)?;
        self.write(((val >> 8) & 0xFF) as u8)?;
        self.write((val & 0xFF) as u8)?;

        Ok(())
    }

    /// The encoded length of a name: one length byte per label plus the
    /// label bytes, plus the terminal zero.
    fn qname_len(&self, qname: &str) -> usize {
        qname.split('.').map(|label| label.len() + 1).sum::<usize>() + 1
    }

    /// Write a dotted name as length-prefixed labels followed by a zero
    /// byte. A trailing dot would produce an empty final label, which on
    /// the wire terminates the name early, so it is rejected up front along
    /// with empty labels anywhere else. Labels are limited to 63 bytes and
    /// the encoded name to 255; violations fail before anything is written.
    fn write_qname(&mut self, qname: &str) -> Result<()> {
        if qname.is_empty() || qname.ends_with('.') {
            return Err(DnsError::InvalidName(qname.to_string()));
        }
        if self.qname_len(qname) > MAX_NAME_LEN {
            return Err(DnsError::NameTooLong);
        }

        for label in qname.split('.') {
            if label.is_empty() {
                return Err(DnsError::InvalidName(qname.to_string()));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(DnsError::LabelTooLong);
            }

            self.write_u8(label.len() as u8)?;
            for b in label.as_bytes() {
                self.write_u8(*b)?;
            }
        }

        self.write_u8(0)?;

        Ok(())
    }

    fn read_u16(&mut self) -> Result<u16> {
        let res = ((self.read()? as u16) << 8) | (self.read()? as u16);

        Ok(res)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let res = ((self.read()? as u32) << 24)
            | ((self.read()? as u32) << 16)
            | ((self.read()? as u32) << 8)
            | (self.read()? as u32);

        Ok(res)
    }

    /// Read a name starting at the current position, appending the dotted
    /// form to `outstr`.
    ///
    /// A length byte with the top two bits set is a compression pointer: it
    /// and the following byte form a 14-bit offset to resume reading from
    /// elsewhere in the same buffer. The buffer position only advances past
    /// the first pointer; decoding continues at the target. Pointers may
    /// reference other pointers, so the number of jumps is capped at
    /// [`MAX_JUMPS`] and every access is bounds-checked, keeping decoding
    /// finite on packets crafted to loop or to point outside the payload.
    fn read_qname(&mut self, outstr: &mut String) -> Result<()> {
        let mut pos = self.pos();
        let mut jumps = 0;

        let mut delim = "";
        loop {
            let len = self.get(pos)?;

            if (len & 0xC0) == 0xC0 {
                if jumps >= MAX_JUMPS {
                    return Err(DnsError::TooManyJumps);
                }

                // The shared position moves past the pointer once; the
                // remainder of the name lives elsewhere in the packet.
                if jumps == 0 {
                    self.seek(pos + 2)?;
                }

                let b2 = self.get(pos + 1)? as u16;
                let offset = (((len as u16) ^ 0xC0) << 8) | b2;
                pos = offset as usize;
                jumps += 1;
                continue;
            }

            pos += 1;

            // Names are terminated by an empty label of length 0
            if len == 0 {
                break;
            }

            if outstr.len() + len as usize + 1 > MAX_NAME_LEN {
                return Err(DnsError::NameTooLong);
            }

            outstr.push_str(delim);
            outstr.push_str(&String::from_utf8_lossy(self.get_range(pos, len as usize)?));
            delim = ".";

            pos += len as usize;
        }

        if jumps == 0 {
            self.seek(pos)?;
        }

        Ok(())
    }
}

/// A growable buffer, used to synthesize packets.
pub struct VectorPacketBuffer {
    pub buffer: Vec<u8>,
    pub pos: usize,
}

impl VectorPacketBuffer {
    pub fn new() -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: Vec::new(),
            pos: 0,
        }
    }
}

impl Default for VectorPacketBuffer {
    fn default() -> VectorPacketBuffer {
        VectorPacketBuffer::new()
    }
}

impl From<&[u8]> for VectorPacketBuffer {
    fn from(data: &[u8]) -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: data.to_vec(),
            pos: 0,
        }
    }
}

impl PacketBuffer for VectorPacketBuffer {
    fn read(&mut self) -> Result<u8> {
        let res = self.get(self.pos)?;
        self.pos += 1;

        Ok(res)
    }

    fn get(&self, pos: usize) -> Result<u8> {
        self.buffer.get(pos).copied().ok_or(DnsError::EndOfBuffer)
    }

    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]> {
        self.buffer
            .get(start..start + len)
            .ok_or(DnsError::EndOfBuffer)
    }

    fn write(&mut self, val: u8) -> Result<()> {
        self.buffer.push(val);
        self.pos += 1;

        Ok(())
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        self.pos = pos;

        Ok(())
    }
}

/// A fixed-size buffer matching the largest UDP payload we deal with, used
/// for assembling outgoing queries.
pub struct BytePacketBuffer {
    pub buf: [u8; MAX_PACKET_SIZE],
    pub pos: usize,
}

impl BytePacketBuffer {
    pub fn new() -> BytePacketBuffer {
        BytePacketBuffer {
            buf: [0; MAX_PACKET_SIZE],
            pos: 0,
        }
    }
}

impl Default for BytePacketBuffer {
    fn default() -> BytePacketBuffer {
        BytePacketBuffer::new()
    }
}

impl PacketBuffer for BytePacketBuffer {
    fn read(&mut self) -> Result<u8> {
        if self.pos >= MAX_PACKET_SIZE {
            return Err(DnsError::EndOfBuffer);
        }
        let res = self.buf[self.pos];
        self.pos += 1;

        Ok(res)
    }

    fn get(&self, pos: usize) -> Result<u8> {
        if pos >= MAX_PACKET_SIZE {
            return Err(DnsError::EndOfBuffer);
        }
        Ok(self.buf[pos])
    }

    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]> {
        if start + len > MAX_PACKET_SIZE {
            return Err(DnsError::EndOfBuffer);
        }
        Ok(&self.buf[start..start + len])
    }

    fn write(&mut self, val: u8) -> Result<()> {
        if self.pos >= MAX_PACKET_SIZE {
            return Err(DnsError::EndOfBuffer);
        }
        self.buf[self.pos] = val;
        self.pos += 1;

        Ok(())
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        self.pos = pos;

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_qname_roundtrip() {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_qname("www.example.com").unwrap();

        assert_eq!(
            &buffer.buffer,
            b"\x03www\x07example\x03com\x00"
        );

        buffer.seek(0).unwrap();
        let mut decoded = String::new();
        buffer.read_qname(&mut decoded).unwrap();

        assert_eq!("www.example.com", decoded);
        assert_eq!(buffer.pos(), buffer.buffer.len());
    }

    #[test]
    fn test_qname_rejects_trailing_dot() {
        let mut buffer = VectorPacketBuffer::new();

        assert!(matches!(
            buffer.write_qname("example.com."),
            Err(DnsError::InvalidName(_))
        ));
        assert!(matches!(
            buffer.write_qname(""),
            Err(DnsError::InvalidName(_))
        ));
        assert!(matches!(
            buffer.write_qname("foo..bar"),
            Err(DnsError::InvalidName(_))
        ));

        // nothing written by any of the failed attempts
        assert_eq!(0, buffer.buffer.len());
    }

    #[test]
    fn test_qname_rejects_oversized_labels_and_names() {
        let mut buffer = VectorPacketBuffer::new();

        let long_label = "a".repeat(64);
        assert!(matches!(
            buffer.write_qname(&long_label),
            Err(DnsError::LabelTooLong)
        ));

        let long_name = vec!["a".repeat(63); 5].join(".");
        assert!(matches!(
            buffer.write_qname(&long_name),
            Err(DnsError::NameTooLong)
        ));

        // 63 bytes per label is fine
        let max_label = "a".repeat(63);
        buffer.write_qname(&max_label).unwrap();
    }

    #[test]
    fn test_qname_compression_pointer() {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_qname("www.example.com").unwrap();

        // a name whose tail is a pointer back to "example.com"
        let jump_pos = buffer.pos();
        buffer.write_u8(3).unwrap();
        for b in b"ftp" {
            buffer.write_u8(*b).unwrap();
        }
        buffer.write_u8(0xC0).unwrap();
        buffer.write_u8(0x04).unwrap();

        buffer.seek(jump_pos).unwrap();
        let mut decoded = String::new();
        buffer.read_qname(&mut decoded).unwrap();

        assert_eq!("ftp.example.com", decoded);
        // position advanced past the pointer, not to the jump target
        assert_eq!(buffer.pos(), buffer.buffer.len());
    }

    #[test]
    fn test_qname_pointer_loop_terminates() {
        // a pointer that points at itself
        let data: &[u8] = &[0xC0, 0x00];
        let mut buffer = VectorPacketBuffer::from(data);

        let mut decoded = String::new();
        assert!(matches!(
            buffer.read_qname(&mut decoded),
            Err(DnsError::TooManyJumps)
        ));
    }

    #[test]
    fn test_qname_pointer_out_of_range() {
        // a pointer to offset 0x3FF in a two byte packet
        let data: &[u8] = &[0xC3, 0xFF];
        let mut buffer = VectorPacketBuffer::from(data);

        let mut decoded = String::new();
        assert!(matches!(
            buffer.read_qname(&mut decoded),
            Err(DnsError::EndOfBuffer)
        ));
    }

    #[test]
    fn test_qname_length_runs_past_buffer() {
        // label claims 60 bytes, buffer holds 3
        let data: &[u8] = &[0x3C, b'a', b'b'];
        let mut buffer = VectorPacketBuffer::from(data);

        let mut decoded = String::new();
        assert!(matches!(
            buffer.read_qname(&mut decoded),
            Err(DnsError::EndOfBuffer)
        ));
    }

    #[test]
    fn test_byte_buffer_bounds() {
        let mut buffer = BytePacketBuffer::new();

        buffer.seek(MAX_PACKET_SIZE).unwrap();
        assert!(matches!(buffer.read(), Err(DnsError::EndOfBuffer)));
        assert!(matches!(buffer.write(0), Err(DnsError::EndOfBuffer)));
        assert!(matches!(buffer.get(MAX_PACKET_SIZE), Err(DnsError::EndOfBuffer)));
        assert!(matches!(
            buffer.get_range(MAX_PACKET_SIZE - 1, 2),
            Err(DnsError::EndOfBuffer)
        ));

        // the very last byte is still addressable
        assert!(buffer.get(MAX_PACKET_SIZE - 1).is_ok());
        assert!(buffer.get_range(MAX_PACKET_SIZE - 1, 1).is_ok());
    }
}
