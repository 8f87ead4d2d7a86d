//! TCP segment construction and parsing
//!
//! Only what the sniffer needs: ports, flags and the payload offset. The
//! builder side exists so tests (and `PacketBuilder`) can produce real
//! segments with valid checksums.

use crate::checksum::transport_checksum;
use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

/// TCP port number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TcpPort(pub u16);

impl TcpPort {
    /// HTTP (80)
    pub const HTTP: TcpPort = TcpPort(80);

    /// HTTP alternate (8080)
    pub const HTTP_ALT: TcpPort = TcpPort(8080);

    /// HTTPS (443)
    pub const HTTPS: TcpPort = TcpPort(443);

    pub fn new(port: u16) -> Self {
        TcpPort(port)
    }

    pub fn to_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for TcpPort {
    fn from(port: u16) -> Self {
        TcpPort(port)
    }
}

/// TCP flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    pub fin: bool,
    pub syn: bool,
    pub rst: bool,
    pub psh: bool,
    pub ack: bool,
    pub urg: bool,
    pub ece: bool,
    pub cwr: bool,
}

impl TcpFlags {
    /// No flags set
    pub const NONE: TcpFlags = TcpFlags {
        fin: false,
        syn: false,
        rst: false,
        psh: false,
        ack: false,
        urg: false,
        ece: false,
        cwr: false,
    };

    /// SYN flag (connection initiation)
    pub const SYN: TcpFlags = TcpFlags {
        syn: true,
        ..TcpFlags::NONE
    };

    /// ACK flag
    pub const ACK: TcpFlags = TcpFlags {
        ack: true,
        ..TcpFlags::NONE
    };

    /// PSH+ACK flags, what a data-carrying segment normally has
    pub const PSH_ACK: TcpFlags = TcpFlags {
        psh: true,
        ack: true,
        ..TcpFlags::NONE
    };

    pub fn to_u8(self) -> u8 {
        let mut flags = 0u8;
        if self.fin {
            flags |= 0b0000_0001;
        }
        if self.syn {
            flags |= 0b0000_0010;
        }
        if self.rst {
            flags |= 0b0000_0100;
        }
        if self.psh {
            flags |= 0b0000_1000;
        }
        if self.ack {
            flags |= 0b0001_0000;
        }
        if self.urg {
            flags |= 0b0010_0000;
        }
        if self.ece {
            flags |= 0b0100_0000;
        }
        if self.cwr {
            flags |= 0b1000_0000;
        }
        flags
    }

    pub fn from_u8(value: u8) -> Self {
        TcpFlags {
            fin: (value & 0b0000_0001) != 0,
            syn: (value & 0b0000_0010) != 0,
            rst: (value & 0b0000_0100) != 0,
            psh: (value & 0b0000_1000) != 0,
            ack: (value & 0b0001_0000) != 0,
            urg: (value & 0b0010_0000) != 0,
            ece: (value & 0b0100_0000) != 0,
            cwr: (value & 0b1000_0000) != 0,
        }
    }
}

/// TCP segment
#[derive(Debug, Clone)]
pub struct TcpSegment {
    pub source_port: TcpPort,
    pub destination_port: TcpPort,
    pub sequence_number: u32,
    pub acknowledgment_number: u32,
    /// Data offset in 32-bit words (minimum 5)
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window_size: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
    /// Options (if data_offset > 5)
    pub options: Vec<u8>,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    /// Minimum TCP header size (without options)
    pub const MIN_HEADER_SIZE: usize = 20;

    /// Create a new TCP segment with no options
    pub fn new(
        source_port: TcpPort,
        destination_port: TcpPort,
        sequence_number: u32,
        acknowledgment_number: u32,
        flags: TcpFlags,
        window_size: u16,
        payload: Vec<u8>,
    ) -> Self {
        TcpSegment {
            source_port,
            destination_port,
            sequence_number,
            acknowledgment_number,
            data_offset: 5,
            flags,
            window_size,
            checksum: 0,
            urgent_pointer: 0,
            options: Vec::new(),
            payload,
        }
    }

    /// Calculate and set the checksum over the IPv4 pseudo-header
    pub fn calculate_checksum(&mut self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) {
        self.checksum = 0;
        let data = self.to_bytes();
        self.checksum = transport_checksum(&src_ip.octets(), &dst_ip.octets(), 6, &data);
    }

    /// Serialize the segment as-is (checksum field unchanged)
    pub fn to_bytes(&self) -> Vec<u8> {
        let header_size = Self::MIN_HEADER_SIZE + self.options.len();
        let mut buffer = BytesMut::with_capacity(header_size + self.payload.len());

        buffer.put_u16(self.source_port.to_u16());
        buffer.put_u16(self.destination_port.to_u16());
        buffer.put_u32(self.sequence_number);
        buffer.put_u32(self.acknowledgment_number);
        buffer.put_u8(self.data_offset << 4);
        buffer.put_u8(self.flags.to_u8());
        buffer.put_u16(self.window_size);
        buffer.put_u16(self.checksum);
        buffer.put_u16(self.urgent_pointer);
        buffer.put_slice(&self.options);
        buffer.put_slice(&self.payload);

        buffer.to_vec()
    }

    /// Serialize with a freshly computed checksum
    pub fn to_bytes_with_checksum(&self, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Vec<u8> {
        let mut segment = self.clone();
        segment.calculate_checksum(src_ip, dst_ip);
        segment.to_bytes()
    }

    /// Parse a TCP segment from bytes.
    ///
    /// Rejects segments whose data offset is below 5 words or runs past the
    /// end of the buffer.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return None;
        }

        let data_offset = data[12] >> 4;
        let header_len = (data_offset as usize) * 4;
        if header_len < Self::MIN_HEADER_SIZE || data.len() < header_len {
            return None;
        }

        Some(TcpSegment {
            source_port: TcpPort::new(u16::from_be_bytes([data[0], data[1]])),
            destination_port: TcpPort::new(u16::from_be_bytes([data[2], data[3]])),
            sequence_number: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            acknowledgment_number: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            data_offset,
            flags: TcpFlags::from_u8(data[13]),
            window_size: u16::from_be_bytes([data[14], data[15]]),
            checksum: u16::from_be_bytes([data[16], data[17]]),
            urgent_pointer: u16::from_be_bytes([data[18], data[19]]),
            options: data[Self::MIN_HEADER_SIZE..header_len].to_vec(),
            payload: data[header_len..].to_vec(),
        })
    }

    /// Get the header size in bytes
    pub fn header_len(&self) -> usize {
        (self.data_offset as usize) * 4
    }

    pub fn len(&self) -> usize {
        self.header_len() + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::validate_checksum;

    #[test]
    fn test_tcp_flags() {
        assert_eq!(TcpFlags::SYN.to_u8(), 0b0000_0010);
        assert_eq!(TcpFlags::PSH_ACK.to_u8(), 0b0001_1000);

        let parsed = TcpFlags::from_u8(0b0001_0010);
        assert!(parsed.syn);
        assert!(parsed.ack);
        assert!(!parsed.fin);
    }

    #[test]
    fn test_segment_parse() {
        let segment = TcpSegment::new(
            TcpPort::new(51000),
            TcpPort::HTTP,
            1000,
            2000,
            TcpFlags::PSH_ACK,
            65535,
            b"GET / HTTP/1.1\r\n\r\n".to_vec(),
        );
        let bytes = segment.to_bytes();

        let parsed = TcpSegment::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.source_port, TcpPort::new(51000));
        assert_eq!(parsed.destination_port, TcpPort::HTTP);
        assert_eq!(parsed.sequence_number, 1000);
        assert_eq!(parsed.flags, TcpFlags::PSH_ACK);
        assert_eq!(parsed.payload, b"GET / HTTP/1.1\r\n\r\n".to_vec());
    }

    #[test]
    fn test_options_shift_payload() {
        let mut segment = TcpSegment::new(
            TcpPort::new(1),
            TcpPort::new(2),
            0,
            0,
            TcpFlags::ACK,
            1024,
            vec![0xEE],
        );
        segment.options = vec![0x01, 0x01, 0x01, 0x00];
        segment.data_offset = 6;

        assert_eq!(segment.data_offset, 6);
        let parsed = TcpSegment::from_bytes(&segment.to_bytes()).unwrap();
        assert_eq!(parsed.options.len(), 4);
        assert_eq!(parsed.payload, vec![0xEE]);
    }

    #[test]
    fn test_rejects_bad_offset() {
        let mut bytes = TcpSegment::new(
            TcpPort::new(1),
            TcpPort::new(2),
            0,
            0,
            TcpFlags::ACK,
            0,
            Vec::new(),
        )
        .to_bytes();

        bytes[12] = 4 << 4;
        assert!(TcpSegment::from_bytes(&bytes).is_none());

        bytes[12] = 15 << 4;
        assert!(TcpSegment::from_bytes(&bytes).is_none());
    }

    #[test]
    fn test_checksum_over_pseudo_header() {
        let src = Ipv4Addr::new(192, 168, 1, 20);
        let dst = Ipv4Addr::new(93, 184, 216, 34);
        let segment = TcpSegment::new(
            TcpPort::new(40000),
            TcpPort::HTTP,
            7,
            9,
            TcpFlags::PSH_ACK,
            512,
            b"abc".to_vec(),
        );
        let bytes = segment.to_bytes_with_checksum(src, dst);

        let mut pseudo = Vec::new();
        pseudo.extend_from_slice(&src.octets());
        pseudo.extend_from_slice(&dst.octets());
        pseudo.push(0);
        pseudo.push(6);
        pseudo.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        pseudo.extend_from_slice(&bytes);
        assert!(validate_checksum(&pseudo));
    }
}
