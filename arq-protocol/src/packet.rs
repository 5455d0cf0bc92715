//! Packet Structures and Serialization
//!
//! This module implements the wire packet format, a 4-byte header followed
//! by the payload:
//!
//! ```text
//! |<-  2 bytes ->|<-   1 byte   ->|<-        1 byte        ->|<- payload ->|
//! |<- checksum ->| payload length | seq (7 bits) + last flag |    bytes    |
//! ```
//!
//! The checksum is a CRC-16 over everything after the checksum field itself
//! (little-endian on the wire). Bit 7 of the sequence byte marks the final
//! fragment of a message. Acknowledgments reuse the same layout with a zero
//! payload length; their sequence field carries the highest contiguously
//! received sequence number.

use crate::checksum::crc16;
use crate::sequence::SeqNumber;
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the packet header in bytes (checksum + length + sequence)
pub const HEADER_SIZE: usize = 4;

/// Total capacity of a wire packet in bytes
pub const PACKET_SIZE: usize = 128;

/// Maximum payload a single packet can carry
pub const MAX_PAYLOAD_SIZE: usize = PACKET_SIZE - HEADER_SIZE;

/// Last-fragment flag (bit 7 of the sequence byte)
const LAST_FLAG: u8 = 0x80;

/// Mask for the sequence number value (bits 0-6)
const SEQ_MASK: u8 = 0x7F;

/// Packet parsing and validation errors
#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Checksum mismatch: embedded {embedded:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { embedded: u16, computed: u16 },

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Empty payload")]
    EmptyPayload,
}

/// Data packet: one fragment of an application message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Sequence number of this fragment
    pub seq: SeqNumber,
    /// Whether this is the final fragment of its message
    pub last: bool,
    /// Fragment payload
    pub payload: Bytes,
}

impl DataPacket {
    /// Create a new data packet
    ///
    /// # Errors
    /// Fails if the payload is empty or exceeds [`MAX_PAYLOAD_SIZE`].
    pub fn new(seq: SeqNumber, last: bool, payload: Bytes) -> Result<Self, PacketError> {
        if payload.is_empty() {
            return Err(PacketError::EmptyPayload);
        }
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(DataPacket { seq, last, payload })
    }

    /// Total size of the packet on the wire
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize the packet, computing and embedding the checksum
    pub fn to_bytes(&self) -> BytesMut {
        let mut seq_byte = self.seq.as_raw();
        if self.last {
            seq_byte |= LAST_FLAG;
        }
        encode_frame(self.payload.len() as u8, seq_byte, &self.payload)
    }
}

/// Acknowledgment packet: cumulative ack up to and including `seq`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPacket {
    /// Highest contiguously received sequence number
    pub seq: SeqNumber,
}

impl AckPacket {
    /// Create a new acknowledgment
    pub fn new(seq: SeqNumber) -> Self {
        AckPacket { seq }
    }

    /// Total size of the packet on the wire
    pub fn size(&self) -> usize {
        HEADER_SIZE
    }

    /// Serialize the acknowledgment (zero payload length)
    pub fn to_bytes(&self) -> BytesMut {
        encode_frame(0, self.seq.as_raw(), &[])
    }
}

fn encode_frame(len_byte: u8, seq_byte: u8, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_u16_le(0); // checksum placeholder
    buf.put_u8(len_byte);
    buf.put_u8(seq_byte);
    buf.put_slice(payload);
    let crc = crc16(&buf[2..]);
    buf[..2].copy_from_slice(&crc.to_le_bytes());
    buf
}

/// Unified packet type (either data or acknowledgment)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Data(DataPacket),
    Ack(AckPacket),
}

impl Packet {
    /// Check if this is a data packet
    pub fn is_data(&self) -> bool {
        matches!(self, Packet::Data(_))
    }

    /// Check if this is an acknowledgment
    pub fn is_ack(&self) -> bool {
        matches!(self, Packet::Ack(_))
    }

    /// Total size of the packet on the wire
    pub fn size(&self) -> usize {
        match self {
            Packet::Data(p) => p.size(),
            Packet::Ack(p) => p.size(),
        }
    }

    /// Serialize the packet to bytes
    pub fn to_bytes(&self) -> BytesMut {
        match self {
            Packet::Data(p) => p.to_bytes(),
            Packet::Ack(p) => p.to_bytes(),
        }
    }

    /// Parse a packet from bytes, validating the checksum before trusting
    /// any other field
    ///
    /// A zero payload length decodes as an acknowledgment; anything else is
    /// a data packet. Trailing bytes beyond the declared payload length are
    /// ignored (the wire carries fixed-size packet buffers).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_SIZE {
            return Err(PacketError::InsufficientData {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let embedded = u16::from_le_bytes([bytes[0], bytes[1]]);
        let len = usize::from(bytes[2]);
        if bytes.len() < HEADER_SIZE + len {
            return Err(PacketError::InsufficientData {
                expected: HEADER_SIZE + len,
                actual: bytes.len(),
            });
        }

        // Checksum covers the length byte, the sequence byte and the payload
        let computed = crc16(&bytes[2..HEADER_SIZE + len]);
        if computed != embedded {
            return Err(PacketError::ChecksumMismatch { embedded, computed });
        }

        let seq = SeqNumber::new_unchecked(bytes[3] & SEQ_MASK);
        if len == 0 {
            return Ok(Packet::Ack(AckPacket::new(seq)));
        }
        if len > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Packet::Data(DataPacket {
            seq,
            last: bytes[3] & LAST_FLAG != 0,
            payload: Bytes::copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + len]),
        }))
    }
}
