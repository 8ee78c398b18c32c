use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// ZRTP's magic cookie, RFC 6189 §5: the 4 bytes that distinguish a ZRTP
/// packet from an ordinary RTP packet sharing the same UDP port.
pub const ZRTP_MAGIC_COOKIE: u32 = 0x5a52_5450;

/// Fixed 12-byte packet header preceding every ZRTP message (spec §4.C),
/// mirrored on `dtls::handshake::HandshakeHeader`'s marshal/unmarshal shape:
/// fixed-width fields read/written in declaration order via `byteorder`.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct PacketHeader {
    /// High nibble of the first byte; RFC 6189 fixes this at 0 for the
    /// current protocol version.
    pub version: u8,
    pub sequence_number: u16,
    pub ssrc: u32,
}

impl PacketHeader {
    pub const SIZE: usize = 12;

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer
            .write_u16::<BigEndian>(0x1000 | (self.version as u16 & 0x0f))
            .map_err(|_| Error::InvalidMessage)?;
        writer
            .write_u16::<BigEndian>(self.sequence_number)
            .map_err(|_| Error::InvalidMessage)?;
        writer
            .write_u32::<BigEndian>(ZRTP_MAGIC_COOKIE)
            .map_err(|_| Error::InvalidMessage)?;
        writer
            .write_u32::<BigEndian>(self.ssrc)
            .map_err(|_| Error::InvalidMessage)?;
        Ok(())
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let first = reader.read_u16::<BigEndian>().map_err(|_| Error::PacketTooShort)?;
        if first >> 12 != 0x1 {
            return Err(Error::InvalidVersion);
        }
        let version = (first & 0x0f) as u8;
        let sequence_number = reader.read_u16::<BigEndian>().map_err(|_| Error::PacketTooShort)?;
        let cookie = reader.read_u32::<BigEndian>().map_err(|_| Error::PacketTooShort)?;
        if cookie != ZRTP_MAGIC_COOKIE {
            return Err(Error::InvalidMagicCookie);
        }
        let ssrc = reader.read_u32::<BigEndian>().map_err(|_| Error::PacketTooShort)?;
        Ok(Self {
            version,
            sequence_number,
            ssrc,
        })
    }
}

/// The 8-byte message-type token preceding every message body, preceded in
/// turn by the 2-byte `0x505a` preamble and a 2-byte word-length. Stored
/// space-padded like the algorithm wire tokens in [`crate::algorithm`].
pub type MessageTypeToken = [u8; 8];

pub const MESSAGE_PREAMBLE: u16 = 0x505a;

pub(crate) fn pad8(s: &str) -> MessageTypeToken {
    let mut out = [b' '; 8];
    let bytes = s.as_bytes();
    let n = bytes.len().min(8);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

pub(crate) fn trimmed8(token: &MessageTypeToken) -> &str {
    let len = token.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    std::str::from_utf8(&token[..len]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = PacketHeader {
            version: 0,
            sequence_number: 42,
            ssrc: 0xdead_beef,
        };
        let mut buf = Vec::new();
        header.marshal(&mut buf).unwrap();
        assert_eq!(buf.len(), PacketHeader::SIZE);
        let parsed = PacketHeader::unmarshal(&mut &buf[..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn rejects_bad_cookie() {
        let mut buf = vec![0x10, 0x00, 0x00, 0x01, 0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0];
        buf[4..8].copy_from_slice(&0x1234_5678u32.to_be_bytes());
        let err = PacketHeader::unmarshal(&mut &buf[..]).unwrap_err();
        assert_eq!(err, Error::InvalidMagicCookie);
    }
}
