//! Packet Codec (spec component C): frames a [`messages::Message`] inside
//! the fixed 12-byte [`header::PacketHeader`], the `0x505a` preamble +
//! word-length + type token preamble, and a trailing CRC-32.
//!
//! The split between `ParseOutcome::Drop` and `ParseOutcome::Fatal` mirrors
//! `Flight::parse`'s `(Option<Alert>, Option<Error>)` convention in the
//! teacher's handshake FSM: a malformed/unauthenticated packet is usually
//! just dropped and logged (an off-path attacker or reordered duplicate),
//! while a small set of conditions warrant promoting to a protocol `Error`
//! message at the channel layer.

pub mod crc;
pub mod header;
pub mod messages;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::trace;

use crate::algorithm::KeyAgreementAlgorithm;
use crate::error::{Error, Result};
use header::{PacketHeader, MESSAGE_PREAMBLE};
use messages::Message;

/// A fully framed ZRTP packet: transport header, message preamble/type,
/// message body, CRC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub message: Message,
}

/// Distinguishes a recoverable parse failure (silently drop the datagram,
/// per RFC 6189 §5's guidance that malformed or unauthenticated packets are
/// simply ignored) from one that should be surfaced to the caller as worth
/// acting on (e.g. promoting to an `Error` message).
#[derive(Debug)]
pub enum ParseOutcome {
    Ok(Packet),
    Drop(Error),
}

/// Build the `0x505a` preamble + word-length + type token + body for an
/// arbitrary [`Message`], independent of any packet header. Used both by
/// [`Packet::marshal`] and by the channel layer to recompute the exact bytes
/// that went into a previously-sent/received message (e.g. to rebuild the
/// `total_hash` inputs or a message's MAC preimage) without needing to keep
/// a separate raw-byte log around -- marshaling is deterministic, so
/// replaying it from the stored struct is equivalent.
pub fn message_only_bytes(message: &Message) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(32);
    body.write_u16::<BigEndian>(MESSAGE_PREAMBLE).map_err(|_| Error::InvalidMessage)?;
    // word-length placeholder, patched below once the body is known
    body.write_u16::<BigEndian>(0).map_err(|_| Error::InvalidMessage)?;
    body.write_all(&message.type_token()).map_err(|_| Error::InvalidMessage)?;
    message.marshal_body(&mut body)?;

    let word_len = body.len() / 4;
    if word_len * 4 != body.len() {
        return Err(Error::InvalidMessageLength);
    }
    let len_bytes = (word_len as u16).to_be_bytes();
    body[2] = len_bytes[0];
    body[3] = len_bytes[1];
    Ok(body)
}

impl Packet {
    /// Serialize header + `0x505a` preamble + word-length + type token +
    /// body + CRC-32 trailer.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(64);
        self.header.marshal(&mut out)?;
        out.extend_from_slice(&message_only_bytes(&self.message)?);
        let crc = crc::compute(&out);
        out.write_u32::<BigEndian>(crc).map_err(|_| Error::InvalidMessage)?;
        Ok(out)
    }

    /// Parse a raw datagram into a [`Packet`]. Never panics on malformed
    /// input; every failure path returns an [`Error`] rather than
    /// unwinding, so callers can choose to drop or react. `key_agreement`
    /// must be the channel's already-negotiated algorithm when the caller
    /// expects this datagram might be a `DHPart1`/`DHPart2` (its body has no
    /// algorithm field of its own); `None` is fine for every other message
    /// type, and for a first datagram on a channel that hasn't negotiated
    /// anything yet.
    pub fn unmarshal(raw: &[u8], key_agreement: Option<KeyAgreementAlgorithm>) -> std::result::Result<Packet, Error> {
        if raw.len() < PacketHeader::SIZE + 8 + 4 {
            return Err(Error::PacketTooShort);
        }
        if !crc::verify(raw) {
            return Err(Error::InvalidCrc);
        }
        let body_end = raw.len() - 4;
        let mut cursor = &raw[..body_end];

        let header = PacketHeader::unmarshal(&mut cursor)?;

        let preamble = cursor.read_u16::<BigEndian>().map_err(|_| Error::InvalidPreamble)?;
        if preamble != MESSAGE_PREAMBLE {
            return Err(Error::InvalidPreamble);
        }
        let word_len = cursor.read_u16::<BigEndian>().map_err(|_| Error::PacketTooShort)? as usize;
        let mut type_token = [0u8; 8];
        cursor.read_exact(&mut type_token).map_err(|_| Error::PacketTooShort)?;

        let declared_body_bytes = word_len.checked_mul(4).ok_or(Error::InvalidMessageLength)?;
        let consumed_so_far = 2 + 2 + 8; // preamble + length + type token
        let remaining = cursor.len();
        if declared_body_bytes < consumed_so_far || declared_body_bytes - consumed_so_far > remaining {
            return Err(Error::InvalidMessageLength);
        }

        let message = Message::unmarshal_body(&type_token, &mut cursor, key_agreement)?;
        trace!("parsed zrtp message type={:?}", type_token);
        Ok(Packet { header, message })
    }

    /// Same as [`Self::unmarshal`] but categorizes every error as droppable,
    /// matching the "ignore malformed/unauthenticated packets" posture the
    /// channel layer applies before a peer identity has been established.
    pub fn unmarshal_lenient(raw: &[u8], key_agreement: Option<KeyAgreementAlgorithm>) -> ParseOutcome {
        match Self::unmarshal(raw, key_agreement) {
            Ok(packet) => ParseOutcome::Ok(packet),
            Err(e) => ParseOutcome::Drop(e),
        }
    }
}

use std::io::{Read, Write};

#[cfg(test)]
mod tests {
    use super::*;
    use messages::HelloAck;

    #[test]
    fn round_trip_hello_ack() {
        let packet = Packet {
            header: PacketHeader {
                version: 0,
                sequence_number: 7,
                ssrc: 0x1234_5678,
            },
            message: Message::HelloAck(HelloAck),
        };
        let bytes = packet.marshal().unwrap();
        let parsed = Packet::unmarshal(&bytes, None).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn tampered_crc_is_rejected() {
        let packet = Packet {
            header: PacketHeader {
                version: 0,
                sequence_number: 1,
                ssrc: 1,
            },
            message: Message::HelloAck(HelloAck),
        };
        let mut bytes = packet.marshal().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert_eq!(Packet::unmarshal(&bytes, None).unwrap_err(), Error::InvalidCrc);
    }

    #[test]
    fn too_short_is_rejected() {
        assert_eq!(Packet::unmarshal(&[0u8; 4], None).unwrap_err(), Error::PacketTooShort);
    }
}
