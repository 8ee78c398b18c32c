use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Protocol-level error codes (spec §10 supplement), RFC 6189 §5.9 Table 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    MalformedPacket,
    CriticalSoftwareError,
    UnsupportedVersion,
    HelloComponentsMismatch,
    UnsupportedHashAlgorithm,
    UnsupportedCipherAlgorithm,
    UnsupportedAuthTagAlgorithm,
    UnsupportedKeyAgreementAlgorithm,
    UnsupportedSasAlgorithm,
    NoSharedSecretAvailable,
    DhErrorWrongPv,
    DhErrorWrongHvi,
    ReceivedRs2ButNoMatchingCache,
    SasMismatch,
    ServiceUnavailable,
    RetryTimeoutExpired,
    GoClearMessageReceivedWithoutPrior,
    Unknown(u32),
}

impl ErrorCode {
    pub fn to_wire(self) -> u32 {
        match self {
            ErrorCode::MalformedPacket => 0x10,
            ErrorCode::CriticalSoftwareError => 0x20,
            ErrorCode::UnsupportedVersion => 0x30,
            ErrorCode::HelloComponentsMismatch => 0x40,
            ErrorCode::UnsupportedHashAlgorithm => 0x51,
            ErrorCode::UnsupportedCipherAlgorithm => 0x52,
            ErrorCode::UnsupportedAuthTagAlgorithm => 0x53,
            ErrorCode::UnsupportedKeyAgreementAlgorithm => 0x54,
            ErrorCode::UnsupportedSasAlgorithm => 0x55,
            ErrorCode::NoSharedSecretAvailable => 0x61,
            ErrorCode::DhErrorWrongPv => 0x62,
            ErrorCode::DhErrorWrongHvi => 0x63,
            ErrorCode::ReceivedRs2ButNoMatchingCache => 0x64,
            ErrorCode::SasMismatch => 0x65,
            ErrorCode::ServiceUnavailable => 0x70,
            ErrorCode::RetryTimeoutExpired => 0x80,
            ErrorCode::GoClearMessageReceivedWithoutPrior => 0x90,
            ErrorCode::Unknown(code) => code,
        }
    }

    pub fn from_wire(code: u32) -> Self {
        match code {
            0x10 => ErrorCode::MalformedPacket,
            0x20 => ErrorCode::CriticalSoftwareError,
            0x30 => ErrorCode::UnsupportedVersion,
            0x40 => ErrorCode::HelloComponentsMismatch,
            0x51 => ErrorCode::UnsupportedHashAlgorithm,
            0x52 => ErrorCode::UnsupportedCipherAlgorithm,
            0x53 => ErrorCode::UnsupportedAuthTagAlgorithm,
            0x54 => ErrorCode::UnsupportedKeyAgreementAlgorithm,
            0x55 => ErrorCode::UnsupportedSasAlgorithm,
            0x61 => ErrorCode::NoSharedSecretAvailable,
            0x62 => ErrorCode::DhErrorWrongPv,
            0x63 => ErrorCode::DhErrorWrongHvi,
            0x64 => ErrorCode::ReceivedRs2ButNoMatchingCache,
            0x65 => ErrorCode::SasMismatch,
            0x70 => ErrorCode::ServiceUnavailable,
            0x80 => ErrorCode::RetryTimeoutExpired,
            0x90 => ErrorCode::GoClearMessageReceivedWithoutPrior,
            other => ErrorCode::Unknown(other),
        }
    }
}

macro_rules! empty_message {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl $name {
            pub fn marshal<W: Write>(&self, _w: &mut W) -> Result<()> {
                Ok(())
            }

            pub fn unmarshal<R: Read>(_r: &mut R) -> Result<Self> {
                Ok(Self)
            }
        }
    };
}

/// `Error`: sent when a channel aborts the handshake; carries a single
/// [`ErrorCode`] explaining why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMessage {
    pub code: ErrorCode,
}

impl ErrorMessage {
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<BigEndian>(self.code.to_wire()).map_err(|_| Error::InvalidMessage)
    }

    pub fn unmarshal<R: Read>(r: &mut R) -> Result<Self> {
        let code = r.read_u32::<BigEndian>().map_err(|_| Error::PacketTooShort)?;
        Ok(Self {
            code: ErrorCode::from_wire(code),
        })
    }
}

empty_message!(ErrorAck);

/// `GoClear`: request to transition an established secure channel to clear
/// (unencrypted) mode; carries an HMAC proving possession of the session
/// key so an attacker cannot force a downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoClear {
    pub clear_mac: [u8; 8],
}

impl GoClear {
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.clear_mac).map_err(|_| Error::InvalidMessage)
    }

    pub fn unmarshal<R: Read>(r: &mut R) -> Result<Self> {
        let mut clear_mac = [0u8; 8];
        r.read_exact(&mut clear_mac).map_err(|_| Error::PacketTooShort)?;
        Ok(Self { clear_mac })
    }
}

empty_message!(ClearAck);

/// `SASrelay`: sent by a trusted PBX/MitM-aware relay to convey a verified
/// SAS to a channel that cannot otherwise verify one directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasRelay {
    pub relay_mac: [u8; 8],
    pub cfb_iv: [u8; 16],
    pub encrypted_body: Vec<u8>,
}

impl SasRelay {
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.relay_mac).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.cfb_iv).map_err(|_| Error::InvalidMessage)?;
        w.write_u16::<BigEndian>(self.encrypted_body.len() as u16)
            .map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.encrypted_body).map_err(|_| Error::InvalidMessage)?;
        Ok(())
    }

    pub fn unmarshal<R: Read>(r: &mut R) -> Result<Self> {
        let mut relay_mac = [0u8; 8];
        r.read_exact(&mut relay_mac).map_err(|_| Error::PacketTooShort)?;
        let mut cfb_iv = [0u8; 16];
        r.read_exact(&mut cfb_iv).map_err(|_| Error::PacketTooShort)?;
        let len = r.read_u16::<BigEndian>().map_err(|_| Error::PacketTooShort)? as usize;
        let mut encrypted_body = vec![0u8; len];
        r.read_exact(&mut encrypted_body).map_err(|_| Error::PacketTooShort)?;
        Ok(Self {
            relay_mac,
            cfb_iv,
            encrypted_body,
        })
    }
}

empty_message!(RelayAck);

/// `Ping`: stateless liveness probe, answered unconditionally regardless of
/// channel state (spec §10 supplement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub version: [u8; 4],
    pub ep_hash: [u8; 8],
}

impl Ping {
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.version).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.ep_hash).map_err(|_| Error::InvalidMessage)?;
        Ok(())
    }

    pub fn unmarshal<R: Read>(r: &mut R) -> Result<Self> {
        let mut version = [0u8; 4];
        r.read_exact(&mut version).map_err(|_| Error::PacketTooShort)?;
        let mut ep_hash = [0u8; 8];
        r.read_exact(&mut ep_hash).map_err(|_| Error::PacketTooShort)?;
        Ok(Self { version, ep_hash })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingAck {
    pub version: [u8; 4],
    pub sender_ep_hash: [u8; 8],
    pub receiver_ep_hash: [u8; 8],
    pub ssrc: u32,
}

impl PingAck {
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.version).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.sender_ep_hash).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.receiver_ep_hash).map_err(|_| Error::InvalidMessage)?;
        w.write_u32::<BigEndian>(self.ssrc).map_err(|_| Error::InvalidMessage)?;
        Ok(())
    }

    pub fn unmarshal<R: Read>(r: &mut R) -> Result<Self> {
        let mut version = [0u8; 4];
        r.read_exact(&mut version).map_err(|_| Error::PacketTooShort)?;
        let mut sender_ep_hash = [0u8; 8];
        r.read_exact(&mut sender_ep_hash).map_err(|_| Error::PacketTooShort)?;
        let mut receiver_ep_hash = [0u8; 8];
        r.read_exact(&mut receiver_ep_hash).map_err(|_| Error::PacketTooShort)?;
        let ssrc = r.read_u32::<BigEndian>().map_err(|_| Error::PacketTooShort)?;
        Ok(Self {
            version,
            sender_ep_hash,
            receiver_ep_hash,
            ssrc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_round_trip() {
        for code in [
            ErrorCode::MalformedPacket,
            ErrorCode::SasMismatch,
            ErrorCode::RetryTimeoutExpired,
        ] {
            assert_eq!(ErrorCode::from_wire(code.to_wire()), code);
        }
    }

    #[test]
    fn error_message_round_trip() {
        let msg = ErrorMessage {
            code: ErrorCode::DhErrorWrongHvi,
        };
        let mut buf = Vec::new();
        msg.marshal(&mut buf).unwrap();
        assert_eq!(ErrorMessage::unmarshal(&mut &buf[..]).unwrap(), msg);
    }

    #[test]
    fn ping_round_trip() {
        let ping = Ping {
            version: *b"1.10",
            ep_hash: [7u8; 8],
        };
        let mut buf = Vec::new();
        ping.marshal(&mut buf).unwrap();
        assert_eq!(Ping::unmarshal(&mut &buf[..]).unwrap(), ping);
    }
}
