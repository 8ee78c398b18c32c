use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// `Confirm1`/`Confirm2` (spec §4.C): an encrypted block (AES-CFB under
/// `zrtpkey_{i,r}`) covering H0, signaling flags, a cache-expiration
/// interval, and any optional sub-blocks, trailed by an HMAC under
/// `mackey_{i,r}` over the ciphertext. The encrypted payload is kept opaque
/// here (`encrypted_body`) -- decryption and the inner H0/flags layout are
/// the channel layer's concern once key material exists, matching the
/// packet codec's job of framing only, never interpreting ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirm {
    pub confirm_mac: [u8; 8],
    pub cfb_iv: [u8; 16],
    pub encrypted_body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmRole {
    Confirm1,
    Confirm2,
}

impl Confirm {
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.confirm_mac).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.cfb_iv).map_err(|_| Error::InvalidMessage)?;
        w.write_u16::<BigEndian>(self.encrypted_body.len() as u16)
            .map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.encrypted_body).map_err(|_| Error::InvalidMessage)?;
        Ok(())
    }

    pub fn unmarshal<R: Read>(r: &mut R) -> Result<Self> {
        let mut confirm_mac = [0u8; 8];
        r.read_exact(&mut confirm_mac).map_err(|_| Error::PacketTooShort)?;
        let mut cfb_iv = [0u8; 16];
        r.read_exact(&mut cfb_iv).map_err(|_| Error::PacketTooShort)?;
        let len = r.read_u16::<BigEndian>().map_err(|_| Error::PacketTooShort)? as usize;
        let mut encrypted_body = vec![0u8; len];
        r.read_exact(&mut encrypted_body).map_err(|_| Error::PacketTooShort)?;
        Ok(Self {
            confirm_mac,
            cfb_iv,
            encrypted_body,
        })
    }
}

/// Plaintext layout of a Confirm body, decrypted/encrypted by the channel
/// layer using the packet codec's [`Confirm::encrypted_body`] as the
/// ciphertext carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmBody {
    pub h0: [u8; 32],
    pub sig_len_words: u16,
    pub flags: u8,
    pub cache_expiration_seconds: u32,
}

impl ConfirmBody {
    pub const ENCODED_LEN: usize = 32 + 2 + 1 + 1 + 4;

    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.h0).map_err(|_| Error::InvalidMessage)?;
        w.write_u16::<BigEndian>(self.sig_len_words).map_err(|_| Error::InvalidMessage)?;
        w.write_u8(self.flags).map_err(|_| Error::InvalidMessage)?;
        w.write_u8(0).map_err(|_| Error::InvalidMessage)?; // reserved
        w.write_u32::<BigEndian>(self.cache_expiration_seconds)
            .map_err(|_| Error::InvalidMessage)?;
        Ok(())
    }

    pub fn unmarshal<R: Read>(r: &mut R) -> Result<Self> {
        let mut h0 = [0u8; 32];
        r.read_exact(&mut h0).map_err(|_| Error::PacketTooShort)?;
        let sig_len_words = r.read_u16::<BigEndian>().map_err(|_| Error::PacketTooShort)?;
        let flags = r.read_u8().map_err(|_| Error::PacketTooShort)?;
        let _reserved = r.read_u8().map_err(|_| Error::PacketTooShort)?;
        let cache_expiration_seconds = r.read_u32::<BigEndian>().map_err(|_| Error::PacketTooShort)?;
        Ok(Self {
            h0,
            sig_len_words,
            flags,
            cache_expiration_seconds,
        })
    }
}

/// `Conf2ACK`: empty body, final handshake acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Conf2Ack;

impl Conf2Ack {
    pub fn marshal<W: Write>(&self, _w: &mut W) -> Result<()> {
        Ok(())
    }

    pub fn unmarshal<R: Read>(_r: &mut R) -> Result<Self> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_round_trip() {
        let confirm = Confirm {
            confirm_mac: [1u8; 8],
            cfb_iv: [2u8; 16],
            encrypted_body: vec![0x55; ConfirmBody::ENCODED_LEN],
        };
        let mut buf = Vec::new();
        confirm.marshal(&mut buf).unwrap();
        assert_eq!(Confirm::unmarshal(&mut &buf[..]).unwrap(), confirm);
    }

    #[test]
    fn confirm_body_round_trip() {
        let body = ConfirmBody {
            h0: [3u8; 32],
            sig_len_words: 0,
            flags: 0b0000_0001,
            cache_expiration_seconds: 3600,
        };
        let mut buf = Vec::new();
        body.marshal(&mut buf).unwrap();
        assert_eq!(buf.len(), ConfirmBody::ENCODED_LEN);
        assert_eq!(ConfirmBody::unmarshal(&mut &buf[..]).unwrap(), body);
    }
}
