use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::algorithm::{
    AuthTagAlgorithm, CipherAlgorithm, HashAlgorithm, KeyAgreementAlgorithm, SasAlgorithm, WireToken,
};
use crate::error::{Error, Result};

/// `Hello` (spec §4.C / §4.D): each side's identity, H3 hash-chain
/// commitment, and five algorithm preference lists. Mirrors
/// `ClientHello`'s `cipher_suites: Vec<CipherSuiteId>` encoding in spirit --
/// a count followed by that many fixed-width codes -- generalized to five
/// such lists back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    /// Protocol version string, RFC 6189 §5.2: "shall be 1.10".
    pub version: [u8; 4],
    pub client_id: [u8; 16],
    pub h3: [u8; 32],
    pub zid: [u8; 12],
    /// `S`: signature-capable. MUST be false when signatures aren't
    /// supported (RFC 6189 §5.2); this implementation never sets it.
    pub signature_capable: bool,
    /// `M`: set by a device (usually a PBX) capable of sending a
    /// `SASrelay`. An `M`-flagged endpoint must never contend for the
    /// initiator role (spec §4.F).
    pub mitm_pbx: bool,
    /// `P`: sent by a device configured to never send `Commit` -- it can
    /// still act as a responder, but never initiates.
    pub passive: bool,
    pub hash_algorithms: Vec<HashAlgorithm>,
    pub cipher_algorithms: Vec<CipherAlgorithm>,
    pub auth_tag_algorithms: Vec<AuthTagAlgorithm>,
    pub key_agreement_algorithms: Vec<KeyAgreementAlgorithm>,
    pub sas_algorithms: Vec<SasAlgorithm>,
    pub mac: [u8; 8],
}

impl Hello {
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        let map = |_: ()| Error::InvalidMessage;
        w.write_all(&self.version).map_err(|_| map(()))?;
        w.write_all(&self.client_id).map_err(|_| map(()))?;
        w.write_all(&self.h3).map_err(|_| map(()))?;
        w.write_all(&self.zid).map_err(|_| map(()))?;
        // RFC 6189 packs S/M/P into spare bits of a larger flags word
        // alongside the five algorithm counts; this codec keeps them in
        // their own byte instead (S=0x01, M=0x02, P=0x04, in the same
        // declared order as bzrtp's `bzrtpHelloMessage_t`), matching the
        // one-count-byte-per-family convention already used below.
        let mut flags = 0u16;
        if self.signature_capable {
            flags |= 0x0001;
        }
        if self.mitm_pbx {
            flags |= 0x0002;
        }
        if self.passive {
            flags |= 0x0004;
        }
        w.write_u16::<BigEndian>(flags).map_err(|_| map(()))?;
        w.write_u8(self.hash_algorithms.len() as u8).map_err(|_| map(()))?;
        w.write_u8(self.cipher_algorithms.len() as u8).map_err(|_| map(()))?;
        w.write_u8(self.auth_tag_algorithms.len() as u8).map_err(|_| map(()))?;
        w.write_u8(self.key_agreement_algorithms.len() as u8).map_err(|_| map(()))?;
        w.write_u8(self.sas_algorithms.len() as u8).map_err(|_| map(()))?;
        for h in &self.hash_algorithms {
            w.write_all(&h.to_wire()).map_err(|_| map(()))?;
        }
        for c in &self.cipher_algorithms {
            w.write_all(&c.to_wire()).map_err(|_| map(()))?;
        }
        for a in &self.auth_tag_algorithms {
            w.write_all(&a.to_wire()).map_err(|_| map(()))?;
        }
        for k in &self.key_agreement_algorithms {
            w.write_all(&k.to_wire()).map_err(|_| map(()))?;
        }
        for s in &self.sas_algorithms {
            w.write_all(&s.to_wire()).map_err(|_| map(()))?;
        }
        w.write_all(&self.mac).map_err(|_| map(()))?;
        Ok(())
    }

    pub fn unmarshal<R: Read>(r: &mut R) -> Result<Self> {
        let mut version = [0u8; 4];
        r.read_exact(&mut version).map_err(|_| Error::PacketTooShort)?;
        let mut client_id = [0u8; 16];
        r.read_exact(&mut client_id).map_err(|_| Error::PacketTooShort)?;
        let mut h3 = [0u8; 32];
        r.read_exact(&mut h3).map_err(|_| Error::PacketTooShort)?;
        let mut zid = [0u8; 12];
        r.read_exact(&mut zid).map_err(|_| Error::PacketTooShort)?;
        let flags = r.read_u16::<BigEndian>().map_err(|_| Error::PacketTooShort)?;
        let signature_capable = flags & 0x0001 != 0;
        let mitm_pbx = flags & 0x0002 != 0;
        let passive = flags & 0x0004 != 0;
        let hc = r.read_u8().map_err(|_| Error::PacketTooShort)? as usize;
        let cc = r.read_u8().map_err(|_| Error::PacketTooShort)? as usize;
        let ac = r.read_u8().map_err(|_| Error::PacketTooShort)? as usize;
        let kc = r.read_u8().map_err(|_| Error::PacketTooShort)? as usize;
        let sc = r.read_u8().map_err(|_| Error::PacketTooShort)? as usize;

        let read_token = |r: &mut R| -> Result<WireToken> {
            let mut tok = [0u8; 4];
            r.read_exact(&mut tok).map_err(|_| Error::PacketTooShort)?;
            Ok(tok)
        };

        let mut hash_algorithms = Vec::with_capacity(hc);
        for _ in 0..hc {
            hash_algorithms.push(HashAlgorithm::from_wire(&read_token(r)?)?);
        }
        let mut cipher_algorithms = Vec::with_capacity(cc);
        for _ in 0..cc {
            cipher_algorithms.push(CipherAlgorithm::from_wire(&read_token(r)?)?);
        }
        let mut auth_tag_algorithms = Vec::with_capacity(ac);
        for _ in 0..ac {
            auth_tag_algorithms.push(AuthTagAlgorithm::from_wire(&read_token(r)?)?);
        }
        let mut key_agreement_algorithms = Vec::with_capacity(kc);
        for _ in 0..kc {
            key_agreement_algorithms.push(KeyAgreementAlgorithm::from_wire(&read_token(r)?)?);
        }
        let mut sas_algorithms = Vec::with_capacity(sc);
        for _ in 0..sc {
            sas_algorithms.push(SasAlgorithm::from_wire(&read_token(r)?)?);
        }
        let mut mac = [0u8; 8];
        r.read_exact(&mut mac).map_err(|_| Error::PacketTooShort)?;

        Ok(Self {
            version,
            client_id,
            h3,
            zid,
            signature_capable,
            mitm_pbx,
            passive,
            hash_algorithms,
            cipher_algorithms,
            auth_tag_algorithms,
            key_agreement_algorithms,
            sas_algorithms,
            mac,
        })
    }
}

impl Hello {
    /// Bytes covered by [`Self::mac`]: this message's framing with `mac`
    /// zeroed, minus the trailing 8 bytes where `mac` itself sits. The
    /// sender HMACs this under its own about-to-be-revealed H2; the
    /// receiver recomputes it once `Commit` reveals that H2.
    pub fn mac_input(&self) -> Result<Vec<u8>> {
        let mut zeroed = self.clone();
        zeroed.mac = [0u8; 8];
        let framed = crate::packet::message_only_bytes(&super::Message::Hello(zeroed))?;
        Ok(framed[..framed.len() - 8].to_vec())
    }
}

/// `HelloACK`: empty body, existence alone acknowledges a `Hello`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HelloAck;

impl HelloAck {
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

    fn sample() -> Hello {
        Hello {
            version: *b"1.10",
            client_id: *b"zrtp-rs/0.1.0   ",
            h3: [7u8; 32],
            zid: [1u8; 12],
            signature_capable: false,
            mitm_pbx: false,
            passive: false,
            hash_algorithms: vec![HashAlgorithm::Sha256],
            cipher_algorithms: vec![CipherAlgorithm::Aes1],
            auth_tag_algorithms: vec![AuthTagAlgorithm::HmacSha132, AuthTagAlgorithm::HmacSha180],
            key_agreement_algorithms: vec![KeyAgreementAlgorithm::Dh3072, KeyAgreementAlgorithm::Multistream],
            sas_algorithms: vec![SasAlgorithm::Base32],
            mac: [9u8; 8],
        }
    }

    #[test]
    fn round_trip() {
        let hello = sample();
        let mut buf = Vec::new();
        hello.marshal(&mut buf).unwrap();
        let parsed = Hello::unmarshal(&mut &buf[..]).unwrap();
        assert_eq!(parsed, hello);
    }
}
