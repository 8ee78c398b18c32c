use std::io::{Read, Write};

use crate::algorithm::{AuthTagAlgorithm, CipherAlgorithm, HashAlgorithm, KeyAgreementAlgorithm, SasAlgorithm};
use crate::error::{Error, Result};

/// `Commit`: H2 commitment plus the single algorithm chosen from each
/// family, either accompanied by `hvi` (DH mode: a hash over the
/// initiator's Hello and DHPart2) or by an explicit responder-supplied SAS
/// hash preimage (preshared/multistream modes carry no `hvi`).
///
/// For a post-quantum/hybrid key agreement, the initiator's KEM public key
/// travels here too (spec §4.C: "for KEM modes: 32 bytes hvi +
/// key-agreement public-value length"), since a KEM is asymmetric -- the
/// side that will decapsulate must publish its public key before the other
/// side can encapsulate against it, unlike classic DH where both sides'
/// public values are independent of each other.
///
/// Multistream/Preshared commits carry no `hvi` (there is no DHPart2 to
/// commit to) but still carry a 16-byte nonce in its place (spec §4.C), so
/// that a genuine Commit/Commit collision between two non-DH channels has
/// something to compare (spec §4.F: "if both are Multistream, the larger
/// nonce wins instead"). Preshared additionally carries an 8-byte key ID
/// identifying which cached shared secret keys the MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub h2: [u8; 32],
    pub zid: [u8; 12],
    pub hash_algorithm: HashAlgorithm,
    pub cipher_algorithm: CipherAlgorithm,
    pub auth_tag_algorithm: AuthTagAlgorithm,
    pub key_agreement_algorithm: KeyAgreementAlgorithm,
    pub sas_algorithm: SasAlgorithm,
    /// Present only when `key_agreement_algorithm` is a DH/KEM type; absent
    /// (all-zero, ignored) for Multistream/Preshared commits.
    pub hvi: Option<[u8; 32]>,
    /// Present only for a post-quantum/hybrid key agreement: the
    /// initiator's KEM public key, which the responder encapsulates
    /// against in `DHPart1`.
    pub kem_public_value: Option<Vec<u8>>,
    /// Present only for Multistream/Preshared commits (absent for DH/KEM,
    /// which carry `hvi` instead).
    pub nonce: Option<[u8; 16]>,
    /// Present only for Preshared commits.
    pub key_id: Option<[u8; 8]>,
    pub mac: [u8; 8],
}

impl Commit {
    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.h2).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.zid).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.hash_algorithm.to_wire()).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.cipher_algorithm.to_wire()).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.auth_tag_algorithm.to_wire()).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.key_agreement_algorithm.to_wire()).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.sas_algorithm.to_wire()).map_err(|_| Error::InvalidMessage)?;
        if self.key_agreement_algorithm.is_non_dh() {
            if self.hvi.is_some() || self.kem_public_value.is_some() {
                return Err(Error::InvalidMessage);
            }
            let nonce = self.nonce.ok_or(Error::InvalidMessage)?;
            w.write_all(&nonce).map_err(|_| Error::InvalidMessage)?;
            if self.key_agreement_algorithm == KeyAgreementAlgorithm::Preshared {
                let key_id = self.key_id.ok_or(Error::InvalidMessage)?;
                w.write_all(&key_id).map_err(|_| Error::InvalidMessage)?;
            } else if self.key_id.is_some() {
                return Err(Error::InvalidMessage);
            }
        } else {
            if self.nonce.is_some() || self.key_id.is_some() {
                return Err(Error::InvalidMessage);
            }
            let hvi = self.hvi.ok_or(Error::InvalidMessage)?;
            w.write_all(&hvi).map_err(|_| Error::InvalidMessage)?;
            if self.key_agreement_algorithm.is_post_quantum() {
                let pv = self.kem_public_value.as_ref().ok_or(Error::InvalidMessage)?;
                let expected = self.key_agreement_algorithm.kem_public_key_len().ok_or(Error::InvalidMessage)?;
                if pv.len() != expected {
                    return Err(Error::InvalidMessage);
                }
                w.write_all(pv).map_err(|_| Error::InvalidMessage)?;
            } else if self.kem_public_value.is_some() {
                return Err(Error::InvalidMessage);
            }
        }
        w.write_all(&self.mac).map_err(|_| Error::InvalidMessage)?;
        Ok(())
    }

    pub fn unmarshal<R: Read>(r: &mut R) -> Result<Self> {
        let mut h2 = [0u8; 32];
        r.read_exact(&mut h2).map_err(|_| Error::PacketTooShort)?;
        let mut zid = [0u8; 12];
        r.read_exact(&mut zid).map_err(|_| Error::PacketTooShort)?;
        let mut tok4 = |r: &mut R| -> Result<[u8; 4]> {
            let mut t = [0u8; 4];
            r.read_exact(&mut t).map_err(|_| Error::PacketTooShort)?;
            Ok(t)
        };
        let hash_algorithm = HashAlgorithm::from_wire(&tok4(r)?)?;
        let cipher_algorithm = CipherAlgorithm::from_wire(&tok4(r)?)?;
        let auth_tag_algorithm = AuthTagAlgorithm::from_wire(&tok4(r)?)?;
        let key_agreement_algorithm = KeyAgreementAlgorithm::from_wire(&tok4(r)?)?;
        let sas_algorithm = SasAlgorithm::from_wire(&tok4(r)?)?;
        let (hvi, kem_public_value, nonce, key_id) = if key_agreement_algorithm.is_non_dh() {
            let mut nonce = [0u8; 16];
            r.read_exact(&mut nonce).map_err(|_| Error::PacketTooShort)?;
            let key_id = if key_agreement_algorithm == KeyAgreementAlgorithm::Preshared {
                let mut id = [0u8; 8];
                r.read_exact(&mut id).map_err(|_| Error::PacketTooShort)?;
                Some(id)
            } else {
                None
            };
            (None, None, Some(nonce), key_id)
        } else {
            let mut hvi = [0u8; 32];
            r.read_exact(&mut hvi).map_err(|_| Error::PacketTooShort)?;
            let kem_public_value = if key_agreement_algorithm.is_post_quantum() {
                // Length is never wire-embedded (spec §9): it is derived
                // bit-exactly from the key-agreement algorithm just parsed
                // above, the same way `examples/original_source/bzrtp`'s
                // `computeKeyAgreementPrivateValueLength` works.
                let expected = key_agreement_algorithm.kem_public_key_len().ok_or(Error::InvalidMessage)?;
                let mut pv = vec![0u8; expected];
                r.read_exact(&mut pv).map_err(|_| Error::PacketTooShort)?;
                Some(pv)
            } else {
                None
            };
            (Some(hvi), kem_public_value, None, None)
        };
        let mut mac = [0u8; 8];
        r.read_exact(&mut mac).map_err(|_| Error::PacketTooShort)?;
        Ok(Self {
            h2,
            zid,
            hash_algorithm,
            cipher_algorithm,
            auth_tag_algorithm,
            key_agreement_algorithm,
            sas_algorithm,
            hvi,
            kem_public_value,
            nonce,
            key_id,
            mac,
        })
    }
}

impl Commit {
    /// Bytes covered by [`Self::mac`] (keyed by H1, revealed by whichever
    /// DHPart unwinds this Commit's H2): framing with `mac` zeroed, minus
    /// the trailing 8 bytes where `mac` sits.
    pub fn mac_input(&self) -> Result<Vec<u8>> {
        let mut zeroed = self.clone();
        zeroed.mac = [0u8; 8];
        let framed = crate::packet::message_only_bytes(&super::Message::Commit(zeroed))?;
        Ok(framed[..framed.len() - 8].to_vec())
    }
}

/// `DHPart1`/`DHPart2` share identical wire shape (spec §4.C): H1 plus MAC
/// keys for the other two messages' verification and the sender's public
/// key-agreement value (DH public number, EC point, or KEM
/// public-key/ciphertext bytes depending on the negotiated algorithm).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhPart {
    pub h1: [u8; 32],
    pub rs1_id: [u8; 8],
    pub rs2_id: [u8; 8],
    pub aux_secret_id: [u8; 8],
    pub pbx_secret_id: [u8; 8],
    pub public_value: Vec<u8>,
    pub mac: [u8; 8],
}

/// Which of the two structurally-identical DHPart messages this is; kept
/// distinct at the [`super::Message`] level so the channel state machine's
/// `match` arms read naturally even though the wire layout is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhPartRole {
    Part1,
    Part2,
}

impl DhPart {
    /// Bytes covered by [`Self::mac`] (keyed by H0, revealed by the later
    /// Confirm message): framing with `mac` zeroed, minus the trailing 8
    /// bytes where `mac` sits. `role` picks `DHPart1`/`DHPart2`'s distinct
    /// type token, since the two are otherwise wire-identical.
    pub fn mac_input(&self, role: DhPartRole) -> Result<Vec<u8>> {
        let mut zeroed = self.clone();
        zeroed.mac = [0u8; 8];
        let message = match role {
            DhPartRole::Part1 => super::Message::DhPart1(zeroed),
            DhPartRole::Part2 => super::Message::DhPart2(zeroed),
        };
        let framed = crate::packet::message_only_bytes(&message)?;
        Ok(framed[..framed.len() - 8].to_vec())
    }

    /// `pv`-length for `(algorithm, role)`, spec.md §4.C/§9: fixed per DH/EC
    /// group; for a KEM/hybrid algorithm, the responder's ciphertext length
    /// in DHPart1 and a fixed 32-byte nonce in DHPart2 (the initiator
    /// already published its public key in `Commit`). Never read off the
    /// wire -- this is the only legitimate source of the length, matching
    /// `examples/original_source/bzrtp/src/packetParser.c`'s
    /// `computeKeyAgreementPrivateValueLength`.
    fn expected_len(algorithm: KeyAgreementAlgorithm, role: DhPartRole) -> Result<usize> {
        if let Some(len) = algorithm.classic_pv_len() {
            return Ok(len);
        }
        if algorithm.is_post_quantum() {
            return Ok(match role {
                DhPartRole::Part1 => algorithm.kem_ciphertext_len().ok_or(Error::InvalidContext)?,
                DhPartRole::Part2 => 32,
            });
        }
        Err(Error::InvalidContext)
    }

    pub fn marshal<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&self.h1).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.rs1_id).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.rs2_id).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.aux_secret_id).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.pbx_secret_id).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.public_value).map_err(|_| Error::InvalidMessage)?;
        w.write_all(&self.mac).map_err(|_| Error::InvalidMessage)?;
        Ok(())
    }

    /// `algorithm`/`role` are supplied by the channel state machine from its
    /// already-negotiated algorithm set, never taken from this message's own
    /// bytes (it carries no algorithm field at all).
    pub fn unmarshal<R: Read>(r: &mut R, algorithm: KeyAgreementAlgorithm, role: DhPartRole) -> Result<Self> {
        let mut h1 = [0u8; 32];
        r.read_exact(&mut h1).map_err(|_| Error::PacketTooShort)?;
        let mut read8 = |r: &mut R| -> Result<[u8; 8]> {
            let mut b = [0u8; 8];
            r.read_exact(&mut b).map_err(|_| Error::PacketTooShort)?;
            Ok(b)
        };
        let rs1_id = read8(r)?;
        let rs2_id = read8(r)?;
        let aux_secret_id = read8(r)?;
        let pbx_secret_id = read8(r)?;
        let expected = Self::expected_len(algorithm, role)?;
        let mut public_value = vec![0u8; expected];
        r.read_exact(&mut public_value).map_err(|_| Error::PacketTooShort)?;
        let mut mac = [0u8; 8];
        r.read_exact(&mut mac).map_err(|_| Error::PacketTooShort)?;
        Ok(Self {
            h1,
            rs1_id,
            rs2_id,
            aux_secret_id,
            pbx_secret_id,
            public_value,
            mac,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_round_trip_dh_mode() {
        let commit = Commit {
            h2: [1u8; 32],
            zid: [2u8; 12],
            hash_algorithm: HashAlgorithm::Sha256,
            cipher_algorithm: CipherAlgorithm::Aes1,
            auth_tag_algorithm: AuthTagAlgorithm::HmacSha132,
            key_agreement_algorithm: KeyAgreementAlgorithm::Dh3072,
            sas_algorithm: SasAlgorithm::Base32,
            hvi: Some([3u8; 32]),
            kem_public_value: None,
            nonce: None,
            key_id: None,
            mac: [4u8; 8],
        };
        let mut buf = Vec::new();
        commit.marshal(&mut buf).unwrap();
        assert_eq!(Commit::unmarshal(&mut &buf[..]).unwrap(), commit);
    }

    #[test]
    fn commit_round_trip_multistream_mode() {
        let commit = Commit {
            h2: [1u8; 32],
            zid: [2u8; 12],
            hash_algorithm: HashAlgorithm::Sha256,
            cipher_algorithm: CipherAlgorithm::Aes1,
            auth_tag_algorithm: AuthTagAlgorithm::HmacSha132,
            key_agreement_algorithm: KeyAgreementAlgorithm::Multistream,
            sas_algorithm: SasAlgorithm::Base32,
            hvi: None,
            kem_public_value: None,
            nonce: Some([6u8; 16]),
            key_id: None,
            mac: [4u8; 8],
        };
        let mut buf = Vec::new();
        commit.marshal(&mut buf).unwrap();
        assert_eq!(Commit::unmarshal(&mut &buf[..]).unwrap(), commit);
    }

    #[test]
    fn commit_round_trip_preshared_mode() {
        let commit = Commit {
            h2: [1u8; 32],
            zid: [2u8; 12],
            hash_algorithm: HashAlgorithm::Sha256,
            cipher_algorithm: CipherAlgorithm::Aes1,
            auth_tag_algorithm: AuthTagAlgorithm::HmacSha132,
            key_agreement_algorithm: KeyAgreementAlgorithm::Preshared,
            sas_algorithm: SasAlgorithm::Base32,
            hvi: None,
            kem_public_value: None,
            nonce: Some([8u8; 16]),
            key_id: Some([5u8; 8]),
            mac: [4u8; 8],
        };
        let mut buf = Vec::new();
        commit.marshal(&mut buf).unwrap();
        assert_eq!(Commit::unmarshal(&mut &buf[..]).unwrap(), commit);
    }

    #[test]
    fn commit_round_trip_kem_mode() {
        let commit = Commit {
            h2: [1u8; 32],
            zid: [2u8; 12],
            hash_algorithm: HashAlgorithm::Sha512,
            cipher_algorithm: CipherAlgorithm::Aes3,
            auth_tag_algorithm: AuthTagAlgorithm::HmacSha132,
            key_agreement_algorithm: KeyAgreementAlgorithm::Kyber768,
            sas_algorithm: SasAlgorithm::Base32,
            hvi: Some([7u8; 32]),
            kem_public_value: Some(vec![0x42; 1184]),
            nonce: None,
            key_id: None,
            mac: [4u8; 8],
        };
        let mut buf = Vec::new();
        commit.marshal(&mut buf).unwrap();
        assert_eq!(Commit::unmarshal(&mut &buf[..]).unwrap(), commit);
    }

    #[test]
    fn dhpart_round_trip() {
        let part = DhPart {
            h1: [5u8; 32],
            rs1_id: [1u8; 8],
            rs2_id: [2u8; 8],
            aux_secret_id: [3u8; 8],
            pbx_secret_id: [4u8; 8],
            public_value: vec![0xaa; 384],
            mac: [9u8; 8],
        };
        let mut buf = Vec::new();
        part.marshal(&mut buf).unwrap();
        let parsed = DhPart::unmarshal(&mut &buf[..], KeyAgreementAlgorithm::Dh3072, DhPartRole::Part1).unwrap();
        assert_eq!(parsed, part);
    }

    #[test]
    fn dhpart_round_trip_kem_ciphertext_and_nonce() {
        let part1 = DhPart {
            h1: [5u8; 32],
            rs1_id: [1u8; 8],
            rs2_id: [2u8; 8],
            aux_secret_id: [3u8; 8],
            pbx_secret_id: [4u8; 8],
            public_value: vec![0x11; 1088],
            mac: [9u8; 8],
        };
        let mut buf = Vec::new();
        part1.marshal(&mut buf).unwrap();
        let parsed = DhPart::unmarshal(&mut &buf[..], KeyAgreementAlgorithm::Kyber768, DhPartRole::Part1).unwrap();
        assert_eq!(parsed, part1);

        let part2 = DhPart {
            public_value: vec![0x22; 32],
            ..part1
        };
        let mut buf = Vec::new();
        part2.marshal(&mut buf).unwrap();
        let parsed = DhPart::unmarshal(&mut &buf[..], KeyAgreementAlgorithm::Kyber768, DhPartRole::Part2).unwrap();
        assert_eq!(parsed, part2);
    }
}
