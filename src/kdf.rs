//! KDF & Key Schedule (spec component E): RFC 6189 §4.5's counter-mode
//! HMAC construction, `KDF(KI, Label, Context, L) = HMAC(KI, i || Label ||
//! 0x00 || Context || L)[0:L]` with a fixed 32-bit big-endian counter of 1.
//!
//! Structurally grounded on `dtls::prf::prf_p_hash`: both are "HMAC over a
//! label/seed, truncate to the requested length" constructions; the byte
//! layout here follows RFC 6189 exactly rather than TLS's P_hash since the
//! two specs define genuinely different inputs.

use byteorder::{BigEndian, WriteBytesExt};
use zeroize::Zeroizing;

use crate::algorithm::HashAlgorithm;
use crate::primitives::Backend;

/// `KDF(ki, label, context, l)`, spec §4.E. `l` is in bytes; RFC 6189
/// expresses the last field in bits, handled internally.
pub fn kdf(backend: &dyn Backend, hash: HashAlgorithm, ki: &[u8], label: &[u8], context: &[u8], l: usize) -> Zeroizing<Vec<u8>> {
    let mut data = Vec::with_capacity(4 + label.len() + 1 + context.len() + 4);
    data.write_u32::<BigEndian>(1).expect("Vec write cannot fail");
    data.extend_from_slice(label);
    data.push(0);
    data.extend_from_slice(context);
    data.write_u32::<BigEndian>((l as u32) * 8).expect("Vec write cannot fail");

    let mut out = backend.hmac(hash, ki, &data);
    out.truncate(l);
    while out.len() < l {
        out.push(0); // HMAC output never shorter than l in practice; defensive pad only.
    }
    Zeroizing::new(out)
}

/// Labels used by the key schedule (RFC 6189 §4.5.1, Table 3/4), kept as
/// `&'static [u8]` constants so callers never typo a label string.
pub mod labels {
    pub const ZRTP_SESSION_KEY: &[u8] = b"ZRTP Session Key";
    pub const ZRTP_MSK: &[u8] = b"ZRTP Multistream Key";
    pub const INITIATOR_SRTP_MASTER_KEY: &[u8] = b"Initiator SRTP master key";
    pub const INITIATOR_SRTP_MASTER_SALT: &[u8] = b"Initiator SRTP master salt";
    pub const RESPONDER_SRTP_MASTER_KEY: &[u8] = b"Responder SRTP master key";
    pub const RESPONDER_SRTP_MASTER_SALT: &[u8] = b"Responder SRTP master salt";
    pub const INITIATOR_MAC_KEY: &[u8] = b"Initiator HMAC key";
    pub const RESPONDER_MAC_KEY: &[u8] = b"Responder HMAC key";
    pub const INITIATOR_ZRTP_KEY: &[u8] = b"Initiator ZRTP key";
    pub const RESPONDER_ZRTP_KEY: &[u8] = b"Responder ZRTP key";
    pub const SAS: &[u8] = b"SAS";
    pub const RETAINED_SECRET: &[u8] = b"retained secret";
}

/// Key material derived at the end of a successful DH (or KEM, or hybrid)
/// exchange on channel 0: the seed (`s0`) and the per-direction MAC/ZRTP
/// keys used to authenticate and decrypt Confirm1/Confirm2, plus the
/// session key later used to bootstrap Multistream/Preshared channels.
pub struct KeySchedule {
    pub s0: Zeroizing<Vec<u8>>,
    pub zrtp_sess_key: Zeroizing<Vec<u8>>,
    pub mac_key_initiator: Zeroizing<Vec<u8>>,
    pub mac_key_responder: Zeroizing<Vec<u8>>,
    pub zrtp_key_initiator: Zeroizing<Vec<u8>>,
    pub zrtp_key_responder: Zeroizing<Vec<u8>>,
}

impl KeySchedule {
    /// Derive every per-direction key from an already-computed `s0` in one
    /// pass (spec §4.E). `hash_len` is the negotiated hash's digest size,
    /// used as both the MAC-key and ZRTP-key lengths per RFC 6189.
    pub fn derive_from_s0(backend: &dyn Backend, hash: HashAlgorithm, s0: Zeroizing<Vec<u8>>, kdf_context: &[u8]) -> Self {
        let hash_len = hash.digest_size();
        let zrtp_sess_key = kdf(backend, hash, &s0, labels::ZRTP_SESSION_KEY, kdf_context, hash_len);
        let mac_key_initiator = kdf(backend, hash, &s0, labels::INITIATOR_MAC_KEY, kdf_context, hash_len);
        let mac_key_responder = kdf(backend, hash, &s0, labels::RESPONDER_MAC_KEY, kdf_context, hash_len);
        let zrtp_key_initiator = kdf(backend, hash, &s0, labels::INITIATOR_ZRTP_KEY, kdf_context, hash_len);
        let zrtp_key_responder = kdf(backend, hash, &s0, labels::RESPONDER_ZRTP_KEY, kdf_context, hash_len);
        Self {
            s0,
            zrtp_sess_key,
            mac_key_initiator,
            mac_key_responder,
            zrtp_key_initiator,
            zrtp_key_responder,
        }
    }

    /// Channel 0's full derivation (spec §4.E step 4): combine the raw
    /// DH/KEM result with whichever retained/auxiliary/PBX secrets are in
    /// play into `s0`, then fan `s0` out into the per-direction keys.
    /// `s1` is the retained secret (RS1, falling back to RS2) looked up by
    /// peer ZID; `s2`/`s3` (auxiliary and PBX secrets) have no source in
    /// this implementation and are always `None` -- see DESIGN.md.
    #[allow(clippy::too_many_arguments)]
    pub fn derive_channel0(
        backend: &dyn Backend,
        hash: HashAlgorithm,
        dh_result: &[u8],
        kdf_context: &[u8],
        s1: Option<&[u8]>,
        s2: Option<&[u8]>,
        s3: Option<&[u8]>,
    ) -> Self {
        let s0 = derive_s0(backend, hash, dh_result, kdf_context, s1, s2, s3);
        Self::derive_from_s0(backend, hash, s0, kdf_context)
    }

    /// A channel added after channel 0 (Multistream, spec §4.G): `s0` is
    /// derived straight from the session's `zrtp_sess_key`, no DH/KEM
    /// exchange and no retained-secret combiner.
    pub fn derive_multistream(backend: &dyn Backend, hash: HashAlgorithm, zrtp_sess_key: &[u8], kdf_context: &[u8]) -> Self {
        let s0 = kdf(backend, hash, zrtp_sess_key, labels::ZRTP_MSK, kdf_context, hash.digest_size());
        Self::derive_from_s0(backend, hash, s0, kdf_context)
    }
}

/// The s0 combiner (RFC 6189 §4.4.1.4): `s0 = H(counter || DHResult ||
/// "ZRTP-HMAC-KDF" || len(s1)||s1 || len(s2)||s2 || len(s3)||s3 ||
/// KDF_Context)`, each length a 32-bit big-endian byte count and each
/// secret's bytes omitted entirely (length `0`) when that slot is absent.
/// `KDF_Context = ZIDi||ZIDr||total_hash` binds `s0` to both parties' ZIDs
/// and the handshake transcript -- the property that makes a MiTM's
/// negotiated `s0` diverge from the genuine peers' even if it relayed
/// every message byte for byte.
fn derive_s0(backend: &dyn Backend, hash: HashAlgorithm, dh_result: &[u8], kdf_context: &[u8], s1: Option<&[u8]>, s2: Option<&[u8]>, s3: Option<&[u8]>) -> Zeroizing<Vec<u8>> {
    let mut data = Vec::with_capacity(4 + dh_result.len() + 16 + 12 + kdf_context.len());
    data.write_u32::<BigEndian>(1).expect("Vec write cannot fail");
    data.extend_from_slice(dh_result);
    data.extend_from_slice(b"ZRTP-HMAC-KDF");
    for secret in [s1, s2, s3] {
        let bytes = secret.unwrap_or(&[]);
        data.write_u32::<BigEndian>(bytes.len() as u32).expect("Vec write cannot fail");
        data.extend_from_slice(bytes);
    }
    data.extend_from_slice(kdf_context);
    Zeroizing::new(backend.hash(hash, &data))
}

/// SRTP key/salt material handed to the host via
/// `Callbacks::srtp_secrets_available` (spec component G).
pub struct SrtpKeys {
    pub initiator_key: Zeroizing<Vec<u8>>,
    pub initiator_salt: Zeroizing<Vec<u8>>,
    pub responder_key: Zeroizing<Vec<u8>>,
    pub responder_salt: Zeroizing<Vec<u8>>,
}

impl SrtpKeys {
    pub fn derive(backend: &dyn Backend, hash: HashAlgorithm, cipher_key_len: usize, zrtp_sess_key: &[u8], kdf_context: &[u8]) -> Self {
        const SALT_LEN: usize = 14;
        Self {
            initiator_key: kdf(backend, hash, zrtp_sess_key, labels::INITIATOR_SRTP_MASTER_KEY, kdf_context, cipher_key_len),
            initiator_salt: kdf(backend, hash, zrtp_sess_key, labels::INITIATOR_SRTP_MASTER_SALT, kdf_context, SALT_LEN),
            responder_key: kdf(backend, hash, zrtp_sess_key, labels::RESPONDER_SRTP_MASTER_KEY, kdf_context, cipher_key_len),
            responder_salt: kdf(backend, hash, zrtp_sess_key, labels::RESPONDER_SRTP_MASTER_SALT, kdf_context, SALT_LEN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::RustCryptoBackend;

    #[test]
    fn kdf_output_is_requested_length() {
        let backend = RustCryptoBackend::default();
        let out = kdf(&backend, HashAlgorithm::Sha256, b"s0-seed-material", labels::SAS, b"ctx", 4);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn kdf_is_deterministic() {
        let backend = RustCryptoBackend::default();
        let a = kdf(&backend, HashAlgorithm::Sha256, b"key", b"label", b"ctx", 32);
        let b = kdf(&backend, HashAlgorithm::Sha256, b"key", b"label", b"ctx", 32);
        assert_eq!(*a, *b);
    }

    #[test]
    fn kdf_differs_per_label() {
        let backend = RustCryptoBackend::default();
        let a = kdf(&backend, HashAlgorithm::Sha256, b"key", labels::INITIATOR_MAC_KEY, b"ctx", 32);
        let b = kdf(&backend, HashAlgorithm::Sha256, b"key", labels::RESPONDER_MAC_KEY, b"ctx", 32);
        assert_ne!(*a, *b);
    }
}
