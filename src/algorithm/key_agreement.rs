use crate::error::{Error, Result};

use super::{pad, trimmed, WireToken};

/// Key-agreement algorithms, spanning RFC 6189's original finite-field/EC
/// Diffie-Hellman types, the non-DH "Mult"/"Prsh" special cases (multistream
/// and preshared-secret channels skip DH entirely), and the post-quantum
/// KEM and hybrid extensions supplemented from `original_source`-adjacent
/// research material per SPEC_FULL.md §4.B.
///
/// Not every backend implements every variant; [`crate::primitives::Backend::supported_key_agreements`]
/// reports the subset a given backend can actually perform, and negotiation
/// only ever advertises/selects from that subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyAgreementAlgorithm {
    /// MODP group 14, RFC 3526, 2048-bit.
    Dh2048,
    /// MODP group 15, RFC 3526, 3072-bit.
    Dh3072,
    /// NIST P-256 ECDH.
    Ec25,
    /// NIST P-384 ECDH.
    Ec38,
    /// NIST P-521 ECDH. Registry-only: no backend in this implementation
    /// generates or agrees P-521 keys (RustCrypto's `p521` ships only
    /// against a newer `elliptic-curve` generation than the one the rest
    /// of this crate's EC stack is pinned to) -- see DESIGN.md. Present
    /// here so negotiation/wire code has a name for it, mirroring how
    /// [`KeyAgreementAlgorithm::X448`] is listed without being backed.
    Ec52,
    /// X25519 (RFC 7748).
    X25519,
    /// X448 (RFC 7748). Advertised only by backends that implement it;
    /// the bundled RustCrypto-backed primitive wrapper does not, so it is
    /// always filtered out of this implementation's advertised sets.
    X448,
    /// Kyber-512 KEM.
    Kyber512,
    /// Kyber-768 KEM.
    Kyber768,
    /// Kyber-1024 KEM.
    Kyber1024,
    /// HQC-128 KEM.
    Hqc128,
    /// HQC-192 KEM.
    Hqc192,
    /// HQC-256 KEM.
    Hqc256,
    /// X25519 + Kyber-512 hybrid.
    HybridX25519Kyber512,
    /// X25519 + Kyber-768 hybrid.
    HybridX25519Kyber768,
    /// Multistream: channel reuses the session's ZRTPSess key, no DH.
    Multistream,
    /// Preshared: channel is keyed from a cached shared secret, no DH.
    Preshared,
}

impl KeyAgreementAlgorithm {
    pub fn mandatory_set() -> &'static [KeyAgreementAlgorithm] {
        &[
            KeyAgreementAlgorithm::Dh3072,
            KeyAgreementAlgorithm::Multistream,
        ]
    }

    /// True for the two special agreement types that do not run a DH/KEM
    /// exchange and instead derive keys directly from existing secrets.
    pub fn is_non_dh(self) -> bool {
        matches!(
            self,
            KeyAgreementAlgorithm::Multistream | KeyAgreementAlgorithm::Preshared
        )
    }

    pub fn is_post_quantum(self) -> bool {
        matches!(
            self,
            KeyAgreementAlgorithm::Kyber512
                | KeyAgreementAlgorithm::Kyber768
                | KeyAgreementAlgorithm::Kyber1024
                | KeyAgreementAlgorithm::Hqc128
                | KeyAgreementAlgorithm::Hqc192
                | KeyAgreementAlgorithm::Hqc256
                | KeyAgreementAlgorithm::HybridX25519Kyber512
                | KeyAgreementAlgorithm::HybridX25519Kyber768
        )
    }

    /// Fixed public-value length for a classic DH/ECDH group (spec.md §3's
    /// invariant table), `None` for KEM/hybrid/non-DH types which have no
    /// single fixed length of this kind.
    pub fn classic_pv_len(self) -> Option<usize> {
        Some(match self {
            KeyAgreementAlgorithm::Dh2048 => 256,
            KeyAgreementAlgorithm::Dh3072 => 384,
            KeyAgreementAlgorithm::Ec25 => 64,
            KeyAgreementAlgorithm::Ec38 => 96,
            KeyAgreementAlgorithm::Ec52 => 132,
            KeyAgreementAlgorithm::X25519 => 32,
            KeyAgreementAlgorithm::X448 => 56,
            _ => return None,
        })
    }

    /// KEM/hybrid public-key length, the value the initiator publishes in
    /// `Commit` (spec.md §9: never wire-embedded, always derived from the
    /// negotiated algorithm). `None` for non-KEM types.
    pub fn kem_public_key_len(self) -> Option<usize> {
        Some(match self {
            KeyAgreementAlgorithm::Kyber512 => 800,
            KeyAgreementAlgorithm::Kyber768 => 1184,
            KeyAgreementAlgorithm::Kyber1024 => 1568,
            KeyAgreementAlgorithm::Hqc128 => 2249,
            KeyAgreementAlgorithm::Hqc192 => 4522,
            KeyAgreementAlgorithm::Hqc256 => 7245,
            KeyAgreementAlgorithm::HybridX25519Kyber512 => 32 + 800,
            KeyAgreementAlgorithm::HybridX25519Kyber768 => 32 + 1184,
            _ => return None,
        })
    }

    /// KEM/hybrid ciphertext length, the value the responder returns in
    /// `DHPart1` (spec.md §4.C). `None` for non-KEM types.
    pub fn kem_ciphertext_len(self) -> Option<usize> {
        Some(match self {
            KeyAgreementAlgorithm::Kyber512 => 768,
            KeyAgreementAlgorithm::Kyber768 => 1088,
            KeyAgreementAlgorithm::Kyber1024 => 1568,
            KeyAgreementAlgorithm::Hqc128 => 4481,
            KeyAgreementAlgorithm::Hqc192 => 9026,
            KeyAgreementAlgorithm::Hqc256 => 14469,
            KeyAgreementAlgorithm::HybridX25519Kyber512 => 32 + 768,
            KeyAgreementAlgorithm::HybridX25519Kyber768 => 32 + 1088,
            _ => return None,
        })
    }

    pub fn to_wire(self) -> WireToken {
        pad(match self {
            KeyAgreementAlgorithm::Dh2048 => "DH2k",
            KeyAgreementAlgorithm::Dh3072 => "DH3k",
            KeyAgreementAlgorithm::Ec25 => "EC25",
            KeyAgreementAlgorithm::Ec38 => "EC38",
            KeyAgreementAlgorithm::Ec52 => "EC52",
            KeyAgreementAlgorithm::X25519 => "K255",
            KeyAgreementAlgorithm::X448 => "K448",
            KeyAgreementAlgorithm::Kyber512 => "KYB1",
            KeyAgreementAlgorithm::Kyber768 => "KYB3",
            KeyAgreementAlgorithm::Kyber1024 => "KYB5",
            KeyAgreementAlgorithm::Hqc128 => "HQC1",
            KeyAgreementAlgorithm::Hqc192 => "HQC3",
            KeyAgreementAlgorithm::Hqc256 => "HQC5",
            KeyAgreementAlgorithm::HybridX25519Kyber512 => "X3K1",
            KeyAgreementAlgorithm::HybridX25519Kyber768 => "X3K3",
            KeyAgreementAlgorithm::Multistream => "Mult",
            KeyAgreementAlgorithm::Preshared => "Prsh",
        })
    }

    pub fn from_wire(token: &WireToken) -> Result<Self> {
        Ok(match trimmed(token) {
            "DH2k" => KeyAgreementAlgorithm::Dh2048,
            "DH3k" => KeyAgreementAlgorithm::Dh3072,
            "EC25" => KeyAgreementAlgorithm::Ec25,
            "EC38" => KeyAgreementAlgorithm::Ec38,
            "EC52" => KeyAgreementAlgorithm::Ec52,
            "K255" => KeyAgreementAlgorithm::X25519,
            "K448" => KeyAgreementAlgorithm::X448,
            "KYB1" => KeyAgreementAlgorithm::Kyber512,
            "KYB3" => KeyAgreementAlgorithm::Kyber768,
            "KYB5" => KeyAgreementAlgorithm::Kyber1024,
            "HQC1" => KeyAgreementAlgorithm::Hqc128,
            "HQC3" => KeyAgreementAlgorithm::Hqc192,
            "HQC5" => KeyAgreementAlgorithm::Hqc256,
            "X3K1" => KeyAgreementAlgorithm::HybridX25519Kyber512,
            "X3K3" => KeyAgreementAlgorithm::HybridX25519Kyber768,
            "Mult" => KeyAgreementAlgorithm::Multistream,
            "Prsh" => KeyAgreementAlgorithm::Preshared,
            _ => return Err(Error::NoCommonAlgoFound),
        })
    }
}
