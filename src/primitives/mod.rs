//! Primitive Wrapper Interface (spec component A): every cryptographic
//! operation the rest of the crate needs, behind one [`Backend`] trait, so
//! the packet/negotiation/channel layers never call a crypto crate directly.
//!
//! Grounded on `dtls::cipher_suite::CipherSuite`: a trait object erasing the
//! concrete algorithm, queried for its capabilities (`hash_func`, here
//! `supported_key_agreements`) rather than assumed to support everything.

pub mod cipher;
pub mod dh;
pub mod hash;
pub mod kem;

use zeroize::Zeroizing;

use crate::algorithm::{HashAlgorithm, KeyAgreementAlgorithm};
use crate::error::Result;

/// A DH/ECDH/KEM shared secret or symmetric key, zeroized on drop.
pub type Secret = Zeroizing<Vec<u8>>;

/// An ephemeral key-agreement keypair. Variant carries whatever the concrete
/// algorithm needs to finish the exchange (a DH public value, a KEM
/// ciphertext-producing public key, etc); opaque to callers above this
/// layer, which only ever marshal the wire bytes and hand back the other
/// side's bytes to [`Backend::agree`]/[`Backend::decapsulate`].
pub struct KeyAgreementKeyPair {
    pub algorithm: KeyAgreementAlgorithm,
    pub public_bytes: Vec<u8>,
    secret: KeyAgreementSecretMaterial,
}

enum KeyAgreementSecretMaterial {
    Dh(dh::DhPrivate),
    Kem(kem::KemPrivate),
}

impl KeyAgreementKeyPair {
    pub(crate) fn dh(algorithm: KeyAgreementAlgorithm, public_bytes: Vec<u8>, private: dh::DhPrivate) -> Self {
        Self {
            algorithm,
            public_bytes,
            secret: KeyAgreementSecretMaterial::Dh(private),
        }
    }

    pub(crate) fn kem(algorithm: KeyAgreementAlgorithm, public_bytes: Vec<u8>, private: kem::KemPrivate) -> Self {
        Self {
            algorithm,
            public_bytes,
            secret: KeyAgreementSecretMaterial::Kem(private),
        }
    }
}

/// Every cryptographic primitive the protocol layers consume. Implemented
/// once by [`RustCryptoBackend`]; kept as a trait so test code can swap in a
/// deterministic fake that returns fixed randomness and fixed keypairs,
/// matching `dtls::cipher_suite::CipherSuite`'s "swap the suite, keep the
/// handshake logic" shape.
pub trait Backend {
    /// Key-agreement algorithms this backend can actually perform. The
    /// registry and negotiation layers intersect advertised/selectable sets
    /// with this before ever offering or accepting an algorithm.
    fn supported_key_agreements(&self) -> &[KeyAgreementAlgorithm];

    fn hash(&self, algo: HashAlgorithm, data: &[u8]) -> Vec<u8>;

    fn hmac(&self, algo: HashAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8>;

    fn random(&self, len: usize) -> Vec<u8>;

    /// Generate an ephemeral keypair for the given initiator-side
    /// responder-side-neutral key-agreement algorithm. Returns
    /// [`crate::error::Error::NoCommonAlgoFound`] if `algorithm` is
    /// [`KeyAgreementAlgorithm::is_non_dh`] or unsupported.
    fn generate_keypair(&self, algorithm: KeyAgreementAlgorithm) -> Result<KeyAgreementKeyPair>;

    /// Complete a classic DH/ECDH exchange: combine `our` with the peer's
    /// public bytes into the shared secret DHResult.
    fn agree(&self, our: &KeyAgreementKeyPair, peer_public_bytes: &[u8]) -> Result<Secret>;

    /// KEM-side encapsulation against a peer's public key, returning the
    /// ciphertext to send and the shared secret it decapsulates to.
    fn encapsulate(&self, algorithm: KeyAgreementAlgorithm, peer_public_bytes: &[u8]) -> Result<(Vec<u8>, Secret)>;

    /// KEM-side decapsulation of a ciphertext against our own keypair.
    fn decapsulate(&self, our: &KeyAgreementKeyPair, ciphertext: &[u8]) -> Result<Secret>;

    fn cipher_encrypt(&self, algo: crate::algorithm::CipherAlgorithm, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    fn cipher_decrypt(&self, algo: crate::algorithm::CipherAlgorithm, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Default backend: RustCrypto crates (`sha2`, `hmac`, `p256`,
/// `p384`, `x25519-dalek`, `num-bigint-dig`) plus `pqc_kyber` and
/// `pqcrypto-hqc` for the post-quantum KEMs. Does not implement X448: no
/// vetted pure-Rust X448 crate was available to ground it on, so it is
/// absent from [`Backend::supported_key_agreements`] and therefore never
/// advertised or selected. The X25519-rooted hybrids are absent for the
/// same reason one layer up: combining a classic DH agreement with a KEM
/// encapsulation into one shared secret needs its own combiner logic
/// ([`kem::KemPrivate`] has no variant for it yet), so advertising them
/// here would offer an algorithm [`kem::encapsulate`]/[`kem::decapsulate`]
/// can't actually carry out -- see DESIGN.md.
pub struct RustCryptoBackend {
    supported: Vec<KeyAgreementAlgorithm>,
}

impl Default for RustCryptoBackend {
    fn default() -> Self {
        use KeyAgreementAlgorithm::*;
        Self {
            supported: vec![
                Dh2048, Dh3072, Ec25, Ec38, X25519, Kyber1024, Hqc128, Hqc192, Hqc256, Multistream, Preshared,
            ],
        }
    }
}

impl Backend for RustCryptoBackend {
    fn supported_key_agreements(&self) -> &[KeyAgreementAlgorithm] {
        &self.supported
    }

    fn hash(&self, algo: HashAlgorithm, data: &[u8]) -> Vec<u8> {
        hash::digest(algo, data)
    }

    fn hmac(&self, algo: HashAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
        hash::hmac(algo, key, data)
    }

    fn random(&self, len: usize) -> Vec<u8> {
        use rand::RngCore;
        let mut buf = vec![0u8; len];
        rand::rngs::OsRng.fill_bytes(&mut buf);
        buf
    }

    fn generate_keypair(&self, algorithm: KeyAgreementAlgorithm) -> Result<KeyAgreementKeyPair> {
        if algorithm.is_non_dh() || !self.supported.contains(&algorithm) {
            return Err(crate::error::Error::NoCommonAlgoFound);
        }
        if algorithm.is_post_quantum() {
            kem::generate_keypair(algorithm)
        } else {
            dh::generate_keypair(algorithm)
        }
    }

    fn agree(&self, our: &KeyAgreementKeyPair, peer_public_bytes: &[u8]) -> Result<Secret> {
        match &our.secret {
            KeyAgreementSecretMaterial::Dh(priv_key) => dh::agree(our.algorithm, priv_key, peer_public_bytes),
            KeyAgreementSecretMaterial::Kem(_) => Err(crate::error::Error::InvalidContext),
        }
    }

    fn encapsulate(&self, algorithm: KeyAgreementAlgorithm, peer_public_bytes: &[u8]) -> Result<(Vec<u8>, Secret)> {
        kem::encapsulate(algorithm, peer_public_bytes)
    }

    fn decapsulate(&self, our: &KeyAgreementKeyPair, ciphertext: &[u8]) -> Result<Secret> {
        match &our.secret {
            KeyAgreementSecretMaterial::Kem(priv_key) => kem::decapsulate(our.algorithm, priv_key, ciphertext),
            KeyAgreementSecretMaterial::Dh(_) => Err(crate::error::Error::InvalidContext),
        }
    }

    fn cipher_encrypt(&self, algo: crate::algorithm::CipherAlgorithm, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        cipher::encrypt(algo, key, iv, plaintext)
    }

    fn cipher_decrypt(&self, algo: crate::algorithm::CipherAlgorithm, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        cipher::decrypt(algo, key, iv, ciphertext)
    }
}
