use pqcrypto_traits::kem::{Ciphertext, PublicKey, SecretKey, SharedSecret as PqSharedSecret};
use zeroize::Zeroizing;

use crate::algorithm::KeyAgreementAlgorithm;
use crate::error::{Error, Result};

use super::{KeyAgreementKeyPair, Secret};

/// `pqc_kyber` is compiled for exactly one parameter set at a time (selected
/// via Cargo feature, see Cargo.toml's `kyber1024` feature); this backend
/// only ever advertises/generates that one level. `pqcrypto-hqc` bundles all
/// three HQC levels as separate modules in the same build, so all three are
/// supported simultaneously.
pub enum KemPrivate {
    Kyber(Box<pqc_kyber::SecretKey>),
    Hqc128(pqcrypto_hqc::hqc128::SecretKey),
    Hqc192(pqcrypto_hqc::hqc192::SecretKey),
    Hqc256(pqcrypto_hqc::hqc256::SecretKey),
}

pub fn generate_keypair(algorithm: KeyAgreementAlgorithm) -> Result<KeyAgreementKeyPair> {
    match algorithm {
        KeyAgreementAlgorithm::Kyber1024 => {
            let mut rng = rand::rngs::OsRng;
            let keys = pqc_kyber::keypair(&mut rng).map_err(|e| Error::CryptoBackend(format!("{:?}", e)))?;
            Ok(KeyAgreementKeyPair::kem(
                algorithm,
                keys.public.to_vec(),
                KemPrivate::Kyber(Box::new(keys.secret)),
            ))
        }
        KeyAgreementAlgorithm::Hqc128 => {
            let (pk, sk) = pqcrypto_hqc::hqc128::keypair();
            Ok(KeyAgreementKeyPair::kem(algorithm, pk.as_bytes().to_vec(), KemPrivate::Hqc128(sk)))
        }
        KeyAgreementAlgorithm::Hqc192 => {
            let (pk, sk) = pqcrypto_hqc::hqc192::keypair();
            Ok(KeyAgreementKeyPair::kem(algorithm, pk.as_bytes().to_vec(), KemPrivate::Hqc192(sk)))
        }
        KeyAgreementAlgorithm::Hqc256 => {
            let (pk, sk) = pqcrypto_hqc::hqc256::keypair();
            Ok(KeyAgreementKeyPair::kem(algorithm, pk.as_bytes().to_vec(), KemPrivate::Hqc256(sk)))
        }
        _ => Err(Error::NoCommonAlgoFound),
    }
}

pub fn encapsulate(algorithm: KeyAgreementAlgorithm, peer_public_bytes: &[u8]) -> Result<(Vec<u8>, Secret)> {
    match algorithm {
        KeyAgreementAlgorithm::Kyber1024 => {
            let mut rng = rand::rngs::OsRng;
            let public: [u8; pqc_kyber::KYBER_PUBLICKEYBYTES] = peer_public_bytes
                .try_into()
                .map_err(|_| Error::CryptoBackend("bad Kyber public key length".into()))?;
            let (ciphertext, shared) =
                pqc_kyber::encapsulate(&public, &mut rng).map_err(|e| Error::CryptoBackend(format!("{:?}", e)))?;
            Ok((ciphertext.to_vec(), Zeroizing::new(shared.to_vec())))
        }
        KeyAgreementAlgorithm::Hqc128 => {
            let pk = pqcrypto_hqc::hqc128::PublicKey::from_bytes(peer_public_bytes)
                .map_err(|e| Error::CryptoBackend(format!("{:?}", e)))?;
            let (shared, ct) = pqcrypto_hqc::hqc128::encapsulate(&pk);
            Ok((ct.as_bytes().to_vec(), Zeroizing::new(shared.as_bytes().to_vec())))
        }
        KeyAgreementAlgorithm::Hqc192 => {
            let pk = pqcrypto_hqc::hqc192::PublicKey::from_bytes(peer_public_bytes)
                .map_err(|e| Error::CryptoBackend(format!("{:?}", e)))?;
            let (shared, ct) = pqcrypto_hqc::hqc192::encapsulate(&pk);
            Ok((ct.as_bytes().to_vec(), Zeroizing::new(shared.as_bytes().to_vec())))
        }
        KeyAgreementAlgorithm::Hqc256 => {
            let pk = pqcrypto_hqc::hqc256::PublicKey::from_bytes(peer_public_bytes)
                .map_err(|e| Error::CryptoBackend(format!("{:?}", e)))?;
            let (shared, ct) = pqcrypto_hqc::hqc256::encapsulate(&pk);
            Ok((ct.as_bytes().to_vec(), Zeroizing::new(shared.as_bytes().to_vec())))
        }
        _ => Err(Error::NoCommonAlgoFound),
    }
}

pub fn decapsulate(algorithm: KeyAgreementAlgorithm, ours: &KemPrivate, ciphertext: &[u8]) -> Result<Secret> {
    match (algorithm, ours) {
        (KeyAgreementAlgorithm::Kyber1024, KemPrivate::Kyber(sk)) => {
            let ct: [u8; pqc_kyber::KYBER_CIPHERTEXTBYTES] = ciphertext
                .try_into()
                .map_err(|_| Error::CryptoBackend("bad Kyber ciphertext length".into()))?;
            let shared = pqc_kyber::decapsulate(&ct, sk).map_err(|e| Error::CryptoBackend(format!("{:?}", e)))?;
            Ok(Zeroizing::new(shared.to_vec()))
        }
        (KeyAgreementAlgorithm::Hqc128, KemPrivate::Hqc128(sk)) => {
            let ct = pqcrypto_hqc::hqc128::Ciphertext::from_bytes(ciphertext)
                .map_err(|e| Error::CryptoBackend(format!("{:?}", e)))?;
            Ok(Zeroizing::new(pqcrypto_hqc::hqc128::decapsulate(&ct, sk).as_bytes().to_vec()))
        }
        (KeyAgreementAlgorithm::Hqc192, KemPrivate::Hqc192(sk)) => {
            let ct = pqcrypto_hqc::hqc192::Ciphertext::from_bytes(ciphertext)
                .map_err(|e| Error::CryptoBackend(format!("{:?}", e)))?;
            Ok(Zeroizing::new(pqcrypto_hqc::hqc192::decapsulate(&ct, sk).as_bytes().to_vec()))
        }
        (KeyAgreementAlgorithm::Hqc256, KemPrivate::Hqc256(sk)) => {
            let ct = pqcrypto_hqc::hqc256::Ciphertext::from_bytes(ciphertext)
                .map_err(|e| Error::CryptoBackend(format!("{:?}", e)))?;
            Ok(Zeroizing::new(pqcrypto_hqc::hqc256::decapsulate(&ct, sk).as_bytes().to_vec()))
        }
        _ => Err(Error::InvalidContext),
    }
}
