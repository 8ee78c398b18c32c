use elliptic_curve::sec1::ToEncodedPoint;
use num_bigint_dig::BigUint;
use p256::elliptic_curve::ecdh::diffie_hellman as p256_dh;
use p384::elliptic_curve::ecdh::diffie_hellman as p384_dh;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::algorithm::KeyAgreementAlgorithm;
use crate::error::{Error, Result};

use super::{KeyAgreementKeyPair, Secret};

/// RFC 3526 MODP group 14 (2048-bit) generator/prime, hex-encoded.
const MODP_2048_P: &str = "\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC7\
4020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F14\
374FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B\
7EDEE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163\
BF0598DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208\
552BB9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E\
36CE3BE39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF69\
55817183995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

/// RFC 3526 MODP group 15 (3072-bit) generator/prime, hex-encoded.
const MODP_3072_P: &str = "\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC7\
4020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F14\
374FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B\
7EDEE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163\
BF0598DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208\
552BB9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E\
36CE3BE39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF69\
55817183995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D\
04507A33A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7DB3970F8\
5A6E1E4C7ABF5AE8CDB0933D71E8C94E04A25619DCEE3D2261AD2EE6BF12FFA0\
6D98A0864D87602733EC86A64521F2B18177B200CBBE117577A615D6C770988\
C0BAD946E208E24FA074E5AB3143DB5BFCE0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF";

pub enum DhPrivate {
    Modp(BigUint),
    P256(p256::ecdh::EphemeralSecret),
    P384(p384::ecdh::EphemeralSecret),
    X25519(x25519_dalek::StaticSecret),
}

fn modp_params(algo: KeyAgreementAlgorithm) -> Result<(BigUint, BigUint)> {
    let hex = match algo {
        KeyAgreementAlgorithm::Dh2048 => MODP_2048_P,
        KeyAgreementAlgorithm::Dh3072 => MODP_3072_P,
        _ => return Err(Error::NoCommonAlgoFound),
    };
    let p = BigUint::parse_bytes(hex.as_bytes(), 16).expect("static MODP prime parses");
    let g = BigUint::from(2u8);
    Ok((p, g))
}

pub fn generate_keypair(algorithm: KeyAgreementAlgorithm) -> Result<KeyAgreementKeyPair> {
    match algorithm {
        KeyAgreementAlgorithm::Dh2048 | KeyAgreementAlgorithm::Dh3072 => {
            let (p, g) = modp_params(algorithm)?;
            let mut rng = OsRng;
            let x = BigUint::from_bytes_be(&{
                use rand::RngCore;
                let mut buf = vec![0u8; p.to_bytes_be().len()];
                rng.fill_bytes(&mut buf);
                buf
            }) % &p;
            let public = g.modpow(&x, &p);
            let public_bytes = pad_to(&public.to_bytes_be(), p.to_bytes_be().len());
            Ok(KeyAgreementKeyPair::dh(algorithm, public_bytes, DhPrivate::Modp(x)))
        }
        KeyAgreementAlgorithm::Ec25 => {
            let secret = p256::ecdh::EphemeralSecret::random(&mut OsRng);
            let point = secret.public_key().to_encoded_point(false);
            let mut raw = Vec::with_capacity(64);
            raw.extend_from_slice(point.x().ok_or_else(|| Error::CryptoBackend("P-256 public key has no x coordinate".into()))?);
            raw.extend_from_slice(point.y().ok_or_else(|| Error::CryptoBackend("P-256 public key has no y coordinate".into()))?);
            Ok(KeyAgreementKeyPair::dh(algorithm, raw, DhPrivate::P256(secret)))
        }
        KeyAgreementAlgorithm::Ec38 => {
            let secret = p384::ecdh::EphemeralSecret::random(&mut OsRng);
            let point = secret.public_key().to_encoded_point(false);
            let mut raw = Vec::with_capacity(96);
            raw.extend_from_slice(point.x().ok_or_else(|| Error::CryptoBackend("P-384 public key has no x coordinate".into()))?);
            raw.extend_from_slice(point.y().ok_or_else(|| Error::CryptoBackend("P-384 public key has no y coordinate".into()))?);
            Ok(KeyAgreementKeyPair::dh(algorithm, raw, DhPrivate::P384(secret)))
        }
        KeyAgreementAlgorithm::X25519 => {
            // A fresh StaticSecret generated per handshake, never persisted:
            // functionally ephemeral, but clonable-by-reference so `agree`
            // can be called through the shared `Backend` trait signature.
            let secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
            let public = x25519_dalek::PublicKey::from(&secret);
            Ok(KeyAgreementKeyPair::dh(
                algorithm,
                public.as_bytes().to_vec(),
                DhPrivate::X25519(secret),
            ))
        }
        _ => Err(Error::NoCommonAlgoFound),
    }
}

fn pad_to(bytes: &[u8], len: usize) -> Vec<u8> {
    if bytes.len() >= len {
        return bytes.to_vec();
    }
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(bytes);
    out
}

pub fn agree(algorithm: KeyAgreementAlgorithm, ours: &DhPrivate, peer_public_bytes: &[u8]) -> Result<Secret> {
    match (algorithm, ours) {
        (KeyAgreementAlgorithm::Dh2048, DhPrivate::Modp(x)) | (KeyAgreementAlgorithm::Dh3072, DhPrivate::Modp(x)) => {
            let (p, _g) = modp_params(algorithm)?;
            let peer = BigUint::from_bytes_be(peer_public_bytes);
            if peer <= BigUint::from(1u8) || peer >= &p - BigUint::from(1u8) {
                return Err(Error::CryptoBackend("peer DH public value out of range".into()));
            }
            let shared = peer.modpow(x, &p);
            Ok(Zeroizing::new(pad_to(&shared.to_bytes_be(), p.to_bytes_be().len())))
        }
        (KeyAgreementAlgorithm::Ec25, DhPrivate::P256(secret)) => {
            if peer_public_bytes.len() != 64 {
                return Err(Error::CryptoBackend("P-256 public value must be 64 bytes (raw x||y)".into()));
            }
            let x = p256::FieldBytes::from_slice(&peer_public_bytes[..32]);
            let y = p256::FieldBytes::from_slice(&peer_public_bytes[32..]);
            let point = p256::EncodedPoint::from_affine_coordinates(x, y, false);
            let peer_public: Option<p256::PublicKey> = p256::PublicKey::from_encoded_point(&point).into();
            let peer_public = peer_public.ok_or_else(|| Error::CryptoBackend("invalid P-256 peer public value".into()))?;
            let shared = p256_dh(secret.to_nonzero_scalar(), peer_public.as_affine());
            Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
        }
        (KeyAgreementAlgorithm::Ec38, DhPrivate::P384(secret)) => {
            if peer_public_bytes.len() != 96 {
                return Err(Error::CryptoBackend("P-384 public value must be 96 bytes (raw x||y)".into()));
            }
            let x = p384::FieldBytes::from_slice(&peer_public_bytes[..48]);
            let y = p384::FieldBytes::from_slice(&peer_public_bytes[48..]);
            let point = p384::EncodedPoint::from_affine_coordinates(x, y, false);
            let peer_public: Option<p384::PublicKey> = p384::PublicKey::from_encoded_point(&point).into();
            let peer_public = peer_public.ok_or_else(|| Error::CryptoBackend("invalid P-384 peer public value".into()))?;
            let shared = p384_dh(secret.to_nonzero_scalar(), peer_public.as_affine());
            Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
        }
        (KeyAgreementAlgorithm::X25519, DhPrivate::X25519(secret)) => {
            let mut arr = [0u8; 32];
            if peer_public_bytes.len() != 32 {
                return Err(Error::CryptoBackend("X25519 public key must be 32 bytes".into()));
            }
            arr.copy_from_slice(peer_public_bytes);
            let peer_public = x25519_dalek::PublicKey::from(arr);
            let shared = secret.diffie_hellman(&peer_public);
            Ok(Zeroizing::new(shared.as_bytes().to_vec()))
        }
        _ => Err(Error::InvalidContext),
    }
}
