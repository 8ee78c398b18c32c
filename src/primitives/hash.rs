use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::algorithm::HashAlgorithm;

/// Skein was never ported to a maintained RustCrypto crate; this backend
/// falls back to the SHA-2 family of matching width for the Skein wire
/// codes it still accepts on parse. Negotiation never selects Skein since
/// it is absent from `RustCryptoBackend`'s supported set at the
/// hash-family level (see [`crate::algorithm::HashAlgorithm::mandatory_set`]);
/// this function exists only so `from_wire`-parsed values never panic.
pub fn digest(algo: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match algo {
        HashAlgorithm::Sha256 | HashAlgorithm::Skein256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha384 | HashAlgorithm::Skein384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

pub fn hmac(algo: HashAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
    match algo {
        HashAlgorithm::Sha256 | HashAlgorithm::Skein256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha384 | HashAlgorithm::Skein384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
        HashAlgorithm::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        let got = digest(HashAlgorithm::Sha256, b"abc");
        let expect = hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015a").unwrap();
        assert_eq!(got, expect);
    }
}
