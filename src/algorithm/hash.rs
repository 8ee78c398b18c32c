use crate::error::{Error, Result};

use super::{pad, trimmed, WireToken};

/// Hash algorithms selectable for the ZRTP hash chain and KDF (spec §4.B).
/// Variant order is preference order: lower index wins when both ends
/// advertise it, matching `CipherSuiteId`'s "smaller discriminant preferred"
/// convention in the teacher's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
    Skein256,
    Skein384,
}

impl HashAlgorithm {
    pub const MANDATORY: HashAlgorithm = HashAlgorithm::Sha256;

    pub fn mandatory_set() -> &'static [HashAlgorithm] {
        &[HashAlgorithm::Sha256]
    }

    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Sha256 | HashAlgorithm::Skein256 => 32,
            HashAlgorithm::Sha384 | HashAlgorithm::Skein384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub fn to_wire(self) -> WireToken {
        pad(match self {
            HashAlgorithm::Sha256 => "S256",
            HashAlgorithm::Sha384 => "S384",
            HashAlgorithm::Sha512 => "S512",
            HashAlgorithm::Skein256 => "SK32",
            HashAlgorithm::Skein384 => "SK48",
        })
    }

    pub fn from_wire(token: &WireToken) -> Result<Self> {
        Ok(match trimmed(token) {
            "S256" => HashAlgorithm::Sha256,
            "S384" => HashAlgorithm::Sha384,
            "S512" => HashAlgorithm::Sha512,
            "SK32" => HashAlgorithm::Skein256,
            "SK48" => HashAlgorithm::Skein384,
            _ => return Err(Error::NoCommonAlgoFound),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        for h in [
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
            HashAlgorithm::Skein256,
            HashAlgorithm::Skein384,
        ] {
            assert_eq!(HashAlgorithm::from_wire(&h.to_wire()).unwrap(), h);
        }
    }
}
