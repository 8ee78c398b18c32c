use crate::error::{Error, Result};

use super::{pad, trimmed, WireToken};

/// Symmetric ciphers usable for the SRTP session and for encrypting the
/// Confirm messages' payload (spec §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CipherAlgorithm {
    Aes1,
    Aes2,
    Aes3,
    TwoFish1,
    TwoFish3,
}

impl CipherAlgorithm {
    pub fn mandatory_set() -> &'static [CipherAlgorithm] {
        &[CipherAlgorithm::Aes1]
    }

    /// Key length in bytes.
    pub fn key_size(self) -> usize {
        match self {
            CipherAlgorithm::Aes1 | CipherAlgorithm::TwoFish1 => 16,
            CipherAlgorithm::Aes2 => 24,
            CipherAlgorithm::Aes3 | CipherAlgorithm::TwoFish3 => 32,
        }
    }

    pub fn to_wire(self) -> WireToken {
        pad(match self {
            CipherAlgorithm::Aes1 => "AES1",
            CipherAlgorithm::Aes2 => "AES2",
            CipherAlgorithm::Aes3 => "AES3",
            CipherAlgorithm::TwoFish1 => "2FS1",
            CipherAlgorithm::TwoFish3 => "2FS3",
        })
    }

    pub fn from_wire(token: &WireToken) -> Result<Self> {
        Ok(match trimmed(token) {
            "AES1" => CipherAlgorithm::Aes1,
            "AES2" => CipherAlgorithm::Aes2,
            "AES3" => CipherAlgorithm::Aes3,
            "2FS1" => CipherAlgorithm::TwoFish1,
            "2FS3" => CipherAlgorithm::TwoFish3,
            _ => return Err(Error::NoCommonAlgoFound),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        for c in [
            CipherAlgorithm::Aes1,
            CipherAlgorithm::Aes2,
            CipherAlgorithm::Aes3,
            CipherAlgorithm::TwoFish1,
            CipherAlgorithm::TwoFish3,
        ] {
            assert_eq!(CipherAlgorithm::from_wire(&c.to_wire()).unwrap(), c);
        }
    }
}
