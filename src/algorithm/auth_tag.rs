use crate::error::{Error, Result};

use super::{pad, trimmed, WireToken};

/// SRTP authentication tag algorithms (spec §4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthTagAlgorithm {
    HmacSha132,
    HmacSha180,
    Skein32,
    Skein64,
}

impl AuthTagAlgorithm {
    pub fn mandatory_set() -> &'static [AuthTagAlgorithm] {
        &[AuthTagAlgorithm::HmacSha132, AuthTagAlgorithm::HmacSha180]
    }

    /// Tag length in bytes.
    pub fn tag_size(self) -> usize {
        match self {
            AuthTagAlgorithm::HmacSha132 | AuthTagAlgorithm::Skein32 => 4,
            AuthTagAlgorithm::HmacSha180 | AuthTagAlgorithm::Skein64 => 10,
        }
    }

    pub fn to_wire(self) -> WireToken {
        pad(match self {
            AuthTagAlgorithm::HmacSha132 => "HS32",
            AuthTagAlgorithm::HmacSha180 => "HS80",
            AuthTagAlgorithm::Skein32 => "SK32",
            AuthTagAlgorithm::Skein64 => "SK64",
        })
    }

    pub fn from_wire(token: &WireToken) -> Result<Self> {
        Ok(match trimmed(token) {
            "HS32" => AuthTagAlgorithm::HmacSha132,
            "HS80" => AuthTagAlgorithm::HmacSha180,
            "SK32" => AuthTagAlgorithm::Skein32,
            "SK64" => AuthTagAlgorithm::Skein64,
            _ => return Err(Error::NoCommonAlgoFound),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        for a in [
            AuthTagAlgorithm::HmacSha132,
            AuthTagAlgorithm::HmacSha180,
            AuthTagAlgorithm::Skein32,
            AuthTagAlgorithm::Skein64,
        ] {
            assert_eq!(AuthTagAlgorithm::from_wire(&a.to_wire()).unwrap(), a);
        }
    }
}
