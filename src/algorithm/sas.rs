use crate::error::{Error, Result};

use super::{pad, trimmed, WireToken};

/// SAS (Short Authentication String) rendering scheme (spec §4.B, §10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SasAlgorithm {
    /// 4-character base-32 rendering of the first 20 bits of the SAS hash.
    Base32,
    /// Two PGP words rendered from the first 32 bits of the SAS hash.
    Base256,
}

impl SasAlgorithm {
    pub fn mandatory_set() -> &'static [SasAlgorithm] {
        &[SasAlgorithm::Base32]
    }

    pub fn to_wire(self) -> WireToken {
        pad(match self {
            SasAlgorithm::Base32 => "B32 ",
            SasAlgorithm::Base256 => "B256",
        })
    }

    pub fn from_wire(token: &WireToken) -> Result<Self> {
        Ok(match trimmed(token) {
            "B32" => SasAlgorithm::Base32,
            "B256" => SasAlgorithm::Base256,
            _ => return Err(Error::NoCommonAlgoFound),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        for s in [SasAlgorithm::Base32, SasAlgorithm::Base256] {
            assert_eq!(SasAlgorithm::from_wire(&s.to_wire()).unwrap(), s);
        }
    }
}
