//! Algorithm registry (spec component B): one enum per negotiated family,
//! each mapped to/from its 4-char wire string, each family carrying a
//! mandatory set and a preference-ordered common-selection routine.
//!
//! Modeled on `dtls::cipher_suite`'s `CipherSuiteId` enum: integer ordering
//! doubles as preference ordering (smaller = preferred/faster), `Display`
//! renders the human name, and `From<[u8; 4]>`/`to_wire` round-trip the
//! 4-byte space-padded wire token.

pub mod auth_tag;
pub mod cipher;
pub mod hash;
pub mod key_agreement;
pub mod sas;

pub use auth_tag::AuthTagAlgorithm;
pub use cipher::CipherAlgorithm;
pub use hash::HashAlgorithm;
pub use key_agreement::KeyAgreementAlgorithm;
pub use sas::SasAlgorithm;

/// Every family's wire token is exactly 4 ASCII bytes, space-padded.
pub type WireToken = [u8; 4];

/// Maximum number of entries a Hello may advertise per family (RFC 6189 caps
/// the count fields at one byte each but in practice senders never exceed 7
/// to keep Hello within common MTU budgets; enforced here defensively).
pub const MAX_ALGOS_PER_FAMILY: usize = 7;

/// Parse a 4-char wire token, trimming trailing ASCII spaces used as padding
/// for 3-character codes (e.g. `"B32 "`).
pub(crate) fn trimmed(token: &WireToken) -> &str {
    let len = token.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    std::str::from_utf8(&token[..len]).unwrap_or("")
}

pub(crate) fn pad(s: &str) -> WireToken {
    let mut out = [b' '; 4];
    let bytes = s.as_bytes();
    let n = bytes.len().min(4);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Insert any missing mandatory entries into `advertised`, preserving the
/// caller's relative order and appending the mandatory defaults that are
/// absent, capped at [`MAX_ALGOS_PER_FAMILY`].
///
/// Mirrors `dtls::cipher_suite::parse_cipher_suites`'s "fall back to
/// defaults when the caller supplied none" shape, generalized to "fill in
/// what's missing" since ZRTP's mandatory set must always be present
/// alongside caller preferences rather than replacing them.
pub(crate) fn with_mandatory<T: Copy + PartialEq>(advertised: &[T], mandatory: &[T]) -> Vec<T> {
    let mut out: Vec<T> = advertised
        .iter()
        .copied()
        .take(MAX_ALGOS_PER_FAMILY)
        .collect();
    for m in mandatory {
        if out.len() >= MAX_ALGOS_PER_FAMILY {
            break;
        }
        if !out.contains(m) {
            out.push(*m);
        }
    }
    out
}

/// Common-algorithm selection (spec §4.B), grounded on bzrtp's
/// `crypoAlgoAgreement`/`selectCommonAlgo`
/// (`examples/original_source/bzrtp/src/cryptoUtils.c`): each side computes
/// the common list independently, in its *own* preference order, and only
/// the two resulting top picks are compared. If they agree, that's the
/// answer; if they disagree, the numerically smaller (faster) enum value
/// wins. This is symmetric -- swapping `self_list`/`peer_list` yields the
/// same result -- which matters because both the initiator and the
/// responder must independently negotiate to the identical outcome before
/// either has sent a `Commit`. Returns `None` if the intersection is empty.
pub(crate) fn select_common<T: Copy + PartialEq + Ord>(self_list: &[T], peer_list: &[T]) -> Option<T> {
    let self_top = self_list.iter().find(|c| peer_list.contains(c)).copied()?;
    let peer_top = peer_list.iter().find(|c| self_list.contains(c)).copied()?;
    Some(std::cmp::min(self_top, peer_top))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_and_trim_round_trip() {
        assert_eq!(trimmed(&pad("B32")), "B32");
        assert_eq!(trimmed(&pad("S256")), "S256");
        assert_eq!(pad("B32"), *b"B32 ");
    }

    #[test]
    fn with_mandatory_preserves_order_and_appends() {
        let advertised = [2u8, 5u8];
        let mandatory = [1u8, 2u8];
        assert_eq!(with_mandatory(&advertised, &mandatory), vec![2, 5, 1]);
    }

    #[test]
    fn with_mandatory_respects_cap() {
        let advertised: Vec<u8> = (0..7).collect();
        let mandatory = [99u8];
        assert_eq!(with_mandatory(&advertised, &mandatory).len(), 7);
    }
}
