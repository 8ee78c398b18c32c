//! CRC-32 framing check (spec §4.C). RFC 6189 §5.1 specifies the CRC-32
//! polynomial used for SCTP and PPP (0x1EDC6F41, reflected) -- bit-identical
//! to the `CRC_32_ISCSI` catalog entry already used elsewhere in this
//! dependency family for SCTP checksums.

use crc::{Crc, CRC_32_ISCSI};

pub(crate) const ZRTP_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Compute the CRC-32 over `header_and_body`, the full packet minus its
/// trailing 4-byte CRC field.
pub fn compute(header_and_body: &[u8]) -> u32 {
    ZRTP_CRC.checksum(header_and_body)
}

/// Verify that the last 4 bytes of `packet` (big-endian) match the CRC-32 of
/// everything preceding them.
pub fn verify(packet: &[u8]) -> bool {
    if packet.len() < 4 {
        return false;
    }
    let (body, trailer) = packet.split_at(packet.len() - 4);
    let want = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    compute(body) == want
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_self_computed_crc() {
        let mut packet = b"some zrtp framed bytes".to_vec();
        let crc = compute(&packet);
        packet.extend_from_slice(&crc.to_be_bytes());
        assert!(verify(&packet));
    }

    #[test]
    fn verify_rejects_tampering() {
        let mut packet = b"some zrtp framed bytes".to_vec();
        let crc = compute(&packet);
        packet.extend_from_slice(&crc.to_be_bytes());
        let last = packet.len() - 1;
        packet[last] ^= 0xff;
        assert!(!verify(&packet));
    }
}
