//! Crypto Negotiation (spec component D): reduces a local `Hello` and a
//! peer `Hello` to the single algorithm chosen per family, per RFC 6189
//! §4.1.2's tie-break rule -- "pick the one with the numerically smaller
//! enum value (the faster algorithm)" when the two sides' own preference
//! orders disagree on the top choice. `select_common` (spec component B)
//! computes each side's common list in its own order and compares the two
//! tops, grounded on the real bzrtp reference implementation's
//! `crypoAlgoAgreement`/`selectCommonAlgo`
//! (`examples/original_source/bzrtp/src/cryptoUtils.c`). This makes
//! `negotiate` itself order-independent: either side can call it with its
//! own Hello first and get the same answer, which is what lets both sides
//! negotiate before either one has necessarily become the initiator.

use crate::algorithm::{
    select_common, AuthTagAlgorithm, CipherAlgorithm, HashAlgorithm, KeyAgreementAlgorithm, SasAlgorithm,
};
use crate::error::{Error, Result};
use crate::packet::messages::{Commit, Hello};

/// The five algorithms both sides converge on after receiving each other's
/// `Hello`, used to build `Commit` and drive every later derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedAlgorithms {
    pub hash: HashAlgorithm,
    pub cipher: CipherAlgorithm,
    pub auth_tag: AuthTagAlgorithm,
    pub key_agreement: KeyAgreementAlgorithm,
    pub sas: SasAlgorithm,
}

/// Select common algorithms from two Hellos. Symmetric in `a`/`b` -- either
/// side can call this with its own Hello first and get back the identical
/// `NegotiatedAlgorithms`, since `select_common` resolves ties by comparing
/// both sides' top picks rather than favoring whichever list is passed
/// first.
pub fn negotiate(a: &Hello, b: &Hello) -> Result<NegotiatedAlgorithms> {
    let mut hash = select_common(&a.hash_algorithms, &b.hash_algorithms).ok_or(Error::InvalidHashSelection)?;
    let mut cipher = select_common(&a.cipher_algorithms, &b.cipher_algorithms).ok_or(Error::InvalidCipherSelection)?;
    let auth_tag = select_common(&a.auth_tag_algorithms, &b.auth_tag_algorithms).ok_or(Error::InvalidAuthTagSelection)?;
    let key_agreement = select_common(&a.key_agreement_algorithms, &b.key_agreement_algorithms).ok_or(Error::NoCommonAlgoFound)?;
    let sas = select_common(&a.sas_algorithms, &b.sas_algorithms).ok_or(Error::InvalidSasSelection)?;

    // Post-quantum and X448 key agreements carry enough margin that RFC
    // 6189bis-style deployments pin the strongest mutually-advertised
    // cipher/hash instead of the ordinary preference-order pick (spec
    // §4.B). Only ever strengthens the choice: if neither side actually
    // advertised anything stronger than what was already selected, the
    // original pick stands.
    if key_agreement.is_post_quantum() || key_agreement == KeyAgreementAlgorithm::X448 {
        if let Some(strong) = strongest_common(
            &a.cipher_algorithms,
            &b.cipher_algorithms,
            &[CipherAlgorithm::Aes3, CipherAlgorithm::Aes2, CipherAlgorithm::Aes1],
        ) {
            cipher = strong;
        }
        if let Some(strong) = strongest_common(
            &a.hash_algorithms,
            &b.hash_algorithms,
            &[HashAlgorithm::Sha512, HashAlgorithm::Sha384, HashAlgorithm::Sha256],
        ) {
            hash = strong;
        }
    }

    Ok(NegotiatedAlgorithms {
        hash,
        cipher,
        auth_tag,
        key_agreement,
        sas,
    })
}

/// Pick the first entry of `preference` (strongest first) that both `a` and
/// `b` advertised; `None` if neither side advertised any of them.
fn strongest_common<T: Copy + PartialEq>(a: &[T], b: &[T], preference: &[T]) -> Option<T> {
    preference.iter().copied().find(|candidate| a.contains(candidate) && b.contains(candidate))
}

/// Resolve a `Commit`/`Commit` collision (spec §4.F: "if both sides send
/// Commit concurrently"): both non-`M`-flagged endpoints build and send a
/// `Commit` as soon as negotiation completes, so a crossed pair is the
/// normal case, not an edge case. RFC 6189 §5.2's rule: for a DH/KEM
/// exchange, the side whose `hvi` is numerically larger (unsigned
/// big-endian) becomes/stays initiator; "if both are Multistream, the
/// larger nonce wins instead" (spec §4.F) since a Multistream `Commit`
/// carries a nonce rather than an hvi. A tie falls back to comparing ZIDs
/// so the function remains total.
pub fn resolve_commit_collision(ours: &Commit, peers: &Commit, our_zid: &[u8; 12], peer_zid: &[u8; 12]) -> bool {
    if let (Some(a), Some(b)) = (ours.hvi, peers.hvi) {
        return match a.cmp(&b) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => our_zid > peer_zid,
        };
    }
    if let (Some(a), Some(b)) = (ours.nonce, peers.nonce) {
        return match a.cmp(&b) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => our_zid > peer_zid,
        };
    }
    our_zid > peer_zid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_with(
        key_agreement_algorithms: Vec<KeyAgreementAlgorithm>,
    ) -> Hello {
        Hello {
            version: *b"1.10",
            client_id: *b"zrtp-rs/0.1.0   ",
            h3: [0u8; 32],
            zid: [0u8; 12],
            signature_capable: false,
            mitm_pbx: false,
            passive: false,
            hash_algorithms: vec![HashAlgorithm::Sha256],
            cipher_algorithms: vec![CipherAlgorithm::Aes1],
            auth_tag_algorithms: vec![AuthTagAlgorithm::HmacSha132],
            key_agreement_algorithms,
            sas_algorithms: vec![SasAlgorithm::Base32],
            mac: [0u8; 8],
        }
    }

    #[test]
    fn negotiate_breaks_disagreeing_tops_by_smaller_enum_value() {
        // Each side's top pick disagrees (Ec25 vs Dh3072); per the
        // bzrtp-grounded tie-break the numerically smaller value wins
        // regardless of which side's Hello is passed first.
        let a = hello_with(vec![KeyAgreementAlgorithm::Ec25, KeyAgreementAlgorithm::Dh3072]);
        let b = hello_with(vec![KeyAgreementAlgorithm::Dh3072, KeyAgreementAlgorithm::Ec25]);
        assert_eq!(negotiate(&a, &b).unwrap().key_agreement, KeyAgreementAlgorithm::Dh3072);
        assert_eq!(negotiate(&b, &a).unwrap().key_agreement, KeyAgreementAlgorithm::Dh3072);
    }

    #[test]
    fn negotiate_agrees_with_matching_tops_regardless_of_order() {
        let a = hello_with(vec![KeyAgreementAlgorithm::Dh3072, KeyAgreementAlgorithm::Ec25]);
        let b = hello_with(vec![KeyAgreementAlgorithm::Dh3072, KeyAgreementAlgorithm::Ec25]);
        assert_eq!(negotiate(&a, &b).unwrap().key_agreement, KeyAgreementAlgorithm::Dh3072);
    }

    #[test]
    fn negotiate_fails_with_no_common_key_agreement() {
        let initiator = hello_with(vec![KeyAgreementAlgorithm::Ec25]);
        let responder = hello_with(vec![KeyAgreementAlgorithm::Dh3072]);
        assert!(negotiate(&initiator, &responder).is_err());
    }

    #[test]
    fn post_quantum_key_agreement_forces_strongest_common_cipher_and_hash() {
        let mut initiator = hello_with(vec![KeyAgreementAlgorithm::Kyber1024]);
        initiator.hash_algorithms = vec![HashAlgorithm::Sha256, HashAlgorithm::Sha384, HashAlgorithm::Sha512];
        initiator.cipher_algorithms = vec![CipherAlgorithm::Aes1, CipherAlgorithm::Aes3];
        let mut responder = hello_with(vec![KeyAgreementAlgorithm::Kyber1024]);
        responder.hash_algorithms = vec![HashAlgorithm::Sha256, HashAlgorithm::Sha384, HashAlgorithm::Sha512];
        responder.cipher_algorithms = vec![CipherAlgorithm::Aes1, CipherAlgorithm::Aes3];

        let negotiated = negotiate(&initiator, &responder).unwrap();
        assert_eq!(negotiated.cipher, CipherAlgorithm::Aes3);
        assert_eq!(negotiated.hash, HashAlgorithm::Sha512);
    }

    #[test]
    fn post_quantum_upgrade_never_selects_an_unadvertised_algorithm() {
        let initiator = hello_with(vec![KeyAgreementAlgorithm::Kyber1024]);
        let responder = hello_with(vec![KeyAgreementAlgorithm::Kyber1024]);
        // hello_with only advertises Sha256/Aes1; the upgrade rule must not
        // invent a stronger algorithm neither side offered.
        let negotiated = negotiate(&initiator, &responder).unwrap();
        assert_eq!(negotiated.cipher, CipherAlgorithm::Aes1);
        assert_eq!(negotiated.hash, HashAlgorithm::Sha256);
    }

    fn commit_with_hvi(hvi: [u8; 32]) -> Commit {
        Commit {
            h2: [0u8; 32],
            zid: [0u8; 12],
            hash_algorithm: HashAlgorithm::Sha256,
            cipher_algorithm: CipherAlgorithm::Aes1,
            auth_tag_algorithm: AuthTagAlgorithm::HmacSha132,
            key_agreement_algorithm: KeyAgreementAlgorithm::Dh3072,
            sas_algorithm: SasAlgorithm::Base32,
            hvi: Some(hvi),
            kem_public_value: None,
            nonce: None,
            key_id: None,
            mac: [0u8; 8],
        }
    }

    #[test]
    fn commit_collision_picks_larger_hvi() {
        let mut small = [0u8; 32];
        small[0] = 1;
        let mut large = [0u8; 32];
        large[0] = 2;
        let ours = commit_with_hvi(large);
        let peers = commit_with_hvi(small);
        assert!(resolve_commit_collision(&ours, &peers, &[1u8; 12], &[2u8; 12]));
        assert!(!resolve_commit_collision(&peers, &ours, &[1u8; 12], &[2u8; 12]));
    }

    #[test]
    fn commit_collision_picks_larger_nonce_for_multistream() {
        let mut ours = commit_with_hvi([0u8; 32]);
        ours.hvi = None;
        ours.key_agreement_algorithm = KeyAgreementAlgorithm::Multistream;
        ours.nonce = Some([9u8; 16]);
        let mut peers = ours.clone();
        peers.nonce = Some([1u8; 16]);
        assert!(resolve_commit_collision(&ours, &peers, &[1u8; 12], &[2u8; 12]));
        assert!(!resolve_commit_collision(&peers, &ours, &[1u8; 12], &[2u8; 12]));
    }
}
