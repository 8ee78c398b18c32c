//! Channel State Machine (spec component F): one [`Channel`] per ZRTP
//! stream, driving the handshake automaton synchronously. No internal
//! threads or async runtime -- the host calls [`Channel::process_message`]
//! when a datagram arrives and [`Channel::iterate`] on its own timer tick,
//! matching the spec's host-driven cooperative concurrency model. This is
//! the sync analogue of `dtls::handshaker::HandshakeFsm`, whose `run` loop
//! instead drives flights via `tokio::select!` against channel receivers --
//! here the "receivers" are just the two public methods above.

pub mod state;

pub use state::ChannelState;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::algorithm::{HashAlgorithm, KeyAgreementAlgorithm};
use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::kdf::KeySchedule;
use crate::negotiation::NegotiatedAlgorithms;
use crate::packet::header::PacketHeader;
use crate::packet::messages::{Commit, DhPart, Hello};
use crate::packet::Packet;
use crate::primitives::{Backend, KeyAgreementKeyPair, Secret};

/// Constant-time byte equality for every MAC/hash-chain/hvi comparison on
/// the authentication path (spec §2's "Constant-time comparisons" ambient
/// requirement) -- a plain `==` on secret-derived bytes short-circuits on
/// the first differing byte, leaking timing information an attacker can use
/// to forge a MITM without ever holding the real secret.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Truncated HMAC used to key every Hello/Commit/DHPart MAC field (spec
/// §4.E): `HMAC(key, data)[0:8]`.
pub(crate) fn mac8(backend: &dyn Backend, hash: HashAlgorithm, key: &[u8], data: &[u8]) -> [u8; 8] {
    let full = backend.hmac(hash, key, data);
    let mut out = [0u8; 8];
    let n = full.len().min(8);
    out[..n].copy_from_slice(&full[..n]);
    out
}

/// A retained secret's wire identifier (RFC 6189 §4.3.1): lets the peer
/// recognize which cached secret a DHPart refers to without exposing the
/// secret itself. `None` yields an all-zero id, RFC 6189's "no secret
/// here" marker.
pub(crate) fn retained_secret_id(backend: &dyn Backend, hash: HashAlgorithm, secret: Option<&[u8]>) -> [u8; 8] {
    match secret {
        Some(bytes) => mac8(backend, hash, bytes, b"ZRTP RS ID"),
        None => [0u8; 8],
    }
}

/// `total_hash` (spec §4.E): `H(responder_Hello || Commit)`, extended with
/// `|| DHPart1 || DHPart2` once those exist. Recomputed from the stored
/// message structs via [`crate::packet::message_only_bytes`] rather than
/// keeping a separate raw-byte log, since marshaling a stored struct
/// reproduces the original wire bytes exactly.
pub(crate) fn total_hash(channel: &Channel, backend: &dyn Backend, hash: HashAlgorithm) -> Result<Vec<u8>> {
    let responder_hello = channel.responder_hello.clone().ok_or(Error::InvalidContext)?;
    let commit = channel.commit.clone().ok_or(Error::InvalidContext)?;
    let mut data = crate::packet::message_only_bytes(&crate::packet::messages::Message::Hello(responder_hello))?;
    data.extend_from_slice(&crate::packet::message_only_bytes(&crate::packet::messages::Message::Commit(commit))?);
    if let Some(dhpart1) = &channel.dhpart1 {
        data.extend_from_slice(&crate::packet::message_only_bytes(&crate::packet::messages::Message::DhPart1(dhpart1.clone()))?);
    }
    if let Some(dhpart2) = &channel.dhpart2 {
        data.extend_from_slice(&crate::packet::message_only_bytes(&crate::packet::messages::Message::DhPart2(dhpart2.clone()))?);
    }
    Ok(backend.hash(hash, &data))
}

/// `KDF_Context = ZIDi || ZIDr || total_hash` (spec §4.E).
pub(crate) fn kdf_context(channel: &Channel, backend: &dyn Backend, hash: HashAlgorithm) -> Result<Vec<u8>> {
    let local_zid = channel.local_hello.as_ref().map(|h| h.zid).ok_or(Error::InvalidContext)?;
    let peer_zid = channel.peer_hello.as_ref().map(|h| h.zid).ok_or(Error::InvalidContext)?;
    let (zidi, zidr) = match channel.role {
        Some(Role::Initiator) => (local_zid, peer_zid),
        Some(Role::Responder) => (peer_zid, local_zid),
        None => return Err(Error::InvalidContext),
    };
    let th = total_hash(channel, backend, hash)?;
    let mut context = Vec::with_capacity(12 + 12 + th.len());
    context.extend_from_slice(&zidi);
    context.extend_from_slice(&zidr);
    context.extend_from_slice(&th);
    Ok(context)
}

/// Which side ends up initiator: both non-`M`/`P` sides build and send a
/// `Commit` as soon as they negotiate (spec §4.F), and a genuine collision
/// is settled by [`crate::negotiation::resolve_commit_collision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// H0..H3 hash chain (spec §4.C/§4.E): H0 random, `H[i+1] = hash(H[i])`.
/// Hello reveals only H3; each later message reveals the next link back,
/// letting the receiver verify `hash(revealed) == previously_seen` without
/// ever learning a link before its message arrives.
#[derive(Clone)]
pub struct HashChain {
    pub h0: Vec<u8>,
    pub h1: Vec<u8>,
    pub h2: Vec<u8>,
    pub h3: Vec<u8>,
}

impl HashChain {
    pub fn generate(backend: &dyn Backend, hash: HashAlgorithm) -> Self {
        let h0 = backend.random(hash.digest_size());
        let h1 = backend.hash(hash, &h0);
        let h2 = backend.hash(hash, &h1);
        let h3 = backend.hash(hash, &h2);
        Self { h0, h1, h2, h3 }
    }

    /// Verify that `revealed` is the preimage of `previous` under the
    /// negotiated hash -- i.e. `hash(revealed) == previous`.
    pub fn verify_link(backend: &dyn Backend, hash: HashAlgorithm, previous: &[u8], revealed: &[u8]) -> bool {
        ct_eq(&backend.hash(hash, revealed), previous)
    }
}

/// Retransmission budget (RFC 6189 §6): exponential backoff, starting at
/// 50ms and capped at 1200ms for Hello/Commit/DHPart/Confirm, a maximum of
/// 20 retries before the channel gives up.
#[derive(Clone, Copy)]
pub struct RetransmitPolicy {
    pub initial_delay_ms: u64,
    pub cap_ms: u64,
    pub max_retries: u32,
}

impl Default for RetransmitPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 50,
            cap_ms: 1200,
            max_retries: 20,
        }
    }
}

struct RetransmitTimer {
    last_packet: Vec<u8>,
    next_fire_ms: u64,
    delay_ms: u64,
    retries: u32,
}

/// A single ZRTP stream's handshake and post-handshake state. Channel 0
/// performs a full DH (or KEM/hybrid) exchange; channels added afterward on
/// the same [`crate::context::Context`] run Multistream mode, skipping DH
/// and deriving their keys from the session's `zrtp_sess_key` instead (spec
/// §4.G).
pub struct Channel {
    pub role: Option<Role>,
    pub state: ChannelState,
    pub ssrc: u32,
    local_sequence_number: u16,
    /// Highest sequence number accepted from the peer so far (spec §3
    /// invariant: sequence numbers in received packets strictly increase).
    /// `None` until the first packet arrives.
    peer_sequence_number: Option<u16>,
    pub hash: HashAlgorithm,
    pub hash_chain: HashChain,
    pub local_hello: Option<Hello>,
    pub peer_hello: Option<Hello>,
    /// The responder's Hello, stable once known regardless of which role
    /// this channel plays -- one of the four inputs to `total_hash`.
    pub responder_hello: Option<Hello>,
    pub negotiated: Option<NegotiatedAlgorithms>,
    pub local_keypair: Option<KeyAgreementKeyPair>,
    pub peer_public_value: Option<Vec<u8>>,
    /// A KEM shared secret obtained by encapsulating against the peer's
    /// public key, held until the rest of the handshake (DHPart2's hash
    /// chain / hvi check) completes enough to finish the key schedule.
    /// Only ever populated on the responder side of a post-quantum
    /// exchange -- the initiator instead decapsulates on demand, since it
    /// holds the KEM keypair and needs no intermediate storage.
    pub pending_secret: Option<Secret>,
    pub key_schedule: Option<KeySchedule>,
    pub is_multistream: bool,
    /// The Commit exchanged on this channel, whichever side built it.
    pub commit: Option<Commit>,
    /// DHPart1, whichever side sent or received it.
    pub dhpart1: Option<DhPart>,
    /// DHPart2, whichever side sent or received it.
    pub dhpart2: Option<DhPart>,
    /// Retained secrets looked up from the cache by the peer's ZID once
    /// `Hello` reveals it; fed into the channel-0 s0 combiner as `s1`.
    pub cached_rs1: Option<Secret>,
    pub cached_rs2: Option<Secret>,
    retransmit: Option<RetransmitTimer>,
    policy: RetransmitPolicy,
}

impl Channel {
    pub fn new(ssrc: u32, hash: HashAlgorithm, backend: &dyn Backend, is_multistream: bool) -> Self {
        Self {
            role: None,
            state: ChannelState::Init,
            ssrc,
            local_sequence_number: 0,
            peer_sequence_number: None,
            hash,
            hash_chain: HashChain::generate(backend, hash),
            local_hello: None,
            peer_hello: None,
            responder_hello: None,
            negotiated: None,
            local_keypair: None,
            peer_public_value: None,
            pending_secret: None,
            key_schedule: None,
            is_multistream,
            commit: None,
            dhpart1: None,
            dhpart2: None,
            cached_rs1: None,
            cached_rs2: None,
            retransmit: None,
            policy: RetransmitPolicy::default(),
        }
    }

    fn next_sequence_number(&mut self) -> u16 {
        let seq = self.local_sequence_number;
        self.local_sequence_number = self.local_sequence_number.wrapping_add(1);
        seq
    }

    pub fn build_header(&mut self) -> PacketHeader {
        PacketHeader {
            version: 0,
            sequence_number: self.next_sequence_number(),
            ssrc: self.ssrc,
        }
    }

    /// Arm (or re-arm) the retransmission timer with the last packet this
    /// channel sent, per [`RetransmitPolicy`]'s exponential backoff.
    pub(crate) fn arm_retransmit(&mut self, now_ms: u64, packet_bytes: Vec<u8>) {
        self.retransmit = Some(RetransmitTimer {
            last_packet: packet_bytes,
            next_fire_ms: now_ms + self.policy.initial_delay_ms,
            delay_ms: self.policy.initial_delay_ms,
            retries: 0,
        });
    }

    pub(crate) fn disarm_retransmit(&mut self) {
        self.retransmit = None;
    }

    /// Called on the host's timer tick. Returns bytes to resend if the
    /// channel's retransmit timer has fired, or an error once the retry
    /// budget is exhausted (the caller should then move the channel to
    /// `Error` and notify the peer).
    pub fn iterate(&mut self, now_ms: u64) -> Result<Option<Vec<u8>>> {
        let Some(timer) = self.retransmit.as_mut() else {
            return Ok(None);
        };
        if now_ms < timer.next_fire_ms {
            return Ok(None);
        }
        if timer.retries >= self.policy.max_retries {
            self.state = ChannelState::Error;
            self.retransmit = None;
            return Err(Error::RetriesExhausted);
        }
        timer.retries += 1;
        timer.delay_ms = (timer.delay_ms * 2).min(self.policy.cap_ms);
        timer.next_fire_ms = now_ms + timer.delay_ms;
        Ok(Some(timer.last_packet.clone()))
    }

    /// Process an already-parsed, CRC-verified, sequence-checked incoming
    /// packet. Dispatches on `self.state` -- the transition table lives in
    /// [`state`] to keep this file's job limited to owning channel data.
    /// `cache` supplies retained secrets for a channel-0 DH exchange;
    /// `msk` supplies the parent session's `zrtp_sess_key` for a
    /// Multistream channel. May return more than one packet to send (e.g.
    /// `HelloACK` followed immediately by `Commit`).
    pub fn process_message(&mut self, backend: &dyn Backend, cache: &Cache, msk: Option<&[u8]>, packet: Packet, now_ms: u64) -> Result<Vec<Vec<u8>>> {
        let incoming = packet.header.sequence_number;
        if let Some(last) = self.peer_sequence_number {
            if incoming <= last {
                return Ok(vec![]);
            }
        }
        self.peer_sequence_number = Some(incoming);
        state::transition(self, backend, cache, msk, packet, now_ms)
    }

    pub fn set_confirmed(&mut self) {
        self.disarm_retransmit();
    }

    pub fn zrtp_sess_key(&self) -> Option<&Zeroizing<Vec<u8>>> {
        self.key_schedule.as_ref().map(|ks| &ks.zrtp_sess_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::RustCryptoBackend;

    #[test]
    fn hash_chain_links_verify() {
        let backend = RustCryptoBackend::default();
        let chain = HashChain::generate(&backend, HashAlgorithm::Sha256);
        assert!(HashChain::verify_link(&backend, HashAlgorithm::Sha256, &chain.h1, &chain.h0));
        assert!(HashChain::verify_link(&backend, HashAlgorithm::Sha256, &chain.h2, &chain.h1));
        assert!(HashChain::verify_link(&backend, HashAlgorithm::Sha256, &chain.h3, &chain.h2));
    }

    #[test]
    fn hash_chain_rejects_wrong_preimage() {
        let backend = RustCryptoBackend::default();
        let chain = HashChain::generate(&backend, HashAlgorithm::Sha256);
        assert!(!HashChain::verify_link(&backend, HashAlgorithm::Sha256, &chain.h2, &chain.h0));
    }

    #[test]
    fn retry_budget_exhausts() {
        let backend = RustCryptoBackend::default();
        let mut channel = Channel::new(1, HashAlgorithm::Sha256, &backend, false);
        channel.arm_retransmit(0, vec![1, 2, 3]);
        let mut now = 0u64;
        let mut exhausted = false;
        for _ in 0..40 {
            now += 2000;
            match channel.iterate(now) {
                Ok(_) => {}
                Err(Error::RetriesExhausted) => {
                    exhausted = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert!(exhausted);
    }
}
