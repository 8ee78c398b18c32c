//! Handshake automaton transition table (spec §4.F):
//!
//! ```text
//! Init -> SendingHello -> WaitingForHello -> WaitingForPeerAck
//!      -> SendingCommit -> WaitingDhPart1 -> WaitingDhPart2
//!      -> WaitingConfirm1 -> WaitingConfirm2 -> WaitingConf2Ack
//!      -> Secure -> (optional) GoingClear -> Clear
//! ```
//! plus an absorbing `Error` state reachable from anywhere. Mirrors
//! `dtls::handshaker::HandshakeState`'s small enum-plus-`Display` shape,
//! generalized from DTLS's five states to ZRTP's longer chain since ZRTP's
//! messages are individually acknowledged rather than batched into flights.
//!
//! Each side runs its own H0..H3 hash chain (spec §4.E). A later message
//! from the same sender reveals the next link back, letting the receiver
//! check `hash(revealed) == previously_seen_from_that_sender`; a message's
//! own MAC is keyed by a link the sender hasn't revealed *yet*, so it can
//! only be checked once that link surfaces in a still-later message:
//! Commit's MAC (keyed by the initiator's H1) verifies once DHPart2 reveals
//! that same H1; DHPart1/DHPart2's MACs (keyed by each sender's own H0)
//! verify once that sender's Confirm reveals H0.

use std::fmt;

use crate::algorithm::KeyAgreementAlgorithm;
use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::kdf::KeySchedule;
use crate::negotiation::{self, NegotiatedAlgorithms};
use crate::packet::messages::{
    Commit, Confirm, ConfirmBody, ConfirmRole, Conf2Ack, DhPart, DhPartRole, ErrorMessage, GoClear, Hello, HelloAck, Message, Ping, PingAck,
};
use crate::packet::Packet;
use crate::primitives::Backend;

use super::{ct_eq, Channel, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Init,
    SendingHello,
    WaitingForHello,
    WaitingForPeerAck,
    SendingCommit,
    WaitingDhPart1,
    WaitingDhPart2,
    WaitingConfirm1,
    WaitingConfirm2,
    WaitingConf2Ack,
    Secure,
    GoingClear,
    Clear,
    Error,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

fn frame(channel: &mut Channel, message: Message) -> Result<Vec<u8>> {
    let header = channel.build_header();
    Packet { header, message }.marshal()
}

/// Check the message type is one this state is prepared to receive;
/// anything else is dropped rather than promoted to a protocol `Error`,
/// matching RFC 6189 §5's guidance to silently ignore unexpected messages
/// that may simply be stale retransmissions from an earlier phase.
fn expect(state: ChannelState, allowed: &[ChannelState]) -> Result<()> {
    if allowed.contains(&state) {
        Ok(())
    } else {
        Err(Error::UnexpectedForState)
    }
}

/// `cache` supplies retained secrets for a channel-0 DH exchange (looked up
/// here by peer ZID once Hello reveals it); `msk` supplies the parent
/// session's `zrtp_sess_key` for a Multistream channel.
pub(super) fn transition(channel: &mut Channel, backend: &dyn Backend, cache: &Cache, msk: Option<&[u8]>, packet: Packet, now_ms: u64) -> Result<Vec<Vec<u8>>> {
    match packet.message {
        Message::Hello(hello) => on_hello(channel, backend, cache, hello, now_ms),
        Message::HelloAck(_) => on_hello_ack(channel),
        Message::Commit(commit) => on_commit(channel, backend, msk, commit, now_ms),
        Message::DhPart1(part) => on_dhpart1(channel, backend, part, now_ms),
        Message::DhPart2(part) => on_dhpart2(channel, backend, part, now_ms),
        Message::Confirm1(confirm) => on_confirm1(channel, backend, confirm, now_ms),
        Message::Confirm2(confirm) => on_confirm2(channel, backend, confirm),
        Message::Conf2Ack(_) => on_conf2ack(channel),
        Message::Error(err) => on_error(channel, err),
        Message::GoClear(go_clear) => on_go_clear(channel, go_clear),
        Message::ClearAck(_) => on_clear_ack(channel),
        Message::Ping(ping) => Ok(vec![on_ping(channel, ping)?]),
        _ => Ok(vec![]),
    }
}

/// `Hello` is symmetric -- both sides negotiate and build a `Commit` the
/// moment the peer's `Hello` arrives, rather than pre-electing a single
/// initiator from H3 alone. A non-contending side (`M` or `P` flagged, spec
/// §4.F) instead waits in `WaitingForPeerAck` for the peer's `Commit`; any
/// genuine `Commit`/`Commit` collision between two contending sides is
/// resolved later, in [`on_commit`], once both Commits actually exist.
fn on_hello(channel: &mut Channel, backend: &dyn Backend, cache: &Cache, hello: Hello, now_ms: u64) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::SendingHello, ChannelState::WaitingForHello, ChannelState::Init])?;
    channel.peer_hello = Some(hello.clone());

    if let Some((rs1, rs2)) = cache.lookup(&hello.zid) {
        channel.cached_rs1 = if rs1.is_empty() { None } else { Some(rs1) };
        channel.cached_rs2 = if rs2.is_empty() { None } else { Some(rs2) };
    }

    let ack = frame(channel, Message::HelloAck(HelloAck))?;
    let mut out = vec![ack];

    let local_hello = channel.local_hello.clone().ok_or(Error::InvalidContext)?;
    if local_hello.mitm_pbx || local_hello.passive {
        channel.responder_hello = Some(hello);
        channel.state = ChannelState::WaitingForPeerAck;
        return Ok(out);
    }

    let negotiated = negotiation::negotiate(&local_hello, &hello)?;
    channel.negotiated = Some(negotiated);
    channel.responder_hello = Some(hello);
    channel.role = Some(Role::Initiator);
    let commit_bytes = build_commit(channel, backend, now_ms)?;
    channel.state = ChannelState::SendingCommit;
    channel.arm_retransmit(now_ms, commit_bytes.clone());
    out.push(commit_bytes);
    Ok(out)
}

fn on_hello_ack(channel: &mut Channel) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::SendingHello])?;
    channel.state = ChannelState::WaitingForHello;
    Ok(vec![])
}

/// Builds this channel's `Commit` (Initiator side only). For a DH/KEM
/// agreement, also builds and stores the full `DHPart2` up front so `hvi`
/// (spec glossary: `hash(DHPart2 || responder_Hello)`) can be committed
/// into `Commit` before it is ever sent.
fn build_commit(channel: &mut Channel, backend: &dyn Backend, _now_ms: u64) -> Result<Vec<u8>> {
    let negotiated = channel.negotiated.ok_or(Error::InvalidContext)?;
    let local_hello = channel.local_hello.clone().ok_or(Error::InvalidContext)?;

    let is_pq = negotiated.key_agreement.is_post_quantum();
    let mut kem_public_value = None;
    let mut nonce = None;
    let mut key_id = None;
    let hvi = if negotiated.key_agreement.is_non_dh() {
        nonce = Some(backend.random(16).try_into().map_err(|_| Error::InvalidMessage)?);
        if negotiated.key_agreement == KeyAgreementAlgorithm::Preshared {
            key_id = Some(super::retained_secret_id(backend, negotiated.hash, channel.cached_rs1.as_deref()));
        }
        None
    } else {
        let keypair = backend.generate_keypair(negotiated.key_agreement)?;
        // KEMs are asymmetric: only the initiator ever holds a keypair, and
        // it publishes the public half in Commit so the responder can
        // encapsulate against it (spec §4.C). DHPart2 therefore carries no
        // useful public value for a KEM exchange -- a fixed-length random
        // nonce stands in so the hvi/hash-chain machinery built for DH
        // still has something concrete to commit to.
        let part2_public_value = if is_pq {
            kem_public_value = Some(keypair.public_bytes.clone());
            backend.random(32)
        } else {
            keypair.public_bytes.clone()
        };

        let rs1_id = super::retained_secret_id(backend, negotiated.hash, channel.cached_rs1.as_deref());
        let rs2_id = super::retained_secret_id(backend, negotiated.hash, channel.cached_rs2.as_deref());
        let mut part2 = DhPart {
            h1: channel.hash_chain.h1.clone().try_into().map_err(|_| Error::InvalidMessage)?,
            rs1_id,
            rs2_id,
            aux_secret_id: [0u8; 8],
            pbx_secret_id: [0u8; 8],
            public_value: part2_public_value,
            mac: [0u8; 8],
        };
        part2.mac = super::mac8(backend, negotiated.hash, &channel.hash_chain.h0, &part2.mac_input(DhPartRole::Part2)?);

        let responder_hello = channel.peer_hello.clone().ok_or(Error::InvalidPeerHello)?;
        let mut preimage = crate::packet::message_only_bytes(&Message::DhPart2(part2.clone()))?;
        preimage.extend_from_slice(&crate::packet::message_only_bytes(&Message::Hello(responder_hello))?);
        let hvi_full = backend.hash(negotiated.hash, &preimage);
        let mut hvi_arr = [0u8; 32];
        let n = hvi_full.len().min(32);
        hvi_arr[..n].copy_from_slice(&hvi_full[..n]);

        channel.local_keypair = Some(keypair);
        channel.dhpart2 = Some(part2);
        Some(hvi_arr)
    };

    let mut commit = Commit {
        h2: channel.hash_chain.h2.clone().try_into().map_err(|_| Error::InvalidMessage)?,
        zid: local_hello.zid,
        hash_algorithm: negotiated.hash,
        cipher_algorithm: negotiated.cipher,
        auth_tag_algorithm: negotiated.auth_tag,
        key_agreement_algorithm: negotiated.key_agreement,
        sas_algorithm: negotiated.sas,
        hvi,
        kem_public_value,
        nonce,
        key_id,
        mac: [0u8; 8],
    };
    commit.mac = super::mac8(backend, negotiated.hash, &channel.hash_chain.h1, &commit.mac_input()?);
    channel.commit = Some(commit.clone());
    frame(channel, Message::Commit(commit))
}

fn on_commit(channel: &mut Channel, backend: &dyn Backend, msk: Option<&[u8]>, commit: Commit, now_ms: u64) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::WaitingForPeerAck, ChannelState::SendingCommit])?;

    if channel.state == ChannelState::SendingCommit {
        // Both sides negotiated from the same pair of Hellos and sent a
        // Commit before seeing the other's -- a genuine collision (spec
        // §4.F), not an edge case, since every non-`M`/`P` side always
        // commits immediately after `Hello`.
        let ours = channel.commit.clone().ok_or(Error::InvalidContext)?;
        let local_zid = channel.local_hello.as_ref().map(|h| h.zid).ok_or(Error::InvalidContext)?;
        let peer_zid = channel.peer_hello.as_ref().map(|h| h.zid).ok_or(Error::InvalidPeerHello)?;
        if negotiation::resolve_commit_collision(&ours, &commit, &local_zid, &peer_zid) {
            // We keep the initiator role; the peer's crossed Commit loses
            // and is simply dropped, leaving our own Commit/DHPart2 intact.
            return Ok(vec![]);
        }
        // We lose the race and become responder instead; discard the
        // initiator-side state our own (superseded) Commit had started.
        channel.local_keypair = None;
        channel.dhpart2 = None;
        channel.commit = None;
    }
    channel.disarm_retransmit();

    let peer_hello = channel.peer_hello.clone().ok_or(Error::InvalidPeerHello)?;
    if !super::HashChain::verify_link(backend, channel.hash, &peer_hello.h3, &commit.h2) {
        return Err(Error::UnmatchingHashChain);
    }
    // The initiator's Hello was MAC'd under its own (then-unrevealed) H2;
    // Commit now reveals exactly that H2, so it verifies here.
    let expected_hello_mac = super::mac8(backend, commit.hash_algorithm, &commit.h2, &peer_hello.mac_input()?);
    if !ct_eq(&expected_hello_mac, &peer_hello.mac) {
        return Err(Error::UnmatchingMac);
    }

    channel.role = Some(Role::Responder);
    let negotiated = NegotiatedAlgorithms {
        hash: commit.hash_algorithm,
        cipher: commit.cipher_algorithm,
        auth_tag: commit.auth_tag_algorithm,
        key_agreement: commit.key_agreement_algorithm,
        sas: commit.sas_algorithm,
    };
    channel.negotiated = Some(negotiated);
    channel.responder_hello = channel.local_hello.clone();
    channel.commit = Some(commit.clone());

    if commit.key_agreement_algorithm.is_non_dh() {
        let key_material = if commit.key_agreement_algorithm == KeyAgreementAlgorithm::Preshared {
            channel.cached_rs1.as_deref().map(|b| b.to_vec())
        } else {
            msk.map(|b| b.to_vec())
        };
        let key = key_material.ok_or(Error::ContextNotReady)?;
        let ctx = super::kdf_context(channel, backend, negotiated.hash)?;
        channel.key_schedule = Some(KeySchedule::derive_multistream(backend, negotiated.hash, &key, &ctx));
        channel.state = ChannelState::WaitingConfirm2;
        let confirm_bytes = build_confirm(channel, backend, ConfirmRole::Confirm1)?;
        channel.arm_retransmit(now_ms, confirm_bytes.clone());
        return Ok(vec![confirm_bytes]);
    }

    // A KEM is asymmetric: the responder never generates its own keypair,
    // it encapsulates against the initiator's public key carried in
    // Commit and gets the shared secret immediately, with no later
    // decapsulation step (spec §4.C). Classic DH/ECDH stays symmetric:
    // both sides generate a keypair and `agree` once the peer's public
    // value arrives.
    let part1_public_value = if negotiated.key_agreement.is_post_quantum() {
        let peer_public = commit.kem_public_value.clone().ok_or(Error::InvalidMessage)?;
        let (ciphertext, secret) = backend.encapsulate(negotiated.key_agreement, &peer_public)?;
        channel.pending_secret = Some(secret);
        ciphertext
    } else {
        let keypair = backend.generate_keypair(commit.key_agreement_algorithm)?;
        let public_bytes = keypair.public_bytes.clone();
        channel.local_keypair = Some(keypair);
        public_bytes
    };

    let rs1_id = super::retained_secret_id(backend, negotiated.hash, channel.cached_rs1.as_deref());
    let rs2_id = super::retained_secret_id(backend, negotiated.hash, channel.cached_rs2.as_deref());
    let mut part1 = DhPart {
        h1: channel.hash_chain.h1.clone().try_into().map_err(|_| Error::InvalidMessage)?,
        rs1_id,
        rs2_id,
        aux_secret_id: [0u8; 8],
        pbx_secret_id: [0u8; 8],
        public_value: part1_public_value,
        mac: [0u8; 8],
    };
    part1.mac = super::mac8(backend, negotiated.hash, &channel.hash_chain.h0, &part1.mac_input(DhPartRole::Part1)?);

    channel.dhpart1 = Some(part1.clone());
    channel.state = ChannelState::WaitingDhPart2;
    let bytes = frame(channel, Message::DhPart1(part1))?;
    channel.arm_retransmit(now_ms, bytes.clone());
    Ok(vec![bytes])
}

/// Finish a DH/KEM exchange once the peer's half of it has arrived:
/// `part` is the peer's `DHPart1` (seen by the initiator) or `DHPart2`
/// (seen by the responder). Classic DH/ECDH is symmetric -- both roles
/// `agree` their own keypair against `part.public_value`. A KEM is not:
/// the initiator decapsulates `part.public_value` (the responder's
/// ciphertext) against the keypair it generated in `build_commit`; the
/// responder already has its shared secret from encapsulating in
/// `on_commit` and merely reclaims it here once the hash-chain/hvi checks
/// on `part` (the initiator's DHPart2, a nonce for KEM modes) pass.
fn finish_dh_exchange(channel: &mut Channel, backend: &dyn Backend, part: &DhPart) -> Result<()> {
    let negotiated = channel.negotiated.ok_or(Error::InvalidContext)?;

    let secret = if negotiated.key_agreement.is_post_quantum() {
        match channel.role {
            Some(Role::Initiator) => {
                let keypair = channel.local_keypair.as_ref().ok_or(Error::InvalidContext)?;
                backend.decapsulate(keypair, &part.public_value)?
            }
            Some(Role::Responder) => channel.pending_secret.take().ok_or(Error::InvalidContext)?,
            None => return Err(Error::InvalidContext),
        }
    } else {
        let keypair = channel.local_keypair.as_ref().ok_or(Error::InvalidContext)?;
        backend.agree(keypair, &part.public_value)?
    };

    channel.peer_public_value = Some(part.public_value.clone());
    let context = super::kdf_context(channel, backend, negotiated.hash)?;
    let s1 = channel.cached_rs1.clone();
    channel.key_schedule = Some(KeySchedule::derive_channel0(backend, negotiated.hash, &secret, &context, s1.as_deref(), None, None));
    Ok(())
}

fn on_dhpart1(channel: &mut Channel, backend: &dyn Backend, part: DhPart, now_ms: u64) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::WaitingDhPart1, ChannelState::SendingCommit])?;
    channel.disarm_retransmit();

    let peer_hello = channel.peer_hello.clone().ok_or(Error::InvalidPeerHello)?;
    let negotiated = channel.negotiated.ok_or(Error::InvalidContext)?;
    // DHPart1 reveals the responder's H1; the responder never sent a
    // Commit, so this is checked two steps back against the H3 its own
    // Hello already committed to.
    let h2 = backend.hash(negotiated.hash, &part.h1);
    if !ct_eq(&backend.hash(negotiated.hash, &h2), &peer_hello.h3) {
        return Err(Error::UnmatchingHashChain);
    }

    channel.dhpart1 = Some(part.clone());
    finish_dh_exchange(channel, backend, &part)?;
    channel.state = ChannelState::WaitingConfirm1;

    let dhpart2 = channel.dhpart2.clone().ok_or(Error::InvalidContext)?;
    let bytes = frame(channel, Message::DhPart2(dhpart2))?;
    channel.arm_retransmit(now_ms, bytes.clone());
    Ok(vec![bytes])
}

fn on_dhpart2(channel: &mut Channel, backend: &dyn Backend, part: DhPart, now_ms: u64) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::WaitingDhPart2])?;
    channel.disarm_retransmit();

    let negotiated = channel.negotiated.ok_or(Error::InvalidContext)?;
    let commit = channel.commit.clone().ok_or(Error::InvalidContext)?;
    if !super::HashChain::verify_link(backend, negotiated.hash, &commit.h2, &part.h1) {
        return Err(Error::UnmatchingHashChain);
    }
    // DHPart2 reveals the initiator's H1, the same value Commit's MAC was
    // keyed with.
    let expected_commit_mac = super::mac8(backend, negotiated.hash, &part.h1, &commit.mac_input()?);
    if !ct_eq(&expected_commit_mac, &commit.mac) {
        return Err(Error::UnmatchingMac);
    }

    // hvi commits the initiator to this exact DHPart2 plus the responder's
    // own Hello (spec glossary); verified now that both are in hand.
    if let Some(expected_hvi) = commit.hvi {
        let responder_hello = channel.responder_hello.clone().ok_or(Error::InvalidContext)?;
        let mut preimage = crate::packet::message_only_bytes(&Message::DhPart2(part.clone()))?;
        preimage.extend_from_slice(&crate::packet::message_only_bytes(&Message::Hello(responder_hello))?);
        let hvi_full = backend.hash(negotiated.hash, &preimage);
        let mut hvi_arr = [0u8; 32];
        let n = hvi_full.len().min(32);
        hvi_arr[..n].copy_from_slice(&hvi_full[..n]);
        if !ct_eq(&hvi_arr, &expected_hvi) {
            return Err(Error::UnmatchingHvi);
        }
    }

    channel.dhpart2 = Some(part.clone());
    finish_dh_exchange(channel, backend, &part)?;
    channel.state = ChannelState::WaitingConfirm2;
    let confirm_bytes = build_confirm(channel, backend, ConfirmRole::Confirm1)?;
    channel.arm_retransmit(now_ms, confirm_bytes.clone());
    Ok(vec![confirm_bytes])
}

fn build_confirm(channel: &mut Channel, backend: &dyn Backend, role: ConfirmRole) -> Result<Vec<u8>> {
    let negotiated = channel.negotiated.ok_or(Error::ContextNotReady)?;
    let key_schedule = channel.key_schedule.as_ref().ok_or(Error::ContextNotReady)?;
    let (zrtp_key, mac_key) = match role {
        ConfirmRole::Confirm1 => (&key_schedule.zrtp_key_responder, &key_schedule.mac_key_responder),
        ConfirmRole::Confirm2 => (&key_schedule.zrtp_key_initiator, &key_schedule.mac_key_initiator),
    };

    let body = ConfirmBody {
        h0: channel.hash_chain.h0.clone().try_into().map_err(|_| Error::InvalidMessage)?,
        sig_len_words: 0,
        flags: 0,
        cache_expiration_seconds: 0,
    };
    let mut body_bytes = Vec::with_capacity(ConfirmBody::ENCODED_LEN);
    body.marshal(&mut body_bytes)?;

    let cfb_iv: [u8; 16] = backend.random(16).try_into().map_err(|_| Error::InvalidMessage)?;
    let encrypted_body = backend.cipher_encrypt(negotiated.cipher, zrtp_key, &cfb_iv, &body_bytes)?;

    let mut mac_input = cfb_iv.to_vec();
    mac_input.extend_from_slice(&encrypted_body);
    let confirm_mac = super::mac8(backend, negotiated.hash, mac_key, &mac_input);

    let confirm = Confirm {
        confirm_mac,
        cfb_iv,
        encrypted_body,
    };
    let message = match role {
        ConfirmRole::Confirm1 => Message::Confirm1(confirm),
        ConfirmRole::Confirm2 => Message::Confirm2(confirm),
    };
    frame(channel, message)
}

fn on_confirm1(channel: &mut Channel, backend: &dyn Backend, confirm: Confirm, now_ms: u64) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::WaitingConfirm1, ChannelState::SendingCommit])?;
    channel.disarm_retransmit();
    verify_confirm(channel, backend, &confirm)?;
    channel.state = ChannelState::WaitingConf2Ack;
    let response = build_confirm(channel, backend, ConfirmRole::Confirm2)?;
    channel.arm_retransmit(now_ms, response.clone());
    Ok(vec![response])
}

fn on_confirm2(channel: &mut Channel, backend: &dyn Backend, confirm: Confirm) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::WaitingConfirm2])?;
    channel.disarm_retransmit();
    verify_confirm(channel, backend, &confirm)?;
    channel.state = ChannelState::Secure;
    channel.set_confirmed();
    let ack = frame(channel, Message::Conf2Ack(Conf2Ack))?;
    Ok(vec![ack])
}

/// Decrypts and authenticates an incoming Confirm, then performs the
/// deferred hash-chain/MAC checks its revealed H0 finally makes possible:
/// for a DH/KEM exchange, against the peer's DHPart; for Multistream or
/// Preshared (no DHPart exists), a two-step check against Commit instead.
fn verify_confirm(channel: &mut Channel, backend: &dyn Backend, confirm: &Confirm) -> Result<()> {
    let negotiated = channel.negotiated.ok_or(Error::ContextNotReady)?;
    let key_schedule = channel.key_schedule.as_ref().ok_or(Error::ContextNotReady)?;
    let (zrtp_key, mac_key) = match channel.role {
        Some(Role::Initiator) => (&key_schedule.zrtp_key_responder, &key_schedule.mac_key_responder),
        Some(Role::Responder) => (&key_schedule.zrtp_key_initiator, &key_schedule.mac_key_initiator),
        None => return Err(Error::InvalidContext),
    };

    let mut mac_input = confirm.cfb_iv.to_vec();
    mac_input.extend_from_slice(&confirm.encrypted_body);
    let expected_mac = super::mac8(backend, negotiated.hash, mac_key, &mac_input);
    if !ct_eq(&expected_mac, &confirm.confirm_mac) {
        return Err(Error::UnmatchingConfirmMac);
    }

    let plaintext = backend.cipher_decrypt(negotiated.cipher, zrtp_key, &confirm.cfb_iv, &confirm.encrypted_body)?;
    let body = ConfirmBody::unmarshal(&mut &plaintext[..])?;

    let commit = channel.commit.clone().ok_or(Error::InvalidContext)?;
    if commit.key_agreement_algorithm.is_non_dh() {
        let h1 = backend.hash(negotiated.hash, &body.h0);
        if !ct_eq(&backend.hash(negotiated.hash, &h1), &commit.h2) {
            return Err(Error::UnmatchingHashChain);
        }
        let expected = super::mac8(backend, negotiated.hash, &h1, &commit.mac_input()?);
        if !ct_eq(&expected, &commit.mac) {
            return Err(Error::UnmatchingMac);
        }
    } else {
        let (peer_part, role) = match channel.role {
            Some(Role::Initiator) => (channel.dhpart1.clone(), DhPartRole::Part1),
            Some(Role::Responder) => (channel.dhpart2.clone(), DhPartRole::Part2),
            None => return Err(Error::InvalidContext),
        };
        let peer_part = peer_part.ok_or(Error::InvalidContext)?;
        if !ct_eq(&backend.hash(negotiated.hash, &body.h0), &peer_part.h1) {
            return Err(Error::UnmatchingHashChain);
        }
        let expected = super::mac8(backend, negotiated.hash, &body.h0, &peer_part.mac_input(role)?);
        if !ct_eq(&expected, &peer_part.mac) {
            return Err(Error::UnmatchingMac);
        }
    }
    Ok(())
}

fn on_conf2ack(channel: &mut Channel) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::WaitingConf2Ack])?;
    channel.state = ChannelState::Secure;
    channel.set_confirmed();
    Ok(vec![])
}

fn on_error(channel: &mut Channel, err: ErrorMessage) -> Result<Vec<Vec<u8>>> {
    channel.state = ChannelState::Error;
    Err(Error::PeerError(err.code.to_wire()))
}

fn on_go_clear(channel: &mut Channel, _go_clear: GoClear) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::Secure])?;
    channel.state = ChannelState::GoingClear;
    let ack = frame(channel, Message::ClearAck(crate::packet::messages::ClearAck))?;
    channel.state = ChannelState::Clear;
    Ok(vec![ack])
}

fn on_clear_ack(channel: &mut Channel) -> Result<Vec<Vec<u8>>> {
    expect(channel.state, &[ChannelState::GoingClear])?;
    channel.state = ChannelState::Clear;
    Ok(vec![])
}

/// `Ping` is answered unconditionally, independent of `ChannelState` (spec
/// §10 supplement): a liveness probe must work even mid-handshake.
/// `receiver_ep_hash` has no dedicated endpoint-hash mechanism in this
/// implementation, so it is stood in by this channel's own H3 truncated to
/// 8 bytes -- see DESIGN.md.
fn on_ping(channel: &mut Channel, ping: Ping) -> Result<Vec<u8>> {
    let mut receiver_ep_hash = [0u8; 8];
    let n = channel.hash_chain.h3.len().min(8);
    receiver_ep_hash[..n].copy_from_slice(&channel.hash_chain.h3[..n]);
    let ack = PingAck {
        version: ping.version,
        sender_ep_hash: ping.ep_hash,
        receiver_ep_hash,
        ssrc: channel.ssrc,
    };
    frame(channel, Message::PingAck(ack))
}
