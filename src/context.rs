//! Context & Multi-Channel Controller (spec component G): the host-facing
//! entry point. Owns the cache, the primitive backend, and every
//! [`Channel`] keyed by SSRC; channel 0 is the only one allowed to run a
//! full DH exchange, every channel added afterward runs Multistream mode
//! against channel 0's `zrtp_sess_key`.
//!
//! The `Callbacks` struct mirrors `dtls::handshaker::HandshakeConfig`'s bag
//! of `Option<...>` host hooks (`local_psk_callback`, `on_flight_state`,
//! ...), generalized to ZRTP's cache/SAS/SRTP-export touch points.

use std::collections::HashMap;

use crate::algorithm::{HashAlgorithm, KeyAgreementAlgorithm};
use crate::cache::Cache;
use crate::channel::{Channel, ChannelState};
use crate::error::{Error, Result};
use crate::kdf::SrtpKeys;
use crate::packet::messages::Hello;
use crate::packet::Packet;
use crate::primitives::{Backend, RustCryptoBackend};
use crate::sas;

/// Host hooks a [`Context`] calls out to at well-defined points. None of
/// these may re-enter the `Context` (the teacher's non-reentrant callback
/// convention, carried over unchanged): a callback that needs to feed data
/// back in does so by returning a value, never by calling back into the
/// `Context` it was invoked from.
pub struct Callbacks {
    pub load_cache: Box<dyn FnMut() -> Vec<u8>>,
    pub store_cache: Box<dyn FnMut(&[u8])>,
    pub send_data: Box<dyn FnMut(u32, &[u8])>,
    pub srtp_secrets_available: Box<dyn FnMut(u32, &SrtpKeys)>,
    /// `sas`: the real Short Authentication String to read aloud.
    /// `verified`: whether the cache already has this confirmed for the
    /// peer ZID from a prior session (spec §6: "the verified flag read
    /// from the cache"), letting a host skip re-prompting the user.
    /// `decoys`: up to three additional SAS-shaped strings (RFC 6189
    /// §5.16's Gotham City threat model) a host may interleave with the
    /// real one when displaying it to deter a passive observer from
    /// learning which string actually needs verifying.
    pub sas_ready: Box<dyn FnMut(u32, &str, bool, &[String])>,
    pub status_message: Box<dyn FnMut(u32, &str)>,
}

/// Static per-endpoint identity and advertised algorithm preferences,
/// supplied once at construction. `zid` is the 12-byte ZID RFC 6189 §4.3.2
/// requires every endpoint to generate once and keep stable thereafter.
pub struct EndpointConfig {
    pub zid: [u8; 12],
    pub client_id: [u8; 16],
    /// `M` flag (spec §4.F): set for a PBX-like endpoint that must never
    /// contend for the initiator role.
    pub mitm_pbx: bool,
    pub hash_algorithms: Vec<HashAlgorithm>,
    pub cipher_algorithms: Vec<crate::algorithm::CipherAlgorithm>,
    pub auth_tag_algorithms: Vec<crate::algorithm::AuthTagAlgorithm>,
    pub key_agreement_algorithms: Vec<KeyAgreementAlgorithm>,
    pub sas_algorithms: Vec<crate::algorithm::SasAlgorithm>,
}

pub struct Context {
    config: EndpointConfig,
    backend: Box<dyn Backend>,
    callbacks: Callbacks,
    cache: Cache,
    channels: HashMap<u32, Channel>,
    sas_verified: bool,
}

impl Context {
    pub fn new(config: EndpointConfig, callbacks: Callbacks) -> Self {
        let backend: Box<dyn Backend> = Box::new(RustCryptoBackend::default());
        Self::with_backend(config, callbacks, backend)
    }

    pub fn with_backend(mut config: EndpointConfig, mut callbacks: Callbacks, backend: Box<dyn Backend>) -> Self {
        let cache_blob = (callbacks.load_cache)();
        let cache = Cache::deserialize(config.zid, &cache_blob).unwrap_or_else(|_| Cache::new(config.zid));
        config.key_agreement_algorithms.retain(|k| k.is_non_dh() || backend.supported_key_agreements().contains(k));
        Self {
            config,
            backend,
            callbacks,
            cache,
            channels: HashMap::new(),
            sas_verified: false,
        }
    }

    /// Start channel 0, generating its Hello and moving it to
    /// `SendingHello`. Must be called before any other channel is added
    /// (spec §4.G invariant: multistream channels require channel 0's
    /// `zrtp_sess_key` to already exist).
    pub fn start(&mut self, ssrc: u32, now_ms: u64) -> Result<()> {
        if !self.channels.is_empty() {
            return Err(Error::SessionNotReady);
        }
        let hash = HashAlgorithm::MANDATORY;
        let mut channel = Channel::new(ssrc, hash, self.backend.as_ref(), false);
        let hello = self.build_hello(&channel);
        channel.local_hello = Some(hello.clone());
        channel.state = ChannelState::SendingHello;
        self.channels.insert(ssrc, channel);

        let channel = self.channels.get_mut(&ssrc).unwrap();
        let packet = Packet {
            header: channel.build_header(),
            message: crate::packet::messages::Message::Hello(hello),
        };
        let bytes = packet.marshal()?;
        channel.arm_retransmit(now_ms, bytes.clone());
        (self.callbacks.send_data)(ssrc, &bytes);
        Ok(())
    }

    /// Add a Multistream channel (spec §4.G). Fails unless channel 0 has
    /// already reached `Secure`.
    pub fn add_channel(&mut self, ssrc: u32, now_ms: u64) -> Result<()> {
        let channel_zero_secure = self
            .channels
            .values()
            .any(|c| !c.is_multistream && c.state == ChannelState::Secure);
        if !channel_zero_secure {
            return Err(Error::SessionNotReady);
        }
        let hash = HashAlgorithm::MANDATORY;
        let mut channel = Channel::new(ssrc, hash, self.backend.as_ref(), true);
        let hello = self.build_hello(&channel);
        channel.local_hello = Some(hello.clone());
        channel.state = ChannelState::SendingHello;
        self.channels.insert(ssrc, channel);

        let channel = self.channels.get_mut(&ssrc).unwrap();
        let packet = Packet {
            header: channel.build_header(),
            message: crate::packet::messages::Message::Hello(hello),
        };
        let bytes = packet.marshal()?;
        channel.arm_retransmit(now_ms, bytes.clone());
        (self.callbacks.send_data)(ssrc, &bytes);
        Ok(())
    }

    fn build_hello(&self, channel: &Channel) -> Hello {
        use crate::algorithm::with_mandatory;
        Hello {
            version: *b"1.10",
            client_id: self.config.client_id,
            h3: channel.hash_chain.h3.clone().try_into().unwrap_or([0u8; 32]),
            zid: self.config.zid,
            signature_capable: false,
            mitm_pbx: self.config.mitm_pbx,
            passive: false,
            hash_algorithms: with_mandatory(&self.config.hash_algorithms, HashAlgorithm::mandatory_set()),
            cipher_algorithms: with_mandatory(&self.config.cipher_algorithms, crate::algorithm::CipherAlgorithm::mandatory_set()),
            auth_tag_algorithms: with_mandatory(&self.config.auth_tag_algorithms, crate::algorithm::AuthTagAlgorithm::mandatory_set()),
            key_agreement_algorithms: with_mandatory(&self.config.key_agreement_algorithms, KeyAgreementAlgorithm::mandatory_set()),
            sas_algorithms: with_mandatory(&self.config.sas_algorithms, crate::algorithm::SasAlgorithm::mandatory_set()),
            mac: [0u8; 8],
        }
    }

    /// The session's `zrtp_sess_key`, established once channel 0 reaches
    /// `Secure` (spec §3 invariant). Multistream channels feed this in as
    /// their key-derivation seed instead of running their own DH/KEM.
    fn channel_zero_msk(&self) -> Option<Vec<u8>> {
        self.channels
            .values()
            .find(|c| !c.is_multistream && c.state == ChannelState::Secure)
            .and_then(|c| c.zrtp_sess_key())
            .map(|k| k.to_vec())
    }

    /// Feed one received datagram for `ssrc` into its channel.
    pub fn process_message(&mut self, ssrc: u32, raw: &[u8], now_ms: u64) -> Result<()> {
        let key_agreement = self.channels.get(&ssrc).and_then(|c| c.negotiated).map(|n| n.key_agreement);
        let packet = match Packet::unmarshal_lenient(raw, key_agreement) {
            crate::packet::ParseOutcome::Ok(p) => p,
            crate::packet::ParseOutcome::Drop(e) => {
                (self.callbacks.status_message)(ssrc, &format!("dropped malformed packet: {e}"));
                return Ok(());
            }
        };

        let msk = self.channel_zero_msk();
        let channel = self.channels.entry(ssrc).or_insert_with(|| Channel::new(ssrc, HashAlgorithm::MANDATORY, self.backend.as_ref(), false));
        let was_secure = channel.state == ChannelState::Secure;
        let responses = match channel.process_message(self.backend.as_ref(), &self.cache, msk.as_deref(), packet, now_ms) {
            Ok(responses) => responses,
            // RFC 6189 §5: a message that doesn't fit the channel's current
            // state (a stale retransmission, a HelloAck crossed on the wire
            // by messages that already advanced the state past it) is
            // ignored, not treated as a protocol failure.
            Err(Error::UnexpectedForState) => {
                (self.callbacks.status_message)(ssrc, "dropped message not valid for the channel's current state");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let became_secure = self.channels.get(&ssrc).map(|c| c.state == ChannelState::Secure).unwrap_or(false);

        for bytes in responses {
            (self.callbacks.send_data)(ssrc, &bytes);
        }

        if !was_secure && became_secure {
            self.on_channel_secure(ssrc);
        }
        Ok(())
    }

    fn on_channel_secure(&mut self, ssrc: u32) {
        let Some(channel) = self.channels.get(&ssrc) else { return };
        let Some(negotiated) = channel.negotiated else { return };
        let Some(key_schedule) = channel.key_schedule.as_ref() else { return };
        let Ok(kdf_context) = crate::channel::kdf_context(channel, self.backend.as_ref(), negotiated.hash) else { return };

        let srtp_keys = SrtpKeys::derive(
            self.backend.as_ref(),
            negotiated.hash,
            negotiated.cipher.key_size(),
            &key_schedule.zrtp_sess_key,
            &kdf_context,
        );
        (self.callbacks.srtp_secrets_available)(ssrc, &srtp_keys);

        let sas_hash = crate::kdf::kdf(self.backend.as_ref(), negotiated.hash, &key_schedule.s0, crate::kdf::labels::SAS, &kdf_context, 4);
        let rendered = match negotiated.sas {
            crate::algorithm::SasAlgorithm::Base32 => sas::render_base32(&sas_hash),
            crate::algorithm::SasAlgorithm::Base256 => sas::render_base256(&sas_hash),
        };
        let peer_zid = channel.peer_hello.as_ref().map(|h| h.zid).unwrap_or([0u8; 12]);
        let decoys: Vec<String> = (0..3)
            .map(|i| {
                let seed = self.backend.random(4 + i);
                sas::render_decoy(&peer_zid, &seed)
            })
            .collect();
        let previously_verified = self.cache.sas_verified(&peer_zid);
        (self.callbacks.sas_ready)(ssrc, &rendered, previously_verified, &decoys);

        if !channel.is_multistream {
            if let Some(peer_zid) = channel.peer_hello.as_ref().map(|h| h.zid) {
                let new_rs = crate::kdf::kdf(
                    self.backend.as_ref(),
                    negotiated.hash,
                    &key_schedule.s0,
                    crate::kdf::labels::RETAINED_SECRET,
                    &kdf_context,
                    32,
                );
                let now_unix = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                self.cache.update(peer_zid, new_rs.to_vec(), now_unix);
            }
            let blob = self.cache.serialize();
            (self.callbacks.store_cache)(&blob);
        }
    }

    /// Host confirms the human-verified SAS out of band (spec component
    /// G). Once set, later reconnects between the same ZID pair are
    /// allowed to skip re-reading the SAS aloud, per RFC 6189 §4.7. Persists
    /// immediately into the cache keyed by channel 0's peer ZID and pushes
    /// the updated blob back out through `store_cache`.
    pub fn set_sas_verified(&mut self, verified: bool) {
        self.sas_verified = verified;
        if let Some(peer_zid) = self.channels.values().find(|c| !c.is_multistream).and_then(|c| c.peer_hello.as_ref()).map(|h| h.zid) {
            let now_unix = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            self.cache.set_sas_verified(peer_zid, verified, now_unix);
            let blob = self.cache.serialize();
            (self.callbacks.store_cache)(&blob);
        }
    }

    pub fn sas_verified(&self) -> bool {
        self.sas_verified
    }

    /// Forget every retained secret this host has cached for every peer
    /// (spec §6 control surface: `reset_retained_secrets`), then persist
    /// the now-empty cache. Does not affect the current session's
    /// already-derived `ZRTPSess`/SRTP keys, only what future sessions
    /// with any peer will be able to look up.
    pub fn reset_retained_secrets(&mut self) {
        self.cache.reset_retained_secrets();
        let blob = self.cache.serialize();
        (self.callbacks.store_cache)(&blob);
    }

    /// Drive retransmission for every channel; call on a regular host
    /// timer tick (suggested interval: the smallest per-channel retransmit
    /// delay currently armed, or 50ms if none are armed yet).
    pub fn iterate(&mut self, now_ms: u64) {
        let ssrcs: Vec<u32> = self.channels.keys().copied().collect();
        for ssrc in ssrcs {
            let resend = {
                let Some(channel) = self.channels.get_mut(&ssrc) else { continue };
                channel.iterate(now_ms)
            };
            match resend {
                Ok(Some(bytes)) => (self.callbacks.send_data)(ssrc, &bytes),
                Ok(None) => {}
                Err(e) => (self.callbacks.status_message)(ssrc, &format!("channel {ssrc} failed: {e}")),
            }
        }
    }

    /// Tear down a channel, e.g. when its RTP stream ends.
    pub fn reset(&mut self, ssrc: u32) {
        self.channels.remove(&ssrc);
    }

    pub fn channel_state(&self, ssrc: u32) -> Option<ChannelState> {
        self.channels.get(&ssrc).map(|c| c.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_callbacks() -> Callbacks {
        Callbacks {
            load_cache: Box::new(Vec::new),
            store_cache: Box::new(|_| {}),
            send_data: Box::new(|_, _| {}),
            srtp_secrets_available: Box::new(|_, _| {}),
            sas_ready: Box::new(|_, _, _, _| {}),
            status_message: Box::new(|_, _| {}),
        }
    }

    fn test_config(zid: u8) -> EndpointConfig {
        EndpointConfig {
            zid: [zid; 12],
            client_id: *b"zrtp-rs/test    ",
            mitm_pbx: false,
            hash_algorithms: vec![HashAlgorithm::Sha256],
            cipher_algorithms: vec![crate::algorithm::CipherAlgorithm::Aes1],
            auth_tag_algorithms: vec![crate::algorithm::AuthTagAlgorithm::HmacSha132],
            key_agreement_algorithms: vec![KeyAgreementAlgorithm::Dh3072],
            sas_algorithms: vec![crate::algorithm::SasAlgorithm::Base32],
        }
    }

    #[test]
    fn start_sends_hello() {
        let sent = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sent_clone = sent.clone();
        let mut callbacks = noop_callbacks();
        callbacks.send_data = Box::new(move |_ssrc, bytes| sent_clone.borrow_mut().push(bytes.to_vec()));
        let mut ctx = Context::new(test_config(1), callbacks);
        ctx.start(1234, 0).unwrap();
        assert_eq!(sent.borrow().len(), 1);
        assert_eq!(ctx.channel_state(1234), Some(ChannelState::SendingHello));
    }

    #[test]
    fn add_channel_before_secure_fails() {
        let mut ctx = Context::new(test_config(2), noop_callbacks());
        ctx.start(1, 0).unwrap();
        assert!(ctx.add_channel(2, 0).is_err());
    }

    #[test]
    fn reset_retained_secrets_stores_an_empty_cache_blob() {
        let stored = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let stored_clone = stored.clone();
        let mut callbacks = noop_callbacks();
        callbacks.store_cache = Box::new(move |blob| *stored_clone.borrow_mut() = blob.to_vec());
        let mut ctx = Context::new(test_config(3), callbacks);
        ctx.cache.update([9u8; 12], vec![1, 2, 3], 1000);
        ctx.reset_retained_secrets();
        let blob = stored.borrow().clone();
        let restored = Cache::deserialize([3u8; 12], &blob).unwrap();
        assert!(restored.lookup(&[9u8; 12]).is_none());
    }
}
