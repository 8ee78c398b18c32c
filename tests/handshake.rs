use std::cell::RefCell;
use std::rc::Rc;

use zrtp::algorithm::{AuthTagAlgorithm, CipherAlgorithm, HashAlgorithm, KeyAgreementAlgorithm, SasAlgorithm};
use zrtp::channel::ChannelState;
use zrtp::context::{Callbacks, Context, EndpointConfig};

fn endpoint(zid: u8) -> EndpointConfig {
    EndpointConfig {
        zid: [zid; 12],
        client_id: *b"zrtp-rs/test    ",
        mitm_pbx: false,
        hash_algorithms: vec![HashAlgorithm::Sha256],
        cipher_algorithms: vec![CipherAlgorithm::Aes1],
        auth_tag_algorithms: vec![AuthTagAlgorithm::HmacSha132, AuthTagAlgorithm::HmacSha180],
        key_agreement_algorithms: vec![KeyAgreementAlgorithm::Dh3072, KeyAgreementAlgorithm::Ec25],
        sas_algorithms: vec![SasAlgorithm::Base32],
    }
}

fn recording_callbacks() -> (Callbacks, Rc<RefCell<Vec<Vec<u8>>>>) {
    let outbox = Rc::new(RefCell::new(Vec::new()));
    let outbox_clone = outbox.clone();
    let callbacks = Callbacks {
        load_cache: Box::new(Vec::new),
        store_cache: Box::new(|_| {}),
        send_data: Box::new(move |_ssrc, bytes| outbox_clone.borrow_mut().push(bytes.to_vec())),
        srtp_secrets_available: Box::new(|_, _| {}),
        sas_ready: Box::new(|_, _, _, _| {}),
        status_message: Box::new(|_, _| {}),
    };
    (callbacks, outbox)
}

/// Both sides send `Hello` and exchange `HelloACK`; this is the portion of
/// the handshake that does not depend on the DH backend actually agreeing
/// on key material, so it is exercised end to end here without reaching
/// into either side's negotiated algorithms. Neither side is `M`/`P`
/// flagged, so each also immediately commits once it negotiates (spec
/// §4.F), crossing on the wire with the other's `Commit`.
#[test]
fn both_sides_exchange_hello_and_ack() {
    let (alice_callbacks, alice_outbox) = recording_callbacks();
    let (bob_callbacks, bob_outbox) = recording_callbacks();

    let mut alice = Context::new(endpoint(1), alice_callbacks);
    let mut bob = Context::new(endpoint(2), bob_callbacks);

    alice.start(1111, 0).unwrap();
    bob.start(2222, 0).unwrap();

    let alice_hello = alice_outbox.borrow_mut().remove(0);
    let bob_hello = bob_outbox.borrow_mut().remove(0);

    bob.process_message(2222, &alice_hello, 0).unwrap();
    alice.process_message(1111, &bob_hello, 0).unwrap();

    assert_eq!(bob_outbox.borrow().len(), 2, "bob should have answered with HelloACK then Commit");
    assert_eq!(alice_outbox.borrow().len(), 2, "alice should have answered with HelloACK then Commit");
    assert!(matches!(
        zrtp::packet::Packet::unmarshal(&bob_outbox.borrow()[0], None).unwrap().message,
        zrtp::packet::messages::Message::HelloAck(_)
    ));
    assert!(matches!(
        zrtp::packet::Packet::unmarshal(&alice_outbox.borrow()[0], None).unwrap().message,
        zrtp::packet::messages::Message::HelloAck(_)
    ));
}

/// Pumps whatever each side's outbox holds into the other side until both
/// quiesce. Messages that cross in flight and arrive after the receiver has
/// already moved past the state they were relevant to (e.g. a HelloAck once
/// both Hellos have already crossed) are expected to be silently dropped by
/// `Context::process_message`, not to fail the exchange.
fn drive(alice: &mut Context, bob: &mut Context, alice_ssrc: u32, bob_ssrc: u32, alice_outbox: &Rc<RefCell<Vec<Vec<u8>>>>, bob_outbox: &Rc<RefCell<Vec<Vec<u8>>>>) {
    for _ in 0..100 {
        let a_msgs: Vec<Vec<u8>> = alice_outbox.borrow_mut().drain(..).collect();
        let b_msgs: Vec<Vec<u8>> = bob_outbox.borrow_mut().drain(..).collect();
        if a_msgs.is_empty() && b_msgs.is_empty() {
            return;
        }
        for m in a_msgs {
            bob.process_message(bob_ssrc, &m, 0).unwrap();
        }
        for m in b_msgs {
            alice.process_message(alice_ssrc, &m, 0).unwrap();
        }
    }
    panic!("handshake did not converge within 100 rounds");
}

/// Full DH-3072 handshake from `Hello` to `Secure` on both sides (spec §8
/// seed scenario: "two Contexts configured with compatible algorithm lists
/// reach Secure with equal SAS and complementary SRTP keys").
#[test]
fn full_handshake_reaches_secure_with_matching_sas() {
    let (alice_callbacks, alice_outbox) = recording_callbacks();
    let (bob_callbacks, bob_outbox) = recording_callbacks();

    let alice_sas = Rc::new(RefCell::new(None));
    let bob_sas = Rc::new(RefCell::new(None));
    let alice_sas_clone = alice_sas.clone();
    let bob_sas_clone = bob_sas.clone();
    let mut alice_callbacks = alice_callbacks;
    let mut bob_callbacks = bob_callbacks;
    alice_callbacks.sas_ready = Box::new(move |_ssrc, sas, verified, decoys| {
        *alice_sas_clone.borrow_mut() = Some((sas.to_string(), verified, decoys.to_vec()));
    });
    bob_callbacks.sas_ready = Box::new(move |_ssrc, sas, verified, decoys| {
        *bob_sas_clone.borrow_mut() = Some((sas.to_string(), verified, decoys.to_vec()));
    });

    let alice_srtp = Rc::new(RefCell::new(None));
    let bob_srtp = Rc::new(RefCell::new(None));
    let alice_srtp_clone = alice_srtp.clone();
    let bob_srtp_clone = bob_srtp.clone();
    alice_callbacks.srtp_secrets_available = Box::new(move |_ssrc, keys| {
        *alice_srtp_clone.borrow_mut() = Some((keys.initiator_key.to_vec(), keys.responder_key.to_vec()));
    });
    bob_callbacks.srtp_secrets_available = Box::new(move |_ssrc, keys| {
        *bob_srtp_clone.borrow_mut() = Some((keys.initiator_key.to_vec(), keys.responder_key.to_vec()));
    });

    let mut alice = Context::new(endpoint(10), alice_callbacks);
    let mut bob = Context::new(endpoint(20), bob_callbacks);

    alice.start(1111, 0).unwrap();
    bob.start(2222, 0).unwrap();
    drive(&mut alice, &mut bob, 1111, 2222, &alice_outbox, &bob_outbox);

    assert_eq!(alice.channel_state(1111), Some(ChannelState::Secure));
    assert_eq!(bob.channel_state(2222), Some(ChannelState::Secure));

    let (alice_sas_str, alice_verified, alice_decoys) = alice_sas.borrow().clone().expect("alice never reached SAS");
    let (bob_sas_str, _bob_verified, _bob_decoys) = bob_sas.borrow().clone().expect("bob never reached SAS");
    assert_eq!(alice_sas_str, bob_sas_str, "both sides must derive the identical SAS");
    assert_eq!(alice_decoys.len(), 3);
    assert!(!alice_verified, "neither side has ever verified this peer's SAS before");

    let (alice_init_key, alice_resp_key) = alice_srtp.borrow().clone().expect("alice never received SRTP keys");
    let (bob_init_key, bob_resp_key) = bob_srtp.borrow().clone().expect("bob never received SRTP keys");
    assert_eq!(alice_init_key, bob_init_key);
    assert_eq!(alice_resp_key, bob_resp_key);
    assert_ne!(alice_init_key, alice_resp_key);
}

/// A second channel between the same pair of endpoints, added after channel
/// 0 reaches `Secure`, runs Multistream mode and should itself reach
/// `Secure` without performing its own DH/KEM exchange (spec §4.G /
/// §8 seed scenario: "multichannel attach").
#[test]
fn multistream_channel_attaches_after_channel_zero_is_secure() {
    let (alice_callbacks, alice_outbox) = recording_callbacks();
    let (bob_callbacks, bob_outbox) = recording_callbacks();

    let mut alice = Context::new(endpoint(11), alice_callbacks);
    let mut bob = Context::new(endpoint(21), bob_callbacks);

    alice.start(1111, 0).unwrap();
    bob.start(2222, 0).unwrap();
    drive(&mut alice, &mut bob, 1111, 2222, &alice_outbox, &bob_outbox);
    assert_eq!(alice.channel_state(1111), Some(ChannelState::Secure));
    assert_eq!(bob.channel_state(2222), Some(ChannelState::Secure));

    alice.add_channel(1112, 0).unwrap();
    bob.add_channel(2223, 0).unwrap();
    assert_eq!(alice.channel_state(1112), Some(ChannelState::SendingHello));

    drive(&mut alice, &mut bob, 1112, 2223, &alice_outbox, &bob_outbox);

    assert_eq!(alice.channel_state(1112), Some(ChannelState::Secure));
    assert_eq!(bob.channel_state(2223), Some(ChannelState::Secure));
}

#[test]
fn out_of_order_retransmission_is_dropped_without_advancing_state() {
    let (alice_callbacks, alice_outbox) = recording_callbacks();
    let (bob_callbacks, _bob_outbox) = recording_callbacks();

    let mut alice = Context::new(endpoint(4), alice_callbacks);
    let mut bob = Context::new(endpoint(5), bob_callbacks);

    alice.start(1111, 0).unwrap();
    let alice_hello = alice_outbox.borrow_mut().remove(0);

    // Deliver the same Hello datagram twice; the second copy carries a
    // sequence number no greater than the first and must be dropped,
    // leaving bob's channel exactly as it was after the first delivery.
    bob.process_message(2222, &alice_hello, 0).unwrap();
    let state_after_first = bob.channel_state(2222);
    bob.process_message(2222, &alice_hello, 0).unwrap();
    assert_eq!(bob.channel_state(2222), state_after_first);
}

fn pq_endpoint(zid: u8) -> EndpointConfig {
    EndpointConfig {
        key_agreement_algorithms: vec![KeyAgreementAlgorithm::Kyber1024],
        ..endpoint(zid)
    }
}

/// A Kyber-1024 handshake exercises the asymmetric KEM exchange (only the
/// initiator ever holds a keypair) and the §4.B forced cipher/hash upgrade,
/// and should still converge to `Secure` with matching SAS/SRTP keys just
/// like the classic-DH path (spec §8 seed scenario: "post-quantum key
/// agreement").
#[test]
fn post_quantum_handshake_reaches_secure() {
    let (alice_callbacks, alice_outbox) = recording_callbacks();
    let (bob_callbacks, bob_outbox) = recording_callbacks();

    let alice_srtp = Rc::new(RefCell::new(None));
    let bob_srtp = Rc::new(RefCell::new(None));
    let alice_srtp_clone = alice_srtp.clone();
    let bob_srtp_clone = bob_srtp.clone();
    let mut alice_callbacks = alice_callbacks;
    let mut bob_callbacks = bob_callbacks;
    alice_callbacks.srtp_secrets_available = Box::new(move |_ssrc, keys| {
        *alice_srtp_clone.borrow_mut() = Some((keys.initiator_key.to_vec(), keys.responder_key.to_vec()));
    });
    bob_callbacks.srtp_secrets_available = Box::new(move |_ssrc, keys| {
        *bob_srtp_clone.borrow_mut() = Some((keys.initiator_key.to_vec(), keys.responder_key.to_vec()));
    });

    let mut alice = Context::new(pq_endpoint(30), alice_callbacks);
    let mut bob = Context::new(pq_endpoint(40), bob_callbacks);

    alice.start(1111, 0).unwrap();
    bob.start(2222, 0).unwrap();
    drive(&mut alice, &mut bob, 1111, 2222, &alice_outbox, &bob_outbox);

    assert_eq!(alice.channel_state(1111), Some(ChannelState::Secure));
    assert_eq!(bob.channel_state(2222), Some(ChannelState::Secure));

    let (alice_init_key, alice_resp_key) = alice_srtp.borrow().clone().expect("alice never received SRTP keys");
    let (bob_init_key, bob_resp_key) = bob_srtp.borrow().clone().expect("bob never received SRTP keys");
    assert_eq!(alice_init_key, bob_init_key);
    assert_eq!(alice_resp_key, bob_resp_key);
}

/// Flips a bit inside a framed message's trailing MAC field (the 8 bytes
/// immediately before the packet's CRC-32 trailer) and patches the CRC so
/// the tampering survives `Packet::unmarshal`'s framing check -- the
/// datagram must still fail whatever MAC check the channel layer applies
/// to that message type, rather than being silently dropped as malformed
/// framing.
fn corrupt_trailing_mac(bytes: &mut [u8]) {
    let len = bytes.len();
    bytes[len - 5] ^= 0xff;
    let crc = zrtp::packet::crc::compute(&bytes[..len - 4]);
    bytes[len - 4..].copy_from_slice(&crc.to_be_bytes());
}

/// A `Commit` whose own MAC has been tampered with (covering the
/// about-to-be-revealed H1) must be rejected once its preimage becomes
/// checkable, not silently accepted (spec §8 seed scenario: "tampered
/// MAC aborts the handshake"). Bob is `M`-flagged so he never contends for
/// initiator (spec §4.F); this keeps which side sends `Commit`
/// deterministic instead of depending on a random hvi comparison.
#[test]
fn tampered_commit_mac_is_rejected() {
    let (alice_callbacks, alice_outbox) = recording_callbacks();
    let (bob_callbacks, bob_outbox) = recording_callbacks();

    let mut alice = Context::new(endpoint(6), alice_callbacks);
    let mut bob = Context::new(
        EndpointConfig {
            mitm_pbx: true,
            ..endpoint(7)
        },
        bob_callbacks,
    );

    alice.start(1111, 0).unwrap();
    bob.start(2222, 0).unwrap();
    let alice_hello = alice_outbox.borrow_mut().remove(0);
    let bob_hello = bob_outbox.borrow_mut().remove(0);

    bob.process_message(2222, &alice_hello, 0).unwrap();
    alice.process_message(1111, &bob_hello, 0).unwrap();

    // Bob never contends, so alice is the sole initiator and the only one
    // who sent a Commit (after her HelloACK).
    assert_eq!(alice_outbox.borrow().len(), 2);
    let mut commit_bytes = alice_outbox.borrow_mut().remove(1);
    alice_outbox.borrow_mut().clear();
    corrupt_trailing_mac(&mut commit_bytes);

    // The responder doesn't check Commit's own MAC yet -- it's keyed by
    // the initiator's H1, which Commit itself doesn't reveal -- so the
    // tampered Commit is still accepted here and answered with DhPart1.
    let (responder, responder_ssrc, responder_outbox, initiator, initiator_ssrc, initiator_outbox) = (&mut bob, 2222u32, &bob_outbox, &mut alice, 1111u32, &alice_outbox);
    responder.process_message(responder_ssrc, &commit_bytes, 0).unwrap();
    let dhpart1 = responder_outbox.borrow_mut().remove(0);

    // The initiator accepts DhPart1 and answers with DhPart2, which
    // finally reveals the H1 that Commit's MAC was keyed with.
    initiator.process_message(initiator_ssrc, &dhpart1, 0).unwrap();
    let dhpart2 = initiator_outbox.borrow_mut().remove(0);

    // The responder can now finally check Commit's MAC against the
    // revealed H1, and must reject it.
    let result = responder.process_message(responder_ssrc, &dhpart2, 0);
    assert!(result.is_err(), "a Commit with a tampered MAC must not be accepted once checkable");
}

#[test]
fn malformed_datagram_is_dropped_not_propagated() {
    let (callbacks, _outbox) = recording_callbacks();
    let mut ctx = Context::new(endpoint(3), callbacks);
    ctx.start(42, 0).unwrap();
    // Not a ZRTP packet at all; must not panic or bubble an error out.
    let result = ctx.process_message(42, b"not a zrtp packet", 0);
    assert!(result.is_ok());
}
