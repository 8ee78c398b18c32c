use zrtp::error::Error;
use zrtp::packet::header::PacketHeader;
use zrtp::packet::messages::{HelloAck, Message};
use zrtp::packet::Packet;

fn sample_packet() -> Packet {
    Packet {
        header: PacketHeader {
            version: 0,
            sequence_number: 3,
            ssrc: 0xaabb_ccdd,
        },
        message: Message::HelloAck(HelloAck),
    }
}

#[test]
fn bit_flip_anywhere_in_body_is_rejected() {
    let packet = sample_packet();
    let bytes = packet.marshal().unwrap();
    // Flip a bit in the header, well clear of the CRC trailer.
    for byte_index in 0..bytes.len() - 4 {
        let mut tampered = bytes.clone();
        tampered[byte_index] ^= 0x01;
        let result = Packet::unmarshal(&tampered, None);
        assert!(result.is_err(), "byte {byte_index} flip should have been rejected");
    }
}

#[test]
fn truncated_packet_is_rejected() {
    let packet = sample_packet();
    let bytes = packet.marshal().unwrap();
    for cut in 1..bytes.len() {
        let truncated = &bytes[..bytes.len() - cut];
        assert!(Packet::unmarshal(truncated, None).is_err());
    }
}

#[test]
fn wrong_magic_cookie_is_rejected_before_crc_is_even_consulted() {
    let packet = sample_packet();
    let mut bytes = packet.marshal().unwrap();
    // Magic cookie sits right after the 4-byte fixed/seq half of the header.
    bytes[4] ^= 0xff;
    let crc = zrtp::packet::crc::compute(&bytes[..bytes.len() - 4]);
    bytes[bytes.len() - 4..].copy_from_slice(&crc.to_be_bytes());
    assert_eq!(Packet::unmarshal(&bytes, None).unwrap_err(), Error::InvalidMagicCookie);
}
