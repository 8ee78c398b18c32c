use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Flat error enumeration covering the packet codec, algorithm negotiation,
/// key schedule, and channel state machine. Kept as one enum (rather than
/// per-component error types) so the state machine can match on a single
/// type when deciding whether a failure drops a packet silently or promotes
/// to a protocol Error message (see [`crate::packet::ParseOutcome`]).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    // --- parser errors ---
    #[error("packet is shorter than the minimum frame length")]
    PacketTooShort,
    #[error("packet exceeds the maximum frame length")]
    PacketTooLong,
    #[error("invalid packet header version nibble")]
    InvalidVersion,
    #[error("invalid or missing magic cookie")]
    InvalidMagicCookie,
    #[error("invalid message preamble")]
    InvalidPreamble,
    #[error("unknown or unsupported message type")]
    UnknownMessageType,
    #[error("packet sequence number is not strictly greater than the last seen")]
    OutOfOrder,
    #[error("CRC-32 does not match packet contents")]
    InvalidCrc,
    #[error("declared message length (in 32-bit words) does not match byte length")]
    InvalidMessageLength,
    #[error("hash chain does not satisfy H(i+1) == SHA-256(H(i))")]
    UnmatchingHashChain,
    #[error("HMAC over Hello/Commit/DHPart does not verify")]
    UnmatchingMac,
    #[error("HMAC over the encrypted Confirm body does not verify")]
    UnmatchingConfirmMac,
    #[error("packet SSRC does not match the channel's bound SSRC")]
    UnmatchingSsrc,
    #[error("initiator hvi does not match the committed DHPart2")]
    UnmatchingHvi,
    #[error("message type is not valid for the channel's current state")]
    UnexpectedForState,

    // --- builder errors ---
    #[error("message payload is incomplete or inconsistent, cannot marshal")]
    InvalidMessage,
    #[error("context is missing state required to build this message")]
    InvalidContext,

    // --- negotiation errors ---
    #[error("peer Hello is missing required fields")]
    InvalidPeerHello,
    #[error("no common algorithm found in the given family")]
    NoCommonAlgoFound,
    #[error("no common cipher algorithm")]
    InvalidCipherSelection,
    #[error("no common hash algorithm")]
    InvalidHashSelection,
    #[error("no common auth-tag algorithm")]
    InvalidAuthTagSelection,
    #[error("no common SAS rendering algorithm")]
    InvalidSasSelection,

    // --- crypto backend errors ---
    #[error("crypto backend not ready: required key material is absent")]
    ContextNotReady,
    #[error("crypto backend operation failed: {0}")]
    CryptoBackend(String),

    // --- state machine / session errors ---
    #[error("channel is not in a state that allows this operation")]
    InvalidChannelState,
    #[error("a new channel cannot be started before channel 0 reaches Secure")]
    SessionNotReady,
    #[error("retry budget exhausted waiting for peer response")]
    RetriesExhausted,
    #[error("peer signalled a protocol error, code {0:#x}")]
    PeerError(u32),
    #[error("cache blob is malformed or uses an unsupported version")]
    InvalidCache,
}
