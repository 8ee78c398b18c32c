//! A pure Rust implementation of ZRTP media key agreement (RFC 6189):
//! Diffie-Hellman key agreement interleaved into an RTP stream,
//! authenticated by a Short Authentication String the two call
//! participants read aloud and compare, without relying on a PKI.
//!
//! This crate has no internal threads and does not depend on an async
//! runtime. Hosts drive the protocol by calling
//! [`context::Context::process_message`] whenever a ZRTP datagram arrives
//! and [`context::Context::iterate`] on their own timer, and receive
//! results back through the [`context::Callbacks`] hooks supplied at
//! construction.

pub mod algorithm;
pub mod cache;
pub mod channel;
pub mod context;
pub mod error;
pub mod kdf;
pub mod negotiation;
pub mod packet;
pub mod primitives;
pub mod sas;

pub use context::{Callbacks, Context, EndpointConfig};
pub use error::{Error, Result};
