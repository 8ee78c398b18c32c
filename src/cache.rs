//! Cached Secrets (spec component G support, §10 supplement #5): retained
//! secrets (RS1/RS2) used to skip SAS re-verification on subsequent calls
//! between the same two ZIDs, persisted by the host via
//! `Callbacks::load_cache`/`store_cache` and (de)serialized here with
//! `serde`+`bincode`, matching `dtls::state::State::serialize`'s use of the
//! same pair for its own session-resumption cache.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Current on-disk/blob format version. Bumped whenever the serialized
/// shape changes; [`CacheBlob::deserialize`] rejects anything else rather
/// than guess at a migration.
pub const CACHE_BLOB_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPeerSecret {
    peer_zid: [u8; 12],
    rs1: Vec<u8>,
    rs2: Vec<u8>,
    /// Set by [`Cache::set_sas_verified`] once a host confirms the human
    /// read-aloud comparison succeeded (spec §3/§6: "previously verified
    /// SAS" flag). Read back out at the next `Secure` transition with this
    /// peer so the host can skip asking the user to re-verify.
    sas_verified: bool,
    last_used_unix_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheBlobV1 {
    version: u16,
    own_zid: [u8; 12],
    peers: Vec<CachedPeerSecret>,
}

/// In-memory view of a host's persisted cache, keyed by peer ZID. Built
/// fresh from [`Callbacks::load_cache`](crate::context::Callbacks) bytes at
/// `Context` construction and re-serialized via
/// [`Callbacks::store_cache`](crate::context::Callbacks) after every
/// successful handshake that updates a retained secret.
pub struct Cache {
    own_zid: [u8; 12],
    peers: Vec<CachedPeerSecret>,
}

impl Cache {
    pub fn new(own_zid: [u8; 12]) -> Self {
        Self {
            own_zid,
            peers: Vec::new(),
        }
    }

    pub fn deserialize(own_zid: [u8; 12], blob: &[u8]) -> Result<Self> {
        if blob.is_empty() {
            return Ok(Self::new(own_zid));
        }
        let parsed: CacheBlobV1 = bincode::deserialize(blob).map_err(|_| Error::InvalidCache)?;
        if parsed.version != CACHE_BLOB_VERSION {
            return Err(Error::InvalidCache);
        }
        Ok(Self {
            own_zid,
            peers: parsed.peers,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let blob = CacheBlobV1 {
            version: CACHE_BLOB_VERSION,
            own_zid: self.own_zid,
            peers: self.peers.clone(),
        };
        bincode::serialize(&blob).expect("bincode serialization of plain structs cannot fail")
    }

    pub fn lookup(&self, peer_zid: &[u8; 12]) -> Option<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>)> {
        self.peers
            .iter()
            .find(|p| &p.peer_zid == peer_zid)
            .map(|p| (Zeroizing::new(p.rs1.clone()), Zeroizing::new(p.rs2.clone())))
    }

    /// Whether this peer's SAS was confirmed read-aloud-and-matched in a
    /// prior session. `false` for a peer never seen before.
    pub fn sas_verified(&self, peer_zid: &[u8; 12]) -> bool {
        self.peers.iter().any(|p| &p.peer_zid == peer_zid && p.sas_verified)
    }

    /// Record (or clear) the host's out-of-band SAS verification for a
    /// peer. A peer with no cache entry yet (SAS confirmed before any
    /// retained secret exists) gets a placeholder entry with empty RS1/RS2.
    pub fn set_sas_verified(&mut self, peer_zid: [u8; 12], verified: bool, now_unix_seconds: u64) {
        if let Some(existing) = self.peers.iter_mut().find(|p| p.peer_zid == peer_zid) {
            existing.sas_verified = verified;
            existing.last_used_unix_seconds = now_unix_seconds;
        } else {
            self.peers.push(CachedPeerSecret {
                peer_zid,
                rs1: Vec::new(),
                rs2: Vec::new(),
                sas_verified: verified,
                last_used_unix_seconds: now_unix_seconds,
            });
        }
    }

    /// Store a freshly derived retained secret, rotating the previous RS1
    /// into RS2 (RFC 6189 §4.3.1's "newest becomes RS1" rule).
    pub fn update(&mut self, peer_zid: [u8; 12], new_rs: Vec<u8>, now_unix_seconds: u64) {
        if let Some(existing) = self.peers.iter_mut().find(|p| p.peer_zid == peer_zid) {
            existing.rs2 = std::mem::replace(&mut existing.rs1, new_rs);
            existing.last_used_unix_seconds = now_unix_seconds;
        } else {
            self.peers.push(CachedPeerSecret {
                peer_zid,
                rs1: new_rs,
                rs2: Vec::new(),
                sas_verified: false,
                last_used_unix_seconds: now_unix_seconds,
            });
        }
    }

    /// Wipe every retained secret this host has stored, including the
    /// previously-verified-SAS flags (spec §6 control surface:
    /// `reset_retained_secrets`). A peer's next session starts over as if
    /// the two endpoints had never spoken before.
    pub fn reset_retained_secrets(&mut self) {
        self.peers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_serialize() {
        let mut cache = Cache::new([1u8; 12]);
        cache.update([2u8; 12], vec![9, 9, 9], 1000);
        let blob = cache.serialize();
        let restored = Cache::deserialize([1u8; 12], &blob).unwrap();
        let (rs1, rs2) = restored.lookup(&[2u8; 12]).unwrap();
        assert_eq!(*rs1, vec![9, 9, 9]);
        assert!(rs2.is_empty());
    }

    #[test]
    fn rejects_wrong_version() {
        let mut blob = Cache::new([0u8; 12]).serialize();
        blob[0] = 0xff;
        assert!(Cache::deserialize([0u8; 12], &blob).is_err());
    }

    #[test]
    fn empty_blob_is_a_fresh_cache() {
        let cache = Cache::deserialize([0u8; 12], &[]).unwrap();
        assert!(cache.lookup(&[1u8; 12]).is_none());
    }

    #[test]
    fn sas_verified_flag_persists_across_serialize() {
        let mut cache = Cache::new([1u8; 12]);
        cache.update([2u8; 12], vec![9, 9, 9], 1000);
        assert!(!cache.sas_verified(&[2u8; 12]));
        cache.set_sas_verified([2u8; 12], true, 1001);
        let blob = cache.serialize();
        let restored = Cache::deserialize([1u8; 12], &blob).unwrap();
        assert!(restored.sas_verified(&[2u8; 12]));
    }

    #[test]
    fn reset_retained_secrets_clears_everything() {
        let mut cache = Cache::new([1u8; 12]);
        cache.update([2u8; 12], vec![9, 9, 9], 1000);
        cache.set_sas_verified([2u8; 12], true, 1000);
        cache.reset_retained_secrets();
        assert!(cache.lookup(&[2u8; 12]).is_none());
        assert!(!cache.sas_verified(&[2u8; 12]));
    }
}
