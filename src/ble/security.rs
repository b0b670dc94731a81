//! Security manager posture.
//!
//! The core only translates the configured posture into the parameters the
//! transport's security manager expects; pairing lives in the transport.
//! [`BondTable`] is the in-RAM bond store, generic over the transport's key
//! material.

use heapless::Vec;

/// Pairing key distribution: encryption key (LTK).
pub const KEY_DIST_ENC: u8 = 0x01;
/// Pairing key distribution: identity key (IRK), needed to resolve peer RPAs.
pub const KEY_DIST_ID: u8 = 0x02;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IoCapabilities {
    DisplayOnly = 0,
    DisplayYesNo = 1,
    KeyboardOnly = 2,
    #[default]
    NoInputNoOutput = 3,
    KeyboardDisplay = 4,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecurityConfig {
    pub io_capabilities: IoCapabilities,
    pub bonding: bool,
    pub mitm: bool,
    pub secure_connections: bool,
    /// Advertise from a freshly generated static random address.
    pub random_address: bool,
    /// Exchange identity keys so bonded peers using RPAs can be resolved.
    pub resolve_peer_address: bool,
}

/// What the transport's security manager is configured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecurityParams {
    pub io_capabilities: IoCapabilities,
    pub bonding: bool,
    pub mitm: bool,
    pub secure_connections: bool,
    pub our_key_dist: u8,
    pub their_key_dist: u8,
}

impl SecurityConfig {
    pub fn params(&self) -> SecurityParams {
        let mut params = SecurityParams {
            io_capabilities: self.io_capabilities,
            bonding: self.bonding,
            mitm: self.mitm,
            secure_connections: self.secure_connections,
            our_key_dist: 0,
            their_key_dist: 0,
        };

        if self.bonding {
            params.our_key_dist |= KEY_DIST_ENC;
            params.their_key_dist |= KEY_DIST_ENC;
        }

        if self.resolve_peer_address {
            params.our_key_dist |= KEY_DIST_ID;
            params.their_key_dist |= KEY_DIST_ID;
        }

        params
    }
}

/// Up to `N` bonds, oldest first. One entry per peer.
pub struct BondTable<B, const N: usize> {
    bonds: Vec<B, N>,
}

impl<B, const N: usize> BondTable<B, N> {
    pub const fn new() -> Self {
        Self { bonds: Vec::new() }
    }

    /// Store `bond`, dropping every entry `same_peer` matches first.
    /// When the table is still full the oldest bond is evicted and returned.
    pub fn store(&mut self, bond: B, same_peer: impl Fn(&B) -> bool) -> Option<B> {
        self.bonds.retain(|b| !same_peer(b));

        let evicted = if self.bonds.is_full() && !self.bonds.is_empty() {
            Some(self.bonds.remove(0))
        } else {
            None
        };
        // Cannot fail unless N is zero.
        let _ = self.bonds.push(bond);
        evicted
    }

    pub fn find(&self, f: impl Fn(&B) -> bool) -> Option<&B> {
        self.bonds.iter().find(|&b| f(b))
    }

    pub fn len(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }
}

impl<B, const N: usize> Default for BondTable<B, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// (peer, key)
    type Bond = (u8, u32);

    #[test]
    fn open_posture_distributes_nothing() {
        let params = SecurityConfig::default().params();
        assert_eq!(params.our_key_dist, 0);
        assert_eq!(params.their_key_dist, 0);
        assert!(!params.bonding);
        assert_eq!(params.io_capabilities, IoCapabilities::NoInputNoOutput);
    }

    #[test]
    fn bonding_distributes_encryption_keys() {
        let params = SecurityConfig {
            bonding: true,
            ..Default::default()
        }
        .params();
        assert_eq!(params.our_key_dist, KEY_DIST_ENC);
        assert_eq!(params.their_key_dist, KEY_DIST_ENC);
    }

    #[test]
    fn resolving_peers_adds_identity_keys() {
        let params = SecurityConfig {
            bonding: true,
            mitm: true,
            secure_connections: true,
            resolve_peer_address: true,
            io_capabilities: IoCapabilities::DisplayYesNo,
            ..Default::default()
        }
        .params();
        assert_eq!(params.our_key_dist, KEY_DIST_ENC | KEY_DIST_ID);
        assert_eq!(params.their_key_dist, KEY_DIST_ENC | KEY_DIST_ID);
        assert!(params.mitm);
        assert!(params.secure_connections);
        assert_eq!(params.io_capabilities, IoCapabilities::DisplayYesNo);
    }

    #[test]
    fn rebond_replaces_the_peer_entry() {
        let mut table: BondTable<Bond, 4> = BondTable::new();
        table.store((1, 0xaa), |b| b.0 == 1);
        table.store((2, 0xbb), |b| b.0 == 2);
        assert_eq!(table.store((1, 0xcc), |b| b.0 == 1), None);

        assert_eq!(table.len(), 2);
        assert_eq!(table.find(|b| b.0 == 1), Some(&(1, 0xcc)));
        assert_eq!(table.find(|b| b.0 == 2), Some(&(2, 0xbb)));
    }

    #[test]
    fn full_table_forgets_the_oldest() {
        let mut table: BondTable<Bond, 2> = BondTable::new();
        table.store((1, 0x11), |b| b.0 == 1);
        table.store((2, 0x22), |b| b.0 == 2);

        assert_eq!(table.store((3, 0x33), |b| b.0 == 3), Some((1, 0x11)));
        assert_eq!(table.len(), 2);
        assert!(table.find(|b| b.0 == 1).is_none());
        assert_eq!(table.find(|b| b.0 == 3), Some(&(3, 0x33)));
    }

    #[test]
    fn zero_capacity_table_stores_nothing() {
        let mut table: BondTable<Bond, 0> = BondTable::new();
        assert_eq!(table.store((1, 0x11), |_| false), None);
        assert!(table.is_empty());
    }
}
