//! Fixed-capacity table of live connections.
//!
//! Supports up to `N` concurrent links. The table is dense: slots
//! `0..len()` are populated and slot order means nothing. Removing a
//! connection moves the last record into the freed slot.

use heapless::Vec;

use crate::ble::address::{AddrString, Address};
use crate::ble::event::ConnHandle;
use crate::ble::subscription::Subscriptions;
use crate::config::DEFAULT_ATT_MTU;
use crate::error::Error;

/// One admitted connection.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionRecord<const K: usize> {
    pub handle: ConnHandle,
    pub peer: Address,
    /// `peer` rendered once at admission for logs and UIs.
    pub peer_str: AddrString,
    pub subscriptions: Subscriptions<K>,
    pub att_mtu: u16,
}

impl<const K: usize> ConnectionRecord<K> {
    pub fn new(handle: ConnHandle, peer: Address) -> Self {
        Self {
            handle,
            peer,
            peer_str: peer.to_addr_string(),
            subscriptions: Subscriptions::new(),
            att_mtu: DEFAULT_ATT_MTU,
        }
    }
}

pub struct ConnectionTable<const N: usize, const K: usize> {
    records: Vec<ConnectionRecord<K>, N>,
}

impl<const N: usize, const K: usize> Default for ConnectionTable<N, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, const K: usize> ConnectionTable<N, K> {
    pub const fn new() -> Self {
        Self { records: Vec::new() }
    }

    /// Admit a new connection with empty subscription sets.
    ///
    /// Returns the slot index of the new record.
    pub fn admit(&mut self, handle: ConnHandle, peer: Address) -> Result<usize, Error> {
        if self.records.is_full() {
            return Err(Error::CapacityExceeded);
        }
        if self.find(handle).is_some() {
            warn!("[link] handle {} already admitted", handle);
            return Err(Error::InvalidArgument);
        }

        let index = self.records.len();
        self.records
            .push(ConnectionRecord::new(handle, peer))
            .map_err(|_| Error::CapacityExceeded)?;
        Ok(index)
    }

    /// Remove the connection on `handle` and hand back its final state.
    pub fn remove(&mut self, handle: ConnHandle) -> Result<ConnectionRecord<K>, Error> {
        let index = self.find(handle).ok_or(Error::NotFound)?;
        Ok(self.records.swap_remove(index))
    }

    pub fn find(&self, handle: ConnHandle) -> Option<usize> {
        self.records.iter().position(|r| r.handle == handle)
    }

    pub fn get(&self, index: usize) -> Option<&ConnectionRecord<K>> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ConnectionRecord<K>> {
        self.records.get_mut(index)
    }

    pub fn by_handle_mut(
        &mut self,
        handle: ConnHandle,
    ) -> Option<(usize, &mut ConnectionRecord<K>)> {
        let index = self.find(handle)?;
        self.records.get_mut(index).map(|r| (index, r))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionRecord<K>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::address::AddrKind;

    const ADDR_1: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
    const ADDR_2: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
    const ADDR_3: [u8; 6] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];

    fn peer(bytes: [u8; 6]) -> Address {
        Address::new(AddrKind::Random, bytes)
    }

    #[test]
    fn admit_appends_dense() {
        let mut table: ConnectionTable<3, 4> = ConnectionTable::new();
        assert_eq!(table.admit(1, peer(ADDR_1)), Ok(0));
        assert_eq!(table.admit(2, peer(ADDR_2)), Ok(1));
        assert_eq!(table.len(), 2);

        let record = table.get(1).unwrap();
        assert_eq!(record.handle, 2);
        assert_eq!(record.peer_str.as_str(), "FF:EE:DD:CC:BB:AA");
        assert!(record.subscriptions.notify.is_empty());
        assert_eq!(record.att_mtu, DEFAULT_ATT_MTU);
    }

    #[test]
    fn admit_rejects_when_full() {
        let mut table: ConnectionTable<2, 4> = ConnectionTable::new();
        table.admit(1, peer(ADDR_1)).unwrap();
        table.admit(2, peer(ADDR_2)).unwrap();
        assert!(table.is_full());
        assert_eq!(table.admit(3, peer(ADDR_3)), Err(Error::CapacityExceeded));
        assert_eq!(table.len(), 2);
        assert_eq!(table.find(3), None);
    }

    #[test]
    fn admit_rejects_duplicate_handle() {
        let mut table: ConnectionTable<3, 4> = ConnectionTable::new();
        table.admit(9, peer(ADDR_1)).unwrap();
        assert_eq!(table.admit(9, peer(ADDR_2)), Err(Error::InvalidArgument));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0).unwrap().peer.bytes, ADDR_1);
    }

    #[test]
    fn remove_moves_last_into_gap() {
        let mut table: ConnectionTable<3, 4> = ConnectionTable::new();
        table.admit(1, peer(ADDR_1)).unwrap();
        table.admit(2, peer(ADDR_2)).unwrap();
        table.admit(3, peer(ADDR_3)).unwrap();

        let removed = table.remove(1).unwrap();
        assert_eq!(removed.handle, 1);
        assert_eq!(removed.peer.bytes, ADDR_1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.find(3), Some(0));
        assert_eq!(table.find(2), Some(1));
    }

    #[test]
    fn remove_last_slot() {
        let mut table: ConnectionTable<3, 4> = ConnectionTable::new();
        table.admit(1, peer(ADDR_1)).unwrap();
        table.admit(2, peer(ADDR_2)).unwrap();

        table.remove(2).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(1), Some(0));
        assert!(table.get(1).is_none());
    }

    #[test]
    fn remove_unknown_handle() {
        let mut table: ConnectionTable<2, 4> = ConnectionTable::new();
        table.admit(1, peer(ADDR_1)).unwrap();
        assert_eq!(table.remove(5), Err(Error::NotFound));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn removed_record_carries_subscriptions() {
        let mut table: ConnectionTable<2, 4> = ConnectionTable::new();
        let index = table.admit(4, peer(ADDR_1)).unwrap();
        table
            .get_mut(index)
            .unwrap()
            .subscriptions
            .notify
            .subscribe(0x10)
            .unwrap();

        let removed = table.remove(4).unwrap();
        assert_eq!(removed.subscriptions.notify.as_slice(), &[0x10]);
    }

    #[test]
    fn freed_slot_is_reusable_with_clean_sets() {
        let mut table: ConnectionTable<1, 4> = ConnectionTable::new();
        table.admit(1, peer(ADDR_1)).unwrap();
        table
            .get_mut(0)
            .unwrap()
            .subscriptions
            .indicate
            .subscribe(0x20)
            .unwrap();
        table.remove(1).unwrap();

        assert_eq!(table.admit(2, peer(ADDR_2)), Ok(0));
        assert!(table.get(0).unwrap().subscriptions.indicate.is_empty());
    }

    #[test]
    fn handle_reuse_after_disconnect() {
        let mut table: ConnectionTable<2, 4> = ConnectionTable::new();
        table.admit(42, peer(ADDR_1)).unwrap();
        table.remove(42).unwrap();
        table.admit(42, peer(ADDR_2)).unwrap();
        let (index, record) = table.by_handle_mut(42).unwrap();
        assert_eq!(index, 0);
        assert_eq!(record.peer.bytes, ADDR_2);
    }
}
