//! Shared peripheral context.
//!
//! [`Peripheral`] owns all mutable connection state behind one blocking
//! mutex. The event dispatcher is the only writer; the notification sender
//! (possibly on another task) only reads. Nothing here is global: the
//! application creates the context, usually in a `StaticCell`, and hands
//! references to the dispatcher and sender.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::ble::address::{AddrKind, Address};
use crate::ble::connection::{ConnectionRecord, ConnectionTable};
use crate::ble::event::ConnHandle;
use crate::ble::transport::GapTransport;
use crate::config::{PeripheralConfig, MAX_DEVICE_NAME_LEN};
use crate::error::Error;

pub struct PeripheralState<const N: usize, const K: usize> {
    pub own_address: Address,
    pub connections: ConnectionTable<N, K>,
}

impl<const N: usize, const K: usize> PeripheralState<N, K> {
    pub const fn new() -> Self {
        Self {
            own_address: Address::new(AddrKind::Public, [0; 6]),
            connections: ConnectionTable::new(),
        }
    }

    /// Another connection could still be admitted.
    pub fn has_capacity(&self) -> bool {
        !self.connections.is_full()
    }
}

impl<const N: usize, const K: usize> Default for PeripheralState<N, K> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Peripheral<M: RawMutex, const N: usize, const K: usize> {
    state: Mutex<M, RefCell<PeripheralState<N, K>>>,
}

impl<M: RawMutex, const N: usize, const K: usize> Default for Peripheral<M, N, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, const N: usize, const K: usize> Peripheral<M, N, K> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(PeripheralState::new())),
        }
    }

    /// One-time bring-up: validate `config` and push it into the stack.
    ///
    /// Identity setup happens later, once the host has synced with the
    /// controller (see `EventDispatcher::on_host_sync`).
    pub fn initialize<T: GapTransport>(
        &self,
        config: &PeripheralConfig<'_, T::Services>,
        transport: &mut T,
    ) -> Result<(), Error> {
        info!("Initializing BLE peripheral...");

        if config.device_name.is_empty() || config.device_name.len() > MAX_DEVICE_NAME_LEN {
            error!("Invalid configuration: device name must be 1..={} bytes", MAX_DEVICE_NAME_LEN);
            return Err(Error::InvalidArgument);
        }

        if config.security.random_address {
            self.with_state_mut(|s| s.own_address.kind = AddrKind::Random);
        }

        transport.configure_security(&config.security.params());

        transport.set_device_name(config.device_name).map_err(|e| {
            error!("Failed to set GAP device name: {:?}", e);
            e
        })?;

        transport.set_appearance(config.advertising.appearance).map_err(|e| {
            error!("Failed to set GAP device appearance: {:?}", e);
            e
        })?;

        transport.register_services(config.services).map_err(|e| {
            error!("Failed to add GATT services: {:?}", e);
            e
        })?;

        Ok(())
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&PeripheralState<N, K>) -> R) -> R {
        self.state.lock(|cell| f(&cell.borrow()))
    }

    /// Mutable access. Reserved for the event context.
    pub fn with_state_mut<R>(&self, f: impl FnOnce(&mut PeripheralState<N, K>) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn own_address(&self) -> Address {
        self.with_state(|s| s.own_address)
    }

    pub fn connection_count(&self) -> usize {
        self.with_state(|s| s.connections.len())
    }

    pub fn has_capacity(&self) -> bool {
        self.with_state(|s| s.has_capacity())
    }

    /// Copy of the record at `index`.
    pub fn connection(&self, index: usize) -> Option<ConnectionRecord<K>> {
        self.with_state(|s| s.connections.get(index).cloned())
    }

    /// Copy of the record for `handle`.
    ///
    /// Slot indices are reused once a disconnect compacts the table, so code
    /// running after the event (queued hooks, other tasks) should look
    /// connections up by handle.
    pub fn connection_by_handle(&self, handle: ConnHandle) -> Option<ConnectionRecord<K>> {
        self.with_state(|s| {
            let index = s.connections.find(handle)?;
            s.connections.get(index).cloned()
        })
    }
}
