//! The seam between the peripheral core and the BLE host stack.
//!
//! The host stack owns the radio, the attribute server and bond storage.
//! The core drives it through two traits:
//!
//! - [`GapTransport`] - bring-up, identity and advertising. Only ever called
//!   from the single event-processing context, hence `&mut self`.
//! - [`NotifyTransport`] - fire-and-forget value pushes. May be called from
//!   any task, hence `&self`.

use crate::ble::address::{AddrKind, Address};
use crate::ble::event::{AttrHandle, ConnHandle};
use crate::ble::security::SecurityParams;
use crate::error::PlatformError;

pub trait GapTransport {
    /// Attribute/service schema understood by this stack.
    type Services: ?Sized;

    // Bring-up

    fn configure_security(&mut self, params: &SecurityParams);

    fn set_device_name(&mut self, name: &str) -> Result<(), PlatformError>;

    fn set_appearance(&mut self, appearance: u16) -> Result<(), PlatformError>;

    fn register_services(&mut self, services: &Self::Services) -> Result<(), PlatformError>;

    // Identity

    /// Generate a static random address and assign it to the controller.
    fn set_random_identity(&mut self) -> Result<(), PlatformError>;

    /// Make sure an identity address of the preferred kind exists.
    fn ensure_address(&mut self, prefer_random: bool) -> Result<(), PlatformError>;

    /// Pick the own-address type advertising should use.
    fn infer_own_address_kind(&mut self) -> Result<AddrKind, PlatformError>;

    /// Copy the identity address for `kind`.
    fn own_address(&mut self, kind: AddrKind) -> Result<[u8; 6], PlatformError>;

    /// Identity address of the peer on `handle`.
    fn peer_address(&mut self, handle: ConnHandle) -> Result<Address, PlatformError>;

    // Advertising

    /// Transmit power the controller will advertise with (dBm).
    fn tx_power_level(&self) -> i8;

    fn set_advertising_data(&mut self, data: &[u8]) -> Result<(), PlatformError>;

    fn set_scan_response_data(&mut self, data: &[u8]) -> Result<(), PlatformError>;

    /// Start undirected connectable, general discoverable advertising with
    /// no timeout. Completion is reported later as an `AdvertiseComplete`
    /// or `Connect` event.
    fn start_advertising(&mut self, own_kind: AddrKind) -> Result<(), PlatformError>;

    fn stop_advertising(&mut self) -> Result<(), PlatformError>;
}

pub trait NotifyTransport {
    /// Queue a notification. Completion arrives as a `NotifyTx` event.
    fn notify(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError>;

    /// Queue an indication. Completion arrives as a `NotifyTx` event.
    fn indicate(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError>;
}

impl<T: GapTransport + ?Sized> GapTransport for &mut T {
    type Services = T::Services;

    fn configure_security(&mut self, params: &SecurityParams) {
        T::configure_security(self, params)
    }
    fn set_device_name(&mut self, name: &str) -> Result<(), PlatformError> {
        T::set_device_name(self, name)
    }
    fn set_appearance(&mut self, appearance: u16) -> Result<(), PlatformError> {
        T::set_appearance(self, appearance)
    }
    fn register_services(&mut self, services: &Self::Services) -> Result<(), PlatformError> {
        T::register_services(self, services)
    }
    fn set_random_identity(&mut self) -> Result<(), PlatformError> {
        T::set_random_identity(self)
    }
    fn ensure_address(&mut self, prefer_random: bool) -> Result<(), PlatformError> {
        T::ensure_address(self, prefer_random)
    }
    fn infer_own_address_kind(&mut self) -> Result<AddrKind, PlatformError> {
        T::infer_own_address_kind(self)
    }
    fn own_address(&mut self, kind: AddrKind) -> Result<[u8; 6], PlatformError> {
        T::own_address(self, kind)
    }
    fn peer_address(&mut self, handle: ConnHandle) -> Result<Address, PlatformError> {
        T::peer_address(self, handle)
    }
    fn tx_power_level(&self) -> i8 {
        T::tx_power_level(self)
    }
    fn set_advertising_data(&mut self, data: &[u8]) -> Result<(), PlatformError> {
        T::set_advertising_data(self, data)
    }
    fn set_scan_response_data(&mut self, data: &[u8]) -> Result<(), PlatformError> {
        T::set_scan_response_data(self, data)
    }
    fn start_advertising(&mut self, own_kind: AddrKind) -> Result<(), PlatformError> {
        T::start_advertising(self, own_kind)
    }
    fn stop_advertising(&mut self) -> Result<(), PlatformError> {
        T::stop_advertising(self)
    }
}

impl<T: NotifyTransport + ?Sized> NotifyTransport for &T {
    fn notify(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        T::notify(self, handle, attr, payload)
    }
    fn indicate(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        T::indicate(self, handle, attr, payload)
    }
}
