//! In-memory host stack used by the unit tests.

use core::cell::RefCell;
use std::collections::BTreeMap;
use std::string::String;
use std::vec::Vec;

use crate::ble::address::{AddrKind, Address};
use crate::ble::event::{AttrHandle, ConnHandle};
use crate::ble::security::SecurityParams;
use crate::ble::transport::{GapTransport, NotifyTransport};
use crate::error::PlatformError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportCall {
    SetRandomIdentity,
    EnsureAddress { prefer_random: bool },
    StartAdvertising,
    StopAdvertising,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
    pub handle: ConnHandle,
    pub attr: AttrHandle,
    pub payload: Vec<u8>,
    pub indication: bool,
}

pub struct MockTransport {
    pub calls: Vec<TransportCall>,
    pub security: Option<SecurityParams>,
    pub device_name: String,
    pub appearance: Option<u16>,
    pub services: Vec<u16>,
    pub adv_data: Vec<u8>,
    pub scan_data: Vec<u8>,
    pub identity: [u8; 6],
    pub inferred_kind: AddrKind,
    pub peers: BTreeMap<ConnHandle, Address>,
    pub tx_power: i8,
    pub fail_register: Option<PlatformError>,
    pub fail_random_identity: Option<PlatformError>,
    pub fail_ensure: Option<PlatformError>,
    pub fail_infer: Option<PlatformError>,
    pub fail_own_address: Option<PlatformError>,
    pub fail_adv_start: Option<PlatformError>,
    pub fail_notify_for: Option<ConnHandle>,
    pub sent: RefCell<Vec<Sent>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            security: None,
            device_name: String::new(),
            appearance: None,
            services: Vec::new(),
            adv_data: Vec::new(),
            scan_data: Vec::new(),
            identity: [0x01, 0x02, 0x03, 0x04, 0x05, 0xc6],
            inferred_kind: AddrKind::Public,
            peers: BTreeMap::new(),
            tx_power: 0,
            fail_register: None,
            fail_random_identity: None,
            fail_ensure: None,
            fail_infer: None,
            fail_own_address: None,
            fail_adv_start: None,
            fail_notify_for: None,
            sent: RefCell::new(Vec::new()),
        }
    }

    /// Make the next `peer_address(handle)` lookup succeed.
    pub fn with_peer(mut self, handle: ConnHandle, bytes: [u8; 6]) -> Self {
        self.add_peer(handle, bytes);
        self
    }

    pub fn add_peer(&mut self, handle: ConnHandle, bytes: [u8; 6]) {
        self.peers.insert(handle, Address::new(AddrKind::Public, bytes));
    }

    pub fn starts(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == TransportCall::StartAdvertising)
            .count()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.borrow().clone()
    }
}

impl GapTransport for MockTransport {
    type Services = [u16];

    fn configure_security(&mut self, params: &SecurityParams) {
        self.security = Some(*params);
    }

    fn set_device_name(&mut self, name: &str) -> Result<(), PlatformError> {
        self.device_name = name.into();
        Ok(())
    }

    fn set_appearance(&mut self, appearance: u16) -> Result<(), PlatformError> {
        self.appearance = Some(appearance);
        Ok(())
    }

    fn register_services(&mut self, services: &[u16]) -> Result<(), PlatformError> {
        if let Some(e) = self.fail_register {
            return Err(e);
        }
        self.services = services.to_vec();
        Ok(())
    }

    fn set_random_identity(&mut self) -> Result<(), PlatformError> {
        self.calls.push(TransportCall::SetRandomIdentity);
        if let Some(e) = self.fail_random_identity {
            return Err(e);
        }
        self.identity[5] |= 0xc0;
        self.inferred_kind = AddrKind::Random;
        Ok(())
    }

    fn ensure_address(&mut self, prefer_random: bool) -> Result<(), PlatformError> {
        self.calls.push(TransportCall::EnsureAddress { prefer_random });
        match self.fail_ensure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn infer_own_address_kind(&mut self) -> Result<AddrKind, PlatformError> {
        match self.fail_infer {
            Some(e) => Err(e),
            None => Ok(self.inferred_kind),
        }
    }

    fn own_address(&mut self, _kind: AddrKind) -> Result<[u8; 6], PlatformError> {
        match self.fail_own_address {
            Some(e) => Err(e),
            None => Ok(self.identity),
        }
    }

    fn peer_address(&mut self, handle: ConnHandle) -> Result<Address, PlatformError> {
        self.peers.get(&handle).copied().ok_or(PlatformError::Rejected(-2))
    }

    fn tx_power_level(&self) -> i8 {
        self.tx_power
    }

    fn set_advertising_data(&mut self, data: &[u8]) -> Result<(), PlatformError> {
        self.adv_data = data.to_vec();
        Ok(())
    }

    fn set_scan_response_data(&mut self, data: &[u8]) -> Result<(), PlatformError> {
        self.scan_data = data.to_vec();
        Ok(())
    }

    fn start_advertising(&mut self, _own_kind: AddrKind) -> Result<(), PlatformError> {
        if let Some(e) = self.fail_adv_start {
            return Err(e);
        }
        self.calls.push(TransportCall::StartAdvertising);
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), PlatformError> {
        self.calls.push(TransportCall::StopAdvertising);
        Ok(())
    }
}

impl MockTransport {
    fn push(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
        indication: bool,
    ) -> Result<(), PlatformError> {
        if self.fail_notify_for == Some(handle) {
            return Err(PlatformError::Rejected(6));
        }
        self.sent.borrow_mut().push(Sent {
            handle,
            attr,
            payload: payload.to_vec(),
            indication,
        });
        Ok(())
    }
}

impl NotifyTransport for MockTransport {
    fn notify(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        self.push(handle, attr, payload, false)
    }

    fn indicate(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        self.push(handle, attr, payload, true)
    }
}
