//! Host-side stand-ins for the BLE stack.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use blelink::ble::address::{AddrKind, Address};
use blelink::ble::event::{AttrHandle, ConnHandle};
use blelink::ble::security::SecurityParams;
use blelink::ble::transport::{GapTransport, NotifyTransport};
use blelink::PlatformError;

/// Install the test logger. Crate diagnostics reach it only when built
/// with `--features log`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// GAP side: records what the core asked for.
#[derive(Default)]
pub struct HostStack {
    pub security: Option<SecurityParams>,
    pub name: String,
    pub services: Vec<u16>,
    pub peers: BTreeMap<ConnHandle, Address>,
    pub adv_data: Vec<u8>,
    pub scan_data: Vec<u8>,
    pub adv_starts: usize,
}

impl HostStack {
    pub fn with_peers(handles: &[ConnHandle]) -> Self {
        let mut stack = Self::default();
        for &h in handles {
            stack
                .peers
                .insert(h, Address::new(AddrKind::Random, [h as u8, 0, 0, 0, 0, 0xc0]));
        }
        stack
    }
}

impl GapTransport for HostStack {
    type Services = [u16];

    fn configure_security(&mut self, params: &SecurityParams) {
        self.security = Some(*params);
    }

    fn set_device_name(&mut self, name: &str) -> Result<(), PlatformError> {
        self.name = name.to_owned();
        Ok(())
    }

    fn set_appearance(&mut self, _appearance: u16) -> Result<(), PlatformError> {
        Ok(())
    }

    fn register_services(&mut self, services: &[u16]) -> Result<(), PlatformError> {
        self.services = services.to_vec();
        Ok(())
    }

    fn set_random_identity(&mut self) -> Result<(), PlatformError> {
        Ok(())
    }

    fn ensure_address(&mut self, _prefer_random: bool) -> Result<(), PlatformError> {
        Ok(())
    }

    fn infer_own_address_kind(&mut self) -> Result<AddrKind, PlatformError> {
        Ok(AddrKind::Public)
    }

    fn own_address(&mut self, _kind: AddrKind) -> Result<[u8; 6], PlatformError> {
        Ok([0x01, 0x02, 0x03, 0x04, 0x05, 0x06])
    }

    fn peer_address(&mut self, handle: ConnHandle) -> Result<Address, PlatformError> {
        self.peers.get(&handle).copied().ok_or(PlatformError::Rejected(2))
    }

    fn tx_power_level(&self) -> i8 {
        4
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
        self.adv_starts += 1;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), PlatformError> {
        Ok(())
    }
}

/// Outbound side: shareable across threads.
#[derive(Default)]
pub struct Radio {
    pub sent: Mutex<Vec<(ConnHandle, AttrHandle, Vec<u8>)>>,
}

impl Radio {
    pub fn sent(&self) -> Vec<(ConnHandle, AttrHandle, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotifyTransport for Radio {
    fn notify(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        self.sent.lock().unwrap().push((handle, attr, payload.to_vec()));
        Ok(())
    }

    fn indicate(
        &self,
        handle: ConnHandle,
        attr: AttrHandle,
        payload: &[u8],
    ) -> Result<(), PlatformError> {
        self.notify(handle, attr, payload)
    }
}
