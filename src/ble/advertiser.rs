//! Discoverability control.
//!
//! The advertiser builds the primary advertisement (flags, tx power,
//! complete name, appearance, LE role) and a scan response (own address,
//! URI), pushes both to the transport and starts undirected connectable
//! advertising.

use crate::ble::address::Address;
use crate::ble::adv_builder::{self, AdStructure, BR_EDR_NOT_SUPPORTED, LE_GENERAL_DISCOVERABLE};
use crate::ble::transport::GapTransport;
use crate::config::{AdvertisingConfig, LE_ROLE_PERIPHERAL};
use crate::error::{Error, PlatformError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvState {
    #[default]
    Idle,
    Advertising,
}

/// What goes into the advertising payloads.
#[derive(Clone, Copy, Debug)]
pub struct AdvContent<'a> {
    pub device_name: &'a str,
    pub own_address: Address,
    pub config: AdvertisingConfig<'a>,
}

#[derive(Debug, Default)]
pub struct Advertiser {
    state: AdvState,
}

impl Advertiser {
    pub const fn new() -> Self {
        Self { state: AdvState::Idle }
    }

    pub fn state(&self) -> AdvState {
        self.state
    }

    pub fn is_advertising(&self) -> bool {
        self.state == AdvState::Advertising
    }

    pub fn start<T: GapTransport>(
        &mut self,
        transport: &mut T,
        content: &AdvContent<'_>,
    ) -> Result<(), Error> {
        info!("Starting advertising...");

        if self.state == AdvState::Advertising {
            error!("Failed to set advertising data, advertising is in progress");
            return Err(PlatformError::Busy.into());
        }

        let adv_data = adv_builder::encode(&[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::TxPowerLevel(transport.tx_power_level()),
            AdStructure::CompleteLocalName(content.device_name),
            AdStructure::Appearance(content.config.appearance),
            AdStructure::LeRole(LE_ROLE_PERIPHERAL),
        ])
        .map_err(|e| {
            error!("Advertising data is too large to fit into an advertisement");
            e
        })?;

        transport.set_advertising_data(&adv_data).map_err(|e| {
            log_rejection("advertising data", e);
            e
        })?;

        let scan_data = adv_builder::encode(&[
            AdStructure::LeDeviceAddress(content.own_address),
            AdStructure::Uri(content.config.uri),
        ])
        .map_err(|e| {
            error!("Scan response data is too large to fit into a scan response");
            e
        })?;

        transport.set_scan_response_data(&scan_data).map_err(|e| {
            log_rejection("scan response data", e);
            e
        })?;

        transport.start_advertising(content.own_address.kind).map_err(|e| {
            error!("Failed to start advertising, error: {:?}", e);
            e
        })?;

        self.state = AdvState::Advertising;
        info!("Advertising started successfully");
        Ok(())
    }

    pub fn stop<T: GapTransport>(&mut self, transport: &mut T) -> Result<(), Error> {
        if self.state == AdvState::Idle {
            return Ok(());
        }
        transport.stop_advertising()?;
        self.state = AdvState::Idle;
        info!("Advertising stopped");
        Ok(())
    }

    /// The advertising procedure ended on its own; go straight back to it.
    pub fn on_complete<T: GapTransport>(
        &mut self,
        transport: &mut T,
        content: &AdvContent<'_>,
        reason: i32,
    ) -> Result<(), Error> {
        info!("Advertise complete; reason={}, readvertising...", reason);
        self.state = AdvState::Idle;
        self.start(transport, content)
    }

    /// The link layer ended advertising without a completion event
    /// (connection attempt concluded, host reset).
    pub fn mark_idle(&mut self) {
        self.state = AdvState::Idle;
    }
}

fn log_rejection(what: &str, e: PlatformError) {
    match e {
        PlatformError::Busy => error!("Failed to set {}, advertising is in progress", what),
        PlatformError::PayloadTooLarge => error!("Failed to set {}, data is too large", what),
        other => error!("Failed to set {}, error: {:?}", what, other),
    }
}
