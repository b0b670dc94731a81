//! Advertising-data (AD structure) encoding.
//!
//! Legacy advertisements and scan responses are a sequence of
//! `[len][type][data...]` records that must fit in 31 bytes.

use heapless::Vec;

use crate::ble::address::Address;
use crate::config::MAX_ADV_DATA_LEN;
use crate::error::PlatformError;

pub const LE_GENERAL_DISCOVERABLE: u8 = 0b0000_0010;
pub const BR_EDR_NOT_SUPPORTED: u8 = 0b0000_0100;

// AD types
const AD_FLAGS: u8 = 0x01;
const AD_COMPLETE_LOCAL_NAME: u8 = 0x09;
const AD_TX_POWER_LEVEL: u8 = 0x0a;
const AD_APPEARANCE: u8 = 0x19;
const AD_LE_BT_DEVICE_ADDRESS: u8 = 0x1b;
const AD_LE_ROLE: u8 = 0x1c;
const AD_URI: u8 = 0x24;

#[derive(Debug, Copy, Clone)]
pub enum AdStructure<'a> {
    /// Device flags and baseband capabilities. Not allowed in scan responses.
    Flags(u8),
    TxPowerLevel(i8),
    CompleteLocalName(&'a str),
    Appearance(u16),
    LeRole(u8),
    /// Own device address followed by its address type.
    LeDeviceAddress(Address),
    /// URI with the leading scheme-code byte already applied.
    Uri(&'a [u8]),
}

pub type AdvData = Vec<u8, MAX_ADV_DATA_LEN>;

/// Encode `ad` into a single payload, rejecting anything over budget.
pub fn encode(ad: &[AdStructure<'_>]) -> Result<AdvData, PlatformError> {
    let mut data = AdvData::new();
    for item in ad {
        append(&mut data, item).map_err(|_| PlatformError::PayloadTooLarge)?;
    }
    Ok(data)
}

fn append(data: &mut AdvData, item: &AdStructure<'_>) -> Result<(), ()> {
    match *item {
        AdStructure::Flags(flags) => record(data, AD_FLAGS, &[flags]),
        AdStructure::TxPowerLevel(dbm) => record(data, AD_TX_POWER_LEVEL, &[dbm as u8]),
        AdStructure::CompleteLocalName(name) => {
            record(data, AD_COMPLETE_LOCAL_NAME, name.as_bytes())
        }
        AdStructure::Appearance(appearance) => {
            record(data, AD_APPEARANCE, &appearance.to_le_bytes())
        }
        AdStructure::LeRole(role) => record(data, AD_LE_ROLE, &[role]),
        AdStructure::LeDeviceAddress(addr) => {
            let mut value = [0u8; 7];
            value[..6].copy_from_slice(&addr.bytes);
            // Bit 0: 0 = public, 1 = random.
            value[6] = (addr.kind as u8) & 0x01;
            record(data, AD_LE_BT_DEVICE_ADDRESS, &value)
        }
        AdStructure::Uri(uri) => record(data, AD_URI, uri),
    }
}

fn record(data: &mut AdvData, ty: u8, value: &[u8]) -> Result<(), ()> {
    if value.len() + 2 > data.capacity() - data.len() {
        return Err(());
    }
    data.push((value.len() + 1) as u8).map_err(|_| ())?;
    data.push(ty).map_err(|_| ())?;
    data.extend_from_slice(value).map_err(|_| ())
}
