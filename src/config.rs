//! Application-wide constants and configuration.
//!
//! Capacities and protocol constants are compile-time values so every
//! table can be sized statically. The runtime [`PeripheralConfig`] is
//! captured once at bring-up and never mutated afterwards.

use crate::ble::security::SecurityConfig;

// Capacities

/// Maximum simultaneous BLE connections (link-layer default for S140 / NimBLE).
pub const MAX_CONNECTIONS: usize = 3;

/// Notify (and separately indicate) subscriptions tracked per connection.
pub const MAX_SUBSCRIPTIONS_PER_CONN: usize = 10;

/// Longest device name accepted at bring-up.
pub const MAX_DEVICE_NAME_LEN: usize = 32;

// Advertising

/// Legacy advertising / scan-response payload budget (bytes).
pub const MAX_ADV_DATA_LEN: usize = 31;

/// GAP appearance: Generic Tag.
pub const APPEARANCE_GENERIC_TAG: u16 = 0x0200;

/// LE Role AD value: peripheral role only.
pub const LE_ROLE_PERIPHERAL: u8 = 0x00;

/// Scan-response URI. First byte is the URI scheme code (0x17 = "https:").
pub const DEFAULT_URI: &[u8] = &[
    0x17, b'/', b'/', b'e', b's', b'p', b'r', b'e', b's', b's', b'i', b'f', b'.', b'c', b'o', b'm',
];

// ATT

/// Default ATT MTU before any exchange.
pub const DEFAULT_ATT_MTU: u16 = 23;

/// Notify-tx status: transmit succeeded.
pub const TX_STATUS_SUCCESS: i32 = 0;

/// Notify-tx status: operation superseded / already done. Not an error.
pub const TX_STATUS_DONE: i32 = 14;

/// Advertising behaviour knobs.
#[derive(Clone, Copy, Debug)]
pub struct AdvertisingConfig<'a> {
    /// Appearance value placed in the primary advertisement.
    pub appearance: u16,
    /// URI placed in the scan response.
    pub uri: &'a [u8],
    /// Resume advertising right after a connection is admitted when
    /// capacity remains. Off by default: advertising resumes on disconnect.
    pub readvertise_while_connected: bool,
}

impl Default for AdvertisingConfig<'_> {
    fn default() -> Self {
        Self {
            appearance: APPEARANCE_GENERIC_TAG,
            uri: DEFAULT_URI,
            readvertise_while_connected: false,
        }
    }
}

/// Immutable peripheral configuration.
///
/// `S` is the attribute/service schema. The core never looks inside it; it
/// is handed to the transport for registration during bring-up.
#[derive(Debug)]
pub struct PeripheralConfig<'a, S: ?Sized> {
    pub device_name: &'a str,
    pub security: SecurityConfig,
    pub services: &'a S,
    pub advertising: AdvertisingConfig<'a>,
}

impl<'a, S: ?Sized> PeripheralConfig<'a, S> {
    /// Configuration with default security and advertising settings.
    pub fn new(device_name: &'a str, services: &'a S) -> Self {
        Self {
            device_name,
            security: SecurityConfig::default(),
            services,
            advertising: AdvertisingConfig::default(),
        }
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_advertising(mut self, advertising: AdvertisingConfig<'a>) -> Self {
        self.advertising = advertising;
        self
    }
}

impl<S: ?Sized> Clone for PeripheralConfig<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for PeripheralConfig<'_, S> {}
