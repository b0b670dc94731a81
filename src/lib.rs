//! blelink - a fixed-capacity BLE peripheral core.
//!
//! Tracks up to `N` concurrent central connections, their notify/indicate
//! subscriptions (at most `K` of each per connection), keeps the device
//! discoverable while slots are free, and fans values out to subscribers.
//!
//! The host stack is abstracted behind [`ble::transport`]; the embedded
//! binary (`--features embedded`) wires it to the Nordic SoftDevice S140.
//! Everything else is plain `no_std` logic that runs on the host:
//!
//! Usage: `cargo test` (add `--features log` to see log output)

#![cfg_attr(not(test), no_std)]

// This must go FIRST so that all the other modules see its macros.
#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod error;
pub mod peripheral;

pub use ble::address::format_address;
pub use ble::callbacks::{NoopCallbacks, PeripheralCallbacks};
pub use ble::dispatcher::EventDispatcher;
pub use ble::event::GapEvent;
pub use ble::notify::NotificationSender;
pub use config::PeripheralConfig;
pub use error::{Error, PlatformError};
pub use peripheral::Peripheral;

// ═══════════════════════════════════════════════════════════════════════════
// Property Tests
// ═══════════════════════════════════════════════════════════════════════════
