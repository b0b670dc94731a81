//! Bluetooth Low Energy subsystem.
//!
//! The peripheral core runs in the **Peripheral** role on top of an
//! abstract host stack:
//!
//! 1. **Dispatcher** - consumes GAP/GATT events one at a time, keeps the
//!    connection table and per-connection subscriptions up to date and
//!    calls the application hooks.
//! 2. **Advertiser** - builds the advertisement and scan response and keeps
//!    the device discoverable whenever a connection slot is free.
//! 3. **Notification sender** - pushes values to every peer subscribed to
//!    a characteristic, from any task.
//!
//! The host stack itself sits behind the traits in [`transport`].

pub mod address;
pub mod adv_builder;
pub mod advertiser;
pub mod callbacks;
pub mod connection;
pub mod dispatcher;
pub mod event;
pub mod notify;
pub mod rx;
pub mod security;
pub mod subscription;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock_transport;


pub use address::{format_address, AddrKind, Address};
pub use callbacks::{CallbackMessage, CallbackQueue, NoopCallbacks, PeripheralCallbacks};
pub use connection::{ConnectionRecord, ConnectionTable};
pub use dispatcher::EventDispatcher;
pub use event::{AttrHandle, ConnHandle, GapEvent, SubscribeReason};
pub use notify::NotificationSender;
pub use subscription::{SubscriptionKind, SubscriptionSet, Subscriptions};
pub use transport::{GapTransport, NotifyTransport};
