//! Outbound value pushes to subscribed peers.
//!
//! Safe to use from any task: the sender only reads the connection table,
//! snapshots the subscribed handles under the lock and issues the
//! fire-and-forget transmits after releasing it.

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::Vec;

use crate::ble::event::{AttrHandle, ConnHandle};
use crate::ble::subscription::SubscriptionKind;
use crate::ble::transport::NotifyTransport;
use crate::error::Error;
use crate::peripheral::Peripheral;

pub struct NotificationSender<'a, M, T, const N: usize, const K: usize>
where
    M: RawMutex,
    T: NotifyTransport,
{
    peripheral: &'a Peripheral<M, N, K>,
    transport: T,
}

impl<'a, M, T, const N: usize, const K: usize> NotificationSender<'a, M, T, N, K>
where
    M: RawMutex,
    T: NotifyTransport,
{
    pub fn new(peripheral: &'a Peripheral<M, N, K>, transport: T) -> Self {
        Self { peripheral, transport }
    }

    /// Notify every peer subscribed to `attr`.
    ///
    /// `message` is staged in `buffer` with a trailing NUL, so it must be
    /// strictly shorter than the buffer. Returns how many transmits were
    /// queued; zero subscribers is not an error.
    pub fn notify(
        &self,
        attr: AttrHandle,
        buffer: &mut [u8],
        message: &[u8],
    ) -> Result<usize, Error> {
        self.push(SubscriptionKind::Notify, attr, buffer, message)
    }

    /// Same as [`notify`](Self::notify), over the indicate subscriptions.
    pub fn indicate(
        &self,
        attr: AttrHandle,
        buffer: &mut [u8],
        message: &[u8],
    ) -> Result<usize, Error> {
        self.push(SubscriptionKind::Indicate, attr, buffer, message)
    }

    fn push(
        &self,
        kind: SubscriptionKind,
        attr: AttrHandle,
        buffer: &mut [u8],
        message: &[u8],
    ) -> Result<usize, Error> {
        let len = message.len();
        if len >= buffer.len() {
            error!("Message is too long: {} bytes, buffer holds {}", len, buffer.len());
            return Err(Error::MessageTooLong);
        }

        let targets: Option<Vec<ConnHandle, N>> = self.peripheral.with_state(|s| {
            if s.connections.is_empty() {
                return None;
            }
            Some(
                s.connections
                    .iter()
                    .filter(|r| r.subscriptions.get(kind).contains(attr))
                    .map(|r| r.handle)
                    .collect(),
            )
        });
        let Some(targets) = targets else {
            warn!("No active BLE connections to send notifications.");
            return Err(Error::NoConnections);
        };

        buffer[..len].copy_from_slice(message);
        buffer[len] = 0;
        let payload = &buffer[..len];

        let mut sent = 0;
        for handle in targets {
            let result = match kind {
                SubscriptionKind::Notify => self.transport.notify(handle, attr, payload),
                SubscriptionKind::Indicate => self.transport.indicate(handle, attr, payload),
            };
            match result {
                Ok(()) => {
                    debug!("{:?} sent: conn_handle={}, attr_handle={}", kind, handle, attr);
                    sent += 1;
                }
                Err(e) => {
                    error!(
                        "{:?} failed: conn_handle={}, attr_handle={}, error={:?}",
                        kind, handle, attr, e
                    );
                }
            }
        }
        Ok(sent)
    }
}
