//! GAP/GATT event state machine.
//!
//! [`EventDispatcher`] is the single writer of the connection table. The
//! application feeds it every event from one context, in order. Table
//! mutations happen under the [`Peripheral`] lock; callbacks and transport
//! calls run after the lock is released.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::ble::address::Address;
use crate::ble::advertiser::{AdvContent, Advertiser};
use crate::ble::callbacks::PeripheralCallbacks;
use crate::ble::event::{AttrHandle, ConnHandle, GapEvent, SubscribeReason};
use crate::ble::subscription::{SubscriptionKind, SubscriptionSet};
use crate::ble::transport::GapTransport;
use crate::config::{AdvertisingConfig, PeripheralConfig, TX_STATUS_DONE, TX_STATUS_SUCCESS};
use crate::error::{Error, PlatformError};
use crate::peripheral::Peripheral;

/// What a subscribe event did to one subscription set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    Subscribed(Result<(), Error>),
    Unsubscribed,
}

pub struct EventDispatcher<'d, M, T, C, const N: usize, const K: usize>
where
    M: RawMutex,
    T: GapTransport,
    C: PeripheralCallbacks<K>,
{
    peripheral: &'d Peripheral<M, N, K>,
    transport: T,
    callbacks: C,
    advertiser: Advertiser,
    device_name: &'d str,
    random_address: bool,
    advertising: AdvertisingConfig<'d>,
}

impl<'d, M, T, C, const N: usize, const K: usize> EventDispatcher<'d, M, T, C, N, K>
where
    M: RawMutex,
    T: GapTransport,
    C: PeripheralCallbacks<K>,
{
    pub fn new<S: ?Sized>(
        peripheral: &'d Peripheral<M, N, K>,
        config: &PeripheralConfig<'d, S>,
        transport: T,
        callbacks: C,
    ) -> Self {
        Self {
            peripheral,
            transport,
            callbacks,
            advertiser: Advertiser::new(),
            device_name: config.device_name,
            random_address: config.security.random_address,
            advertising: config.advertising,
        }
    }

    pub fn advertiser(&self) -> &Advertiser {
        &self.advertiser
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn callbacks_mut(&mut self) -> &mut C {
        &mut self.callbacks
    }

    /// Handle one event.
    ///
    /// Errors are informational: the event has already been logged and
    /// dropped, the caller should just move on to the next one.
    pub fn dispatch(&mut self, event: &GapEvent) -> Result<(), Error> {
        match *event {
            GapEvent::Connect { handle, status } => self.on_connect(event, handle, status),
            GapEvent::Disconnect { handle, reason } => self.on_disconnect(event, handle, reason),
            GapEvent::ConnectionUpdate { handle, status } => {
                debug!("Connection updated; conn_handle={} status={}", handle, status);
                Ok(())
            }
            GapEvent::AdvertiseComplete { reason } => {
                let content = self.content();
                self.advertiser.on_complete(&mut self.transport, &content, reason)
            }
            GapEvent::NotifyTx {
                handle,
                attr,
                status,
                indication,
            } => {
                if status != TX_STATUS_SUCCESS && status != TX_STATUS_DONE {
                    info!(
                        "Notify event; conn_handle={} attr_handle={} status={} is_indication={}",
                        handle, attr, status, indication
                    );
                }
                Ok(())
            }
            GapEvent::Subscribe {
                handle,
                attr,
                reason,
                prev_notify,
                cur_notify,
                prev_indicate,
                cur_indicate,
            } => self.on_subscribe(
                event,
                handle,
                attr,
                reason,
                (prev_notify, cur_notify),
                (prev_indicate, cur_indicate),
            ),
            GapEvent::Mtu {
                handle,
                channel_id,
                mtu,
            } => {
                info!("mtu update event; conn_handle={} cid={} mtu={}", handle, channel_id, mtu);
                self.peripheral.with_state_mut(|s| {
                    if let Some((_, record)) = s.connections.by_handle_mut(handle) {
                        record.att_mtu = mtu;
                    }
                });
                Ok(())
            }
        }
    }

    /// The host and controller are in sync: set up our identity and start
    /// advertising. Identity failures are fatal at bring-up
    /// (see [`Error::is_fatal_at_bringup`]).
    pub fn on_host_sync(&mut self) -> Result<(), Error> {
        if self.random_address {
            self.transport.set_random_identity().map_err(|e| {
                error!("Failed to set random address, error: {:?}", e);
                identity_failure(e)
            })?;
        }

        self.transport.ensure_address(self.random_address).map_err(|e| {
            error!("Failed to ensure address, error: {:?}", e);
            identity_failure(e)
        })?;

        let kind = self.transport.infer_own_address_kind().map_err(|e| {
            error!("Failed to infer address type, error: {:?}", e);
            identity_failure(e)
        })?;

        let bytes = self.transport.own_address(kind).map_err(|e| {
            error!("Failed to copy address, error: {:?}", e);
            identity_failure(e)
        })?;

        let own = Address::new(kind, bytes);
        info!("MAC: {}", own.to_addr_string().as_str());

        self.peripheral.with_state_mut(|s| {
            s.own_address = own;
            s.connections.clear();
        });

        self.advertiser.mark_idle();
        self.start_advertising()
    }

    /// The host stack reset itself. Advertising is gone; a sync follows.
    pub fn on_host_reset(&mut self, reason: i32) {
        info!("Host and controller reset, error: {}", reason);
        self.advertiser.mark_idle();
    }

    pub fn start_advertising(&mut self) -> Result<(), Error> {
        let content = self.content();
        self.advertiser.start(&mut self.transport, &content)
    }

    /// Leave discoverability until the next disconnect or explicit start.
    pub fn stop_advertising(&mut self) -> Result<(), Error> {
        self.advertiser.stop(&mut self.transport)
    }

    fn content(&self) -> AdvContent<'d> {
        AdvContent {
            device_name: self.device_name,
            own_address: self.peripheral.own_address(),
            config: self.advertising,
        }
    }

    /// Restart advertising if another peer could still connect.
    fn resume_advertising(&mut self) -> Result<(), Error> {
        if !self.peripheral.has_capacity() || self.advertiser.is_advertising() {
            return Ok(());
        }
        self.start_advertising()
    }

    fn on_connect(
        &mut self,
        event: &GapEvent,
        handle: ConnHandle,
        status: i32,
    ) -> Result<(), Error> {
        // Legacy connectable advertising stops once an attempt concludes.
        self.advertiser.mark_idle();

        if status != 0 {
            info!("Connection failed; status={}", status);
            return self.resume_advertising();
        }

        let peer = self.transport.peer_address(handle).map_err(|e| {
            error!("Failed to find connection descriptor (handle {}), error: {:?}", handle, e);
            e
        })?;

        let index = match self.peripheral.with_state_mut(|s| s.connections.admit(handle, peer)) {
            Ok(index) => index,
            Err(Error::CapacityExceeded) => {
                warn!("Maximum connections reached; cannot register connection handle {}", handle);
                return Err(Error::CapacityExceeded);
            }
            Err(e) => return Err(e),
        };

        info!(
            "Connection established; conn_handle={} peer={} slot={}",
            handle,
            peer.to_addr_string().as_str(),
            index
        );
        self.callbacks.on_connect(event, index);

        if self.advertising.readvertise_while_connected {
            self.resume_advertising()?;
        }
        Ok(())
    }

    fn on_disconnect(
        &mut self,
        event: &GapEvent,
        handle: ConnHandle,
        reason: i32,
    ) -> Result<(), Error> {
        let record = self
            .peripheral
            .with_state_mut(|s| s.connections.remove(handle))
            .map_err(|e| {
                warn!("Disconnect event for unknown connection: handle={}", handle);
                e
            })?;

        info!(
            "Disconnected; conn_handle={} peer={} reason={}",
            handle,
            record.peer_str.as_str(),
            reason
        );
        self.callbacks.on_disconnect(event, record);

        self.resume_advertising()
    }

    fn on_subscribe(
        &mut self,
        event: &GapEvent,
        handle: ConnHandle,
        attr: AttrHandle,
        reason: SubscribeReason,
        notify: (bool, bool),
        indicate: (bool, bool),
    ) -> Result<(), Error> {
        debug!(
            "Subscribe event; conn_handle={} attr_handle={} reason={:?}",
            handle, attr, reason
        );

        let outcome = self.peripheral.with_state_mut(|s| {
            let (index, record) = s.connections.by_handle_mut(handle)?;
            let subs = &mut record.subscriptions;
            let notify = apply_edge(subs.get_mut(SubscriptionKind::Notify), attr, notify);
            let indicate = apply_edge(subs.get_mut(SubscriptionKind::Indicate), attr, indicate);
            Some((index, notify, indicate))
        });

        let Some((index, notify, indicate)) = outcome else {
            error!("Subscribe event connection handle {} not found", handle);
            return Err(Error::NotFound);
        };

        let mut result = Ok(());
        let edges = [
            (SubscriptionKind::Notify, notify),
            (SubscriptionKind::Indicate, indicate),
        ];
        for (kind, edge) in edges {
            let Some(edge) = edge else { continue };
            match (kind, edge) {
                (SubscriptionKind::Notify, Edge::Subscribed(r)) => {
                    if r.is_err() {
                        warn!("Max notification subscriptions reached on connection {}", handle);
                        result = r;
                    }
                    self.callbacks.on_subscribe_notify(event, index);
                }
                (SubscriptionKind::Notify, Edge::Unsubscribed) => {
                    self.callbacks.on_unsubscribe_notify(event, index);
                }
                (SubscriptionKind::Indicate, Edge::Subscribed(r)) => {
                    if r.is_err() {
                        warn!("Max indication subscriptions reached on connection {}", handle);
                        result = r;
                    }
                    self.callbacks.on_subscribe_indicate(event, index);
                }
                (SubscriptionKind::Indicate, Edge::Unsubscribed) => {
                    self.callbacks.on_unsubscribe_indicate(event, index);
                }
            }
        }
        result
    }
}

/// Apply one `(previous, current)` pair. No change, no edge.
fn apply_edge<const K: usize>(
    set: &mut SubscriptionSet<K>,
    attr: AttrHandle,
    (prev, cur): (bool, bool),
) -> Option<Edge> {
    match (prev, cur) {
        (false, true) => Some(Edge::Subscribed(set.subscribe(attr))),
        (true, false) => {
            if set.unsubscribe(attr).is_err() {
                debug!("attr {} was not tracked", attr);
            }
            Some(Edge::Unsubscribed)
        }
        _ => None,
    }
}

/// Normalise identity errors so the caller can tell they are fatal.
fn identity_failure(e: PlatformError) -> Error {
    match e {
        PlatformError::InvalidAddress => Error::Platform(PlatformError::InvalidAddress),
        _ => Error::Platform(PlatformError::NoAddress),
    }
}
