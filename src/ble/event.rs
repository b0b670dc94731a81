//! Link-layer events consumed by the dispatcher.
//!
//! The transport translates its native GAP/GATT callbacks into these values
//! and hands them, in order, to the single event worker.

/// Transport-assigned connection handle.
pub type ConnHandle = u16;

/// Attribute (characteristic value) handle.
pub type AttrHandle = u16;

/// Why a peer's subscription state changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscribeReason {
    /// Peer wrote the CCCD.
    Write,
    /// Link went down while subscribed; the subscription is cleared.
    Termination,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GapEvent {
    /// A connection attempt concluded. `status == 0` means established.
    Connect { handle: ConnHandle, status: i32 },
    Disconnect { handle: ConnHandle, reason: i32 },
    ConnectionUpdate { handle: ConnHandle, status: i32 },
    /// The advertising procedure ended (timeout, stop, or controller reason).
    AdvertiseComplete { reason: i32 },
    /// A notification or indication finished transmitting.
    NotifyTx {
        handle: ConnHandle,
        attr: AttrHandle,
        status: i32,
        indication: bool,
    },
    Subscribe {
        handle: ConnHandle,
        attr: AttrHandle,
        reason: SubscribeReason,
        prev_notify: bool,
        cur_notify: bool,
        prev_indicate: bool,
        cur_indicate: bool,
    },
    Mtu {
        handle: ConnHandle,
        channel_id: u16,
        mtu: u16,
    },
}

impl GapEvent {
    /// Connection the event refers to, if any.
    pub fn conn_handle(&self) -> Option<ConnHandle> {
        match *self {
            GapEvent::Connect { handle, .. }
            | GapEvent::Disconnect { handle, .. }
            | GapEvent::ConnectionUpdate { handle, .. }
            | GapEvent::NotifyTx { handle, .. }
            | GapEvent::Subscribe { handle, .. }
            | GapEvent::Mtu { handle, .. } => Some(handle),
            GapEvent::AdvertiseComplete { .. } => None,
        }
    }
}
