//! Application lifecycle hooks.
//!
//! The dispatcher calls these synchronously on the event context, after
//! the connection table has been updated and its lock released. A slow
//! hook stalls event processing; when that cannot be bounded, wrap the
//! real hooks behind a [`CallbackQueue`] and run [`pump`] on another task.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use crate::ble::connection::ConnectionRecord;
use crate::ble::event::GapEvent;
use crate::ble::subscription::SubscriptionKind;

/// Every hook defaults to doing nothing.
pub trait PeripheralCallbacks<const K: usize> {
    /// A connection was admitted at `index` in the connection table.
    fn on_connect(&mut self, _event: &GapEvent, _index: usize) {}

    /// A connection was removed; `record` is its final state.
    fn on_disconnect(&mut self, _event: &GapEvent, _record: ConnectionRecord<K>) {}

    fn on_subscribe_notify(&mut self, _event: &GapEvent, _index: usize) {}

    fn on_unsubscribe_notify(&mut self, _event: &GapEvent, _index: usize) {}

    fn on_subscribe_indicate(&mut self, _event: &GapEvent, _index: usize) {}

    fn on_unsubscribe_indicate(&mut self, _event: &GapEvent, _index: usize) {}
}

/// Hooks that ignore everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCallbacks;

impl<const K: usize> PeripheralCallbacks<K> for NoopCallbacks {}

impl<const K: usize, C: PeripheralCallbacks<K> + ?Sized> PeripheralCallbacks<K> for &mut C {
    fn on_connect(&mut self, event: &GapEvent, index: usize) {
        C::on_connect(self, event, index)
    }
    fn on_disconnect(&mut self, event: &GapEvent, record: ConnectionRecord<K>) {
        C::on_disconnect(self, event, record)
    }
    fn on_subscribe_notify(&mut self, event: &GapEvent, index: usize) {
        C::on_subscribe_notify(self, event, index)
    }
    fn on_unsubscribe_notify(&mut self, event: &GapEvent, index: usize) {
        C::on_unsubscribe_notify(self, event, index)
    }
    fn on_subscribe_indicate(&mut self, event: &GapEvent, index: usize) {
        C::on_subscribe_indicate(self, event, index)
    }
    fn on_unsubscribe_indicate(&mut self, event: &GapEvent, index: usize) {
        C::on_unsubscribe_indicate(self, event, index)
    }
}

/// A hook invocation captured for later delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallbackMessage<const K: usize> {
    Connected {
        event: GapEvent,
        index: usize,
    },
    Disconnected {
        event: GapEvent,
        record: ConnectionRecord<K>,
    },
    Subscribed {
        event: GapEvent,
        kind: SubscriptionKind,
        index: usize,
    },
    Unsubscribed {
        event: GapEvent,
        kind: SubscriptionKind,
        index: usize,
    },
}

impl<const K: usize> CallbackMessage<K> {
    /// Invoke the matching hook on `callbacks`.
    pub fn deliver<C: PeripheralCallbacks<K> + ?Sized>(self, callbacks: &mut C) {
        match self {
            CallbackMessage::Connected { event, index } => callbacks.on_connect(&event, index),
            CallbackMessage::Disconnected { event, record } => {
                callbacks.on_disconnect(&event, record)
            }
            CallbackMessage::Subscribed { event, kind, index } => match kind {
                SubscriptionKind::Notify => callbacks.on_subscribe_notify(&event, index),
                SubscriptionKind::Indicate => callbacks.on_subscribe_indicate(&event, index),
            },
            CallbackMessage::Unsubscribed { event, kind, index } => match kind {
                SubscriptionKind::Notify => callbacks.on_unsubscribe_notify(&event, index),
                SubscriptionKind::Indicate => callbacks.on_unsubscribe_indicate(&event, index),
            },
        }
    }
}

/// Hooks that only enqueue. Never blocks: a full queue drops the message.
pub struct CallbackQueue<'c, M: RawMutex, const K: usize, const Q: usize> {
    channel: &'c Channel<M, CallbackMessage<K>, Q>,
    dropped: usize,
}

impl<'c, M: RawMutex, const K: usize, const Q: usize> CallbackQueue<'c, M, K, Q> {
    pub fn new(channel: &'c Channel<M, CallbackMessage<K>, Q>) -> Self {
        Self { channel, dropped: 0 }
    }

    /// Messages lost to a full queue so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn enqueue(&mut self, message: CallbackMessage<K>) {
        if self.channel.try_send(message).is_err() {
            self.dropped += 1;
            warn!("[callbacks] queue full, dropping callback ({} dropped)", self.dropped);
        }
    }
}

impl<M: RawMutex, const K: usize, const Q: usize> PeripheralCallbacks<K>
    for CallbackQueue<'_, M, K, Q>
{
    fn on_connect(&mut self, event: &GapEvent, index: usize) {
        self.enqueue(CallbackMessage::Connected { event: *event, index });
    }

    fn on_disconnect(&mut self, event: &GapEvent, record: ConnectionRecord<K>) {
        self.enqueue(CallbackMessage::Disconnected { event: *event, record });
    }

    fn on_subscribe_notify(&mut self, event: &GapEvent, index: usize) {
        self.enqueue(CallbackMessage::Subscribed {
            event: *event,
            kind: SubscriptionKind::Notify,
            index,
        });
    }

    fn on_unsubscribe_notify(&mut self, event: &GapEvent, index: usize) {
        self.enqueue(CallbackMessage::Unsubscribed {
            event: *event,
            kind: SubscriptionKind::Notify,
            index,
        });
    }

    fn on_subscribe_indicate(&mut self, event: &GapEvent, index: usize) {
        self.enqueue(CallbackMessage::Subscribed {
            event: *event,
            kind: SubscriptionKind::Indicate,
            index,
        });
    }

    fn on_unsubscribe_indicate(&mut self, event: &GapEvent, index: usize) {
        self.enqueue(CallbackMessage::Unsubscribed {
            event: *event,
            kind: SubscriptionKind::Indicate,
            index,
        });
    }
}

/// Deliver queued hooks forever. Run this on its own task.
pub async fn pump<M: RawMutex, C: PeripheralCallbacks<K>, const K: usize, const Q: usize>(
    channel: &Channel<M, CallbackMessage<K>, Q>,
    callbacks: &mut C,
) -> ! {
    loop {
        channel.receive().await.deliver(callbacks);
    }
}

/// Deliver whatever is queued right now. Returns how many hooks ran.
pub fn drain<M: RawMutex, C: PeripheralCallbacks<K>, const K: usize, const Q: usize>(
    channel: &Channel<M, CallbackMessage<K>, Q>,
    callbacks: &mut C,
) -> usize {
    let mut delivered = 0;
    while let Ok(message) = channel.try_receive() {
        message.deliver(callbacks);
        delivered += 1;
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::address::{AddrKind, Address};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[derive(Default)]
    struct Recorder {
        seen: std::vec::Vec<&'static str>,
        last_index: Option<usize>,
    }

    impl PeripheralCallbacks<4> for Recorder {
        fn on_connect(&mut self, _event: &GapEvent, index: usize) {
            self.seen.push("connect");
            self.last_index = Some(index);
        }
        fn on_disconnect(&mut self, _event: &GapEvent, _record: ConnectionRecord<4>) {
            self.seen.push("disconnect");
        }
        fn on_subscribe_notify(&mut self, _event: &GapEvent, _index: usize) {
            self.seen.push("sub-notify");
        }
        fn on_unsubscribe_indicate(&mut self, _event: &GapEvent, _index: usize) {
            self.seen.push("unsub-indicate");
        }
    }

    const CONNECT: GapEvent = GapEvent::Connect {
        handle: 1,
        status: 0,
    };

    #[test]
    fn queue_defers_until_drained() {
        let channel: Channel<NoopRawMutex, CallbackMessage<4>, 4> = Channel::new();
        let mut queue = CallbackQueue::new(&channel);
        let mut recorder = Recorder::default();

        queue.on_connect(&CONNECT, 2);
        queue.on_subscribe_notify(&CONNECT, 2);
        queue.on_unsubscribe_indicate(&CONNECT, 2);
        assert!(recorder.seen.is_empty());

        assert_eq!(drain(&channel, &mut recorder), 3);
        assert_eq!(recorder.seen, ["connect", "sub-notify", "unsub-indicate"]);
        assert_eq!(recorder.last_index, Some(2));
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let channel: Channel<NoopRawMutex, CallbackMessage<4>, 1> = Channel::new();
        let mut queue = CallbackQueue::new(&channel);

        queue.on_connect(&CONNECT, 0);
        queue.on_connect(&CONNECT, 1);
        assert_eq!(queue.dropped(), 1);

        let mut recorder = Recorder::default();
        assert_eq!(drain(&channel, &mut recorder), 1);
        assert_eq!(recorder.last_index, Some(0));
    }

    #[test]
    fn disconnect_message_carries_snapshot() {
        let channel: Channel<NoopRawMutex, CallbackMessage<4>, 2> = Channel::new();
        let mut queue = CallbackQueue::new(&channel);
        let record = ConnectionRecord::new(7, Address::new(AddrKind::Public, [9; 6]));

        let event = GapEvent::Disconnect {
            handle: 7,
            reason: 0x13,
        };
        queue.on_disconnect(&event, record.clone());

        match channel.try_receive().unwrap() {
            CallbackMessage::Disconnected { record: queued, .. } => assert_eq!(queued, record),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn noop_callbacks_accept_everything() {
        let mut noop = NoopCallbacks;
        PeripheralCallbacks::<4>::on_connect(&mut noop, &CONNECT, 0);
        PeripheralCallbacks::<4>::on_unsubscribe_notify(&mut noop, &CONNECT, 0);
    }
}
