//! Per-connection characteristic subscriptions.
//!
//! Each connection carries two [`SubscriptionSet`]s, one per delivery kind.
//! Sets keep insertion order; removal shifts later entries down so repeated
//! queries during a session never see entries reorder.

use heapless::Vec;

use crate::ble::event::AttrHandle;
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscriptionKind {
    Notify,
    Indicate,
}

/// Ordered, duplicate-free set of at most `K` attribute handles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscriptionSet<const K: usize> {
    attrs: Vec<AttrHandle, K>,
}

impl<const K: usize> SubscriptionSet<K> {
    pub const fn new() -> Self {
        Self { attrs: Vec::new() }
    }

    /// Append `attr`. Already present is a no-op; a full set is rejected.
    pub fn subscribe(&mut self, attr: AttrHandle) -> Result<(), Error> {
        if self.contains(attr) {
            debug!("[sub] attr {} already subscribed", attr);
            return Ok(());
        }
        self.attrs.push(attr).map_err(|_| Error::CapacityExceeded)
    }

    /// Remove `attr`, preserving the order of the remaining entries.
    pub fn unsubscribe(&mut self, attr: AttrHandle) -> Result<(), Error> {
        let pos = self.position(attr).ok_or(Error::NotFound)?;
        self.attrs.remove(pos);
        Ok(())
    }

    pub fn contains(&self, attr: AttrHandle) -> bool {
        self.position(attr).is_some()
    }

    pub fn as_slice(&self) -> &[AttrHandle] {
        &self.attrs
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.attrs.is_full()
    }

    pub fn clear(&mut self) {
        self.attrs.clear();
    }

    fn position(&self, attr: AttrHandle) -> Option<usize> {
        self.attrs.iter().position(|&a| a == attr)
    }
}

/// Both subscription sets of one connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Subscriptions<const K: usize> {
    pub notify: SubscriptionSet<K>,
    pub indicate: SubscriptionSet<K>,
}

impl<const K: usize> Subscriptions<K> {
    pub const fn new() -> Self {
        Self {
            notify: SubscriptionSet::new(),
            indicate: SubscriptionSet::new(),
        }
    }

    pub fn get(&self, kind: SubscriptionKind) -> &SubscriptionSet<K> {
        match kind {
            SubscriptionKind::Notify => &self.notify,
            SubscriptionKind::Indicate => &self.indicate,
        }
    }

    pub fn get_mut(&mut self, kind: SubscriptionKind) -> &mut SubscriptionSet<K> {
        match kind {
            SubscriptionKind::Notify => &mut self.notify,
            SubscriptionKind::Indicate => &mut self.indicate,
        }
    }

    pub fn clear(&mut self) {
        self.notify.clear();
        self.indicate.clear();
    }
}
