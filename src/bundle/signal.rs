//! Typed change notifications with scoped subscriptions.
//!
//! A [`Signal`] owns an ordered list of slots.  Connecting returns a
//! [`Connection`]; dropping it removes the slot again, so a subscription
//! never outlives the object holding its connection.  Forwarders that must
//! not keep their target alive hold a [`WeakSignal`] instead of the signal.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Slot<T> = Rc<dyn Fn(&T)>;

struct SlotList<T> {
    next_id: Cell<u64>,
    slots: RefCell<Vec<(u64, Slot<T>)>>,
}

impl<T> SlotList<T> {
    fn emit(&self, value: &T) {
        // Snapshot first: a slot may connect or disconnect while we iterate.
        let slots: Vec<Slot<T>> = self
            .slots
            .borrow()
            .iter()
            .map(|(_, slot)| slot.clone())
            .collect();
        for slot in slots {
            slot(value);
        }
    }
}

pub struct Signal<T> {
    inner: Rc<SlotList<T>>,
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SlotList {
                next_id: Cell::new(0),
                slots: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Register `slot`; it stays connected for as long as the returned
    /// [`Connection`] lives.
    #[must_use = "dropping the Connection disconnects the slot immediately"]
    pub fn connect<F>(&self, slot: F) -> Connection
    where
        F: Fn(&T) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id.wrapping_add(1));
        self.inner.slots.borrow_mut().push((id, Rc::new(slot)));

        let list = Rc::downgrade(&self.inner);
        Connection {
            disconnect: Some(Box::new(move || {
                if let Some(list) = list.upgrade() {
                    list.slots.borrow_mut().retain(|(slot_id, _)| *slot_id != id);
                }
            })),
        }
    }

    pub fn emit(&self, value: &T) {
        self.inner.emit(value);
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    pub fn downgrade(&self) -> WeakSignal<T> {
        WeakSignal {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.inner.slots.borrow().len())
            .finish()
    }
}

/// Non-owning handle to a [`Signal`].
pub struct WeakSignal<T> {
    inner: Weak<SlotList<T>>,
}

impl<T> WeakSignal<T> {
    /// Emit on the target signal if it still exists.  Returns false when the
    /// signal has been dropped.
    pub fn emit(&self, value: &T) -> bool {
        match self.inner.upgrade() {
            Some(list) => {
                list.emit(value);
                true
            }
            None => false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for WeakSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSignal")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Scoped subscription returned by [`Signal::connect`].
pub struct Connection {
    disconnect: Option<Box<dyn FnOnce()>>,
}

impl Connection {
    pub fn disconnect(mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Connection")
    }
}
