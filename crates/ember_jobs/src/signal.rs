//! # Signal
//!
//! Multi-subscriber callback broadcast with connect/disconnect and
//! reentrancy-safe emission.
//!
//! Every mutating operation and `emit` take the same lock, but `emit`
//! copies the subscriber list out from under the lock before invoking
//! anything. A callback is therefore free to connect or disconnect on the
//! very signal that is calling it without deadlocking or corrupting
//! iteration - the changes simply take effect from the next emission.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Identifier for one subscription, returned by [`Signal::connect`].
///
/// Ids are monotonically increasing and never reused, so a stale id can be
/// disconnected harmlessly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Subscribers<A> {
    next_id: u64,
    callbacks: BTreeMap<ConnectionId, Callback<A>>,
}

/// Thread-safe broadcast of a value to any number of subscribers.
///
/// Subscribers are invoked in connection order.
///
/// # Example
///
/// ```rust,ignore
/// let signal: Signal<u32> = Signal::new();
/// let id = signal.connect(|n| println!("tick {n}"));
/// signal.emit(&7);
/// signal.disconnect(id);
/// ```
pub struct Signal<A> {
    inner: Mutex<Subscribers<A>>,
}

impl<A> Signal<A> {
    /// Creates a signal with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Subscribers {
                next_id: 1,
                callbacks: BTreeMap::new(),
            }),
        }
    }

    /// Registers `callback` and returns its connection id.
    pub fn connect<F>(&self, callback: F) -> ConnectionId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = ConnectionId(inner.next_id);
        inner.next_id += 1;
        inner.callbacks.insert(id, Arc::new(callback));
        id
    }

    /// Removes one subscription. Unknown ids are ignored.
    pub fn disconnect(&self, id: ConnectionId) {
        self.inner.lock().callbacks.remove(&id);
    }

    /// Removes every subscription.
    pub fn disconnect_all(&self) {
        self.inner.lock().callbacks.clear();
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().callbacks.len()
    }

    /// Invokes every subscriber with `args`.
    ///
    /// The subscriber list is snapshotted before any callback runs;
    /// connects and disconnects made by callbacks apply to later emissions.
    pub fn emit(&self, args: &A) {
        let snapshot: Vec<Callback<A>> = {
            let inner = self.inner.lock();
            inner.callbacks.values().cloned().collect()
        };
        for callback in snapshot {
            callback(args);
        }
    }
}

impl<A> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}
