//! Window-level resize dispatch.
//!
//! A [`ResizeBus`] fans one window resize out to every interested terminal.
//! Listeners register for a [`DispatchPhase`]: all capture listeners run
//! before any bubble listener, each group in registration order. The
//! [`ResizeSubscription`] returned by [`subscribe`](ResizeBus::subscribe)
//! deregisters its listener when dropped.
//!
//! The window wires it up once:
//!
//! ```ignore
//! let bus = ResizeBus::new();
//! let dispatcher = bus.clone();
//! let _subscription = cx.observe_window_bounds(window, move |_, _, _| {
//!     dispatcher.dispatch();
//! });
//! ```

pub use gpui::DispatchPhase;

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type Listener = Arc<dyn Fn()>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, DispatchPhase, Listener)>,
}

/// Fans window resizes out to subscribed listeners.
#[derive(Clone, Default)]
pub struct ResizeBus {
    registry: Arc<Mutex<Registry>>,
}

impl ResizeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `phase`.
    #[must_use = "dropping the subscription removes the listener"]
    pub fn subscribe(
        &self,
        phase: DispatchPhase,
        listener: impl Fn() + 'static,
    ) -> ResizeSubscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, phase, Arc::new(listener)));

        ResizeSubscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Delivers one resize. Returns how many listeners ran.
    pub fn dispatch(&self) -> usize {
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let ordered: Vec<Listener> = {
            let registry = self.registry.lock();
            let capture = registry
                .listeners
                .iter()
                .filter(|(_, phase, _)| matches!(phase, DispatchPhase::Capture));
            let bubble = registry
                .listeners
                .iter()
                .filter(|(_, phase, _)| matches!(phase, DispatchPhase::Bubble));
            capture
                .chain(bubble)
                .map(|(_, _, listener)| Arc::clone(listener))
                .collect()
        };

        for listener in &ordered {
            listener();
        }
        ordered.len()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

/// Keeps a resize listener registered for as long as it lives.
pub struct ResizeSubscription {
    registry: Weak<Mutex<Registry>>,
    id: u64,
}

impl Drop for ResizeSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().listeners.retain(|(id, _, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for ResizeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeSubscription")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_capture_runs_before_bubble() {
        let bus = ResizeBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = order.clone();
        let _bubble = bus.subscribe(DispatchPhase::Bubble, move || log.borrow_mut().push("bubble"));
        let log = order.clone();
        let _capture =
            bus.subscribe(DispatchPhase::Capture, move || log.borrow_mut().push("capture"));

        assert_eq!(bus.dispatch(), 2);
        assert_eq!(*order.borrow(), vec!["capture", "bubble"]);
    }

    #[test]
    fn test_dropping_subscription_removes_listener() {
        let bus = ResizeBus::new();
        let calls = Rc::new(RefCell::new(0));

        let counter = calls.clone();
        let subscription =
            bus.subscribe(DispatchPhase::Capture, move || *counter.borrow_mut() += 1);
        bus.dispatch();
        drop(subscription);
        bus.dispatch();

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let bus = ResizeBus::new();
        let slot: Rc<RefCell<Option<ResizeSubscription>>> = Rc::new(RefCell::new(None));

        let inner = slot.clone();
        let subscription = bus.subscribe(DispatchPhase::Capture, move || {
            inner.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(subscription);

        assert_eq!(bus.dispatch(), 1);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(bus.dispatch(), 0);
    }

    #[test]
    fn test_subscription_outliving_bus() {
        let bus = ResizeBus::new();
        let subscription = bus.subscribe(DispatchPhase::Bubble, || {});
        drop(bus);
        drop(subscription);
    }
}
