//! UseCase: inbound event dispatch
//!
//! ## 概要
//!
//! カテゴリごとにリスナーを登録順に保持し、受信イベントを配送します。
//!
//! ## 保証
//!
//! - 同じカテゴリ内では登録順に配送される
//! - `Subscription::unsubscribe()` が戻った後、そのリスナーは二度と呼ばれない
//! - リスナーのエラー（`Err` または panic）は記録されるだけで、後続のリスナーへの配送は続く
//! - 未知のカテゴリのフレームは診断ログを出して破棄される

use std::{
    cell::RefCell,
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Weak},
};

use parking_lot::ReentrantMutex;

use crate::{
    domain::{EventCategory, FrameError, InboundEvent, ListenerFault},
    infrastructure::dto::conversion::decode_frame,
};

/// What a listener returns; `Err` is reported as a [`ListenerFault`]
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Callback = Arc<dyn Fn(&InboundEvent) -> ListenerResult + Send + Sync>;

struct Listener {
    id: u64,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventCategory, Vec<Listener>>,
}

impl Registry {
    fn is_registered(&self, category: EventCategory, id: u64) -> bool {
        self.listeners
            .get(&category)
            .is_some_and(|listeners| listeners.iter().any(|l| l.id == id))
    }
}

// The registry lock is held for the whole of a dispatch. It is reentrant so
// that listeners may subscribe or unsubscribe from inside a callback; a
// different thread calling `unsubscribe` waits until the dispatch finishes.
type SharedRegistry = ReentrantMutex<RefCell<Registry>>;

/// Outcome of delivering one event
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that ran to completion
    pub delivered: usize,
    /// Listeners that returned `Err` or panicked
    pub faults: Vec<ListenerFault>,
}

/// Registry of listeners per event category
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<SharedRegistry>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` to the listeners of `category`.
    ///
    /// The returned [`Subscription`] removes exactly this callback.
    pub fn subscribe<F>(&self, category: EventCategory, callback: F) -> Subscription
    where
        F: Fn(&InboundEvent) -> ListenerResult + Send + Sync + 'static,
    {
        let guard = self.registry.lock();
        let mut registry = guard.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .listeners
            .entry(category)
            .or_default()
            .push(Listener {
                id,
                callback: Arc::new(callback),
            });
        tracing::debug!("Listener {} subscribed to '{}'", id, category);

        Subscription {
            registry: Arc::downgrade(&self.registry),
            category,
            id,
        }
    }

    pub fn listener_count(&self, category: EventCategory) -> usize {
        let guard = self.registry.lock();
        let registry = guard.borrow();
        registry.listeners.get(&category).map_or(0, Vec::len)
    }

    /// Deliver `event` to every listener of its category, in registration order.
    pub fn dispatch(&self, event: &InboundEvent) -> DispatchReport {
        let category = event.category();
        let guard = self.registry.lock();

        let snapshot: Vec<(u64, Callback)> = guard
            .borrow()
            .listeners
            .get(&category)
            .map(|listeners| {
                listeners
                    .iter()
                    .map(|l| (l.id, Arc::clone(&l.callback)))
                    .collect()
            })
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for (id, callback) in snapshot {
            // A sibling may have unsubscribed this listener earlier in this dispatch.
            if !guard.borrow().is_registered(category, id) {
                continue;
            }

            let message = match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };

            let fault = ListenerFault { category, message };
            tracing::warn!("{}", fault);
            report.faults.push(fault);
        }

        report
    }

    /// Decode a raw text frame and dispatch it.
    ///
    /// # Errors
    ///
    /// Returns the `FrameError` for malformed frames and unknown categories;
    /// those frames are dropped after a diagnostic.
    pub fn dispatch_frame(&self, text: &str) -> Result<DispatchReport, FrameError> {
        match decode_frame(text) {
            Ok(event) => {
                tracing::debug!("Dispatching '{}'", event.category());
                Ok(self.dispatch(&event))
            }
            Err(e) => {
                tracing::warn!("Dropping inbound frame: {}", e);
                Err(e)
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Capability to remove one registered listener
#[must_use = "keep the Subscription to be able to unsubscribe the listener"]
pub struct Subscription {
    registry: Weak<SharedRegistry>,
    category: EventCategory,
    id: u64,
}

impl Subscription {
    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// Remove the listener. Returns `false` if it was already removed.
    ///
    /// Once this returns the listener is never invoked again.
    pub fn unsubscribe(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let guard = registry.lock();
        let mut registry = guard.borrow_mut();
        let Some(listeners) = registry.listeners.get_mut(&self.category) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|l| l.id != self.id);
        let removed = listeners.len() != before;
        if removed {
            tracing::debug!("Listener {} unsubscribed from '{}'", self.id, self.category);
        }
        removed
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("category", &self.category)
            .field("id", &self.id)
            .finish()
    }
}
