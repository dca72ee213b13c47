//! Waterfall notifications
//!
//! The layout reports what it did through a small set of events. Hosts
//! subscribe to them to re-render, show spinners, or surface load errors.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use cascade_core::{EventEmitter, WaterfallEvent};
//!
//! let emitter = EventEmitter::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! emitter.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
//!
//! emitter.emit(&WaterfallEvent::RedrawSkip);
//! assert_eq!(*seen.lock().unwrap(), vec![WaterfallEvent::RedrawSkip]);
//! ```

use std::sync::{Arc, RwLock};

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle returned by [`EventEmitter::subscribe`]
    pub struct SubscriberId;
}

/// Event name for [`WaterfallEvent::Redraw`]
pub const EVENT_REDRAW: &str = "redraw";
/// Event name for [`WaterfallEvent::RedrawSkip`]
pub const EVENT_REDRAW_SKIP: &str = "redrawSkip";
/// Event name for [`WaterfallEvent::ScrollLoadStart`]
pub const EVENT_SCROLL_LOAD_START: &str = "scrollLoadStart";
/// Event name for [`WaterfallEvent::ScrollLoadEnd`]
pub const EVENT_SCROLL_LOAD_END: &str = "scrollLoadEnd";

/// Notifications emitted by a waterfall
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaterfallEvent {
    /// A full redraw completed and committed new column contents
    Redraw,
    /// A redraw was requested but the column count was unchanged
    RedrawSkip,
    /// The scroll-load callback was invoked and is pending
    ScrollLoadStart,
    /// The scroll-load callback settled; `error` is set only on failure
    ScrollLoadEnd { error: Option<String> },
}

impl WaterfallEvent {
    /// Stable event name, matching the names hosts bind listeners to
    pub fn name(&self) -> &'static str {
        match self {
            WaterfallEvent::Redraw => EVENT_REDRAW,
            WaterfallEvent::RedrawSkip => EVENT_REDRAW_SKIP,
            WaterfallEvent::ScrollLoadStart => EVENT_SCROLL_LOAD_START,
            WaterfallEvent::ScrollLoadEnd { .. } => EVENT_SCROLL_LOAD_END,
        }
    }

    /// Whether this event belongs to the scroll-load cycle
    pub fn is_scroll_load(&self) -> bool {
        matches!(
            self,
            WaterfallEvent::ScrollLoadStart | WaterfallEvent::ScrollLoadEnd { .. }
        )
    }
}

/// Callback invoked for every emitted event
pub type EventCallback = Arc<dyn Fn(&WaterfallEvent) + Send + Sync>;

/// Registry of event subscribers
///
/// Callbacks run on the emitting task. The subscriber list is snapshotted
/// before dispatch, so a callback may subscribe or unsubscribe without
/// deadlocking; such changes apply from the next emission.
#[derive(Default)]
pub struct EventEmitter {
    subscribers: RwLock<SlotMap<SubscriberId, EventCallback>>,
}

impl EventEmitter {
    /// Create an emitter with no subscribers
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(SlotMap::with_key()),
        }
    }

    /// Register a callback for all events
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&WaterfallEvent) + Send + Sync + 'static,
    {
        match self.subscribers.write() {
            Ok(mut subscribers) => subscribers.insert(Arc::new(callback)),
            Err(poisoned) => poisoned.into_inner().insert(Arc::new(callback)),
        }
    }

    /// Remove a subscriber, returning whether it was registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers
            .write()
            .ok()
            .and_then(|mut subscribers| subscribers.remove(id))
            .is_some()
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Deliver an event to every subscriber
    pub fn emit(&self, event: &WaterfallEvent) {
        let callbacks: Vec<EventCallback> = match self.subscribers.read() {
            Ok(subscribers) => subscribers.values().cloned().collect(),
            Err(_) => return,
        };

        tracing::trace!(event = event.name(), subscribers = callbacks.len(), "emit");
        for callback in callbacks {
            callback(event);
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
