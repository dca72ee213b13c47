//! Cascade Core Runtime
//!
//! This crate provides the runtime primitives shared by the Cascade waterfall
//! layout:
//!
//! - **Events**: Typed waterfall notifications and a subscriber registry
//! - **Redraw Sessions**: Generation counter used to drop stale async work
//! - **Debounce**: Trailing-edge debouncing on top of tokio timers
//! - **Errors**: Layout configuration and loader error types
//!
//! # Example
//!
//! ```rust
//! use cascade_core::{EventEmitter, WaterfallEvent};
//!
//! let emitter = EventEmitter::new();
//! let id = emitter.subscribe(|event| println!("event: {}", event.name()));
//!
//! emitter.emit(&WaterfallEvent::Redraw);
//! assert!(emitter.unsubscribe(id));
//! ```

pub mod debounce;
pub mod error;
pub mod events;
pub mod session;

pub use debounce::Debounced;
pub use error::{LayoutError, LoadError, Result};
pub use events::{EventCallback, EventEmitter, SubscriberId, WaterfallEvent};
pub use session::{RedrawSession, SessionCounter};
