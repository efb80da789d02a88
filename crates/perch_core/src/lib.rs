//! Perch Core
//!
//! Headless stand-in for the browser environment floating panels live in:
//!
//! - **Geometry**: points, sizes, rectangles and edge distances
//! - **Document**: element tree with page-space layout, inline styles, classes and attributes
//! - **Selectors**: CSS-like selector lists for `matches`/`closest` queries
//! - **Events**: capture/target/bubble dispatch with exact listener removal
//! - **Scheduling**: virtual-clock timeouts and animation frames
//!
//! # Example
//!
//! ```rust
//! use perch_core::{Document, EventKind, EventTarget, ListenerOptions, Rect, Size};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let doc = Document::new(Size::new(800.0, 600.0));
//! let button = doc.create_element("button");
//! doc.append_child(doc.root(), button).unwrap();
//! doc.set_layout(button, Rect::new(10.0, 10.0, 80.0, 24.0)).unwrap();
//!
//! let clicks = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&clicks);
//! doc.add_event_listener(EventTarget::Node(button), EventKind::Click, ListenerOptions::BUBBLE, move |_| {
//!     counter.set(counter.get() + 1);
//! });
//!
//! doc.click(button);
//! assert_eq!(clicks.get(), 1);
//! ```

pub mod dom;
pub mod error;
pub mod events;
pub mod geometry;
pub mod scheduler;
pub mod selector;

pub use dom::{Document, NodeId};
pub use error::{DomError, Result};
pub use events::{
    Event, EventCallback, EventKind, EventPhase, EventTarget, Key, ListenerId, ListenerOptions,
};
pub use geometry::{Edges, Point, Rect, Size};
pub use scheduler::{FrameId, TaskCallback, TimerId};
pub use selector::{Selector, SelectorSubject};
