//! Perch Dropdown
//!
//! Positioning and interaction engine shared by every dropdown-like widget
//! (menus, select lists, picker popovers, cascading submenus, tooltips):
//!
//! - **Geometry**: placement with a single vertical flip, alignment, viewport
//!   clamping and max-height bounds
//! - **Controller**: open/closed state driven by click, hover, focus or manual
//!   triggers, outside-click and escape dismissal, scroll/resize reactions
//! - **Host contract**: the small trait a widget implements to embed a controller
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use perch_core::{Document, Rect, Size};
//! use perch_dropdown::{ControllerHost, DropdownConfig, DropdownController, DropdownEvent, Host};
//!
//! struct Menu;
//!
//! impl Host for Menu {
//!     fn request_update(&self) {}
//!     fn dispatch_event(&self, event: &DropdownEvent) -> bool {
//!         !event.is_default_prevented()
//!     }
//! }
//!
//! let doc = Document::new(Size::new(800.0, 600.0));
//! let trigger = doc.create_element("button");
//! let panel = doc.create_element("div");
//! doc.append_child(doc.root(), trigger).unwrap();
//! doc.append_child(doc.root(), panel).unwrap();
//! doc.set_layout(trigger, Rect::new(10.0, 500.0, 100.0, 30.0)).unwrap();
//! doc.set_layout(panel, Rect::new(0.0, 0.0, 200.0, 150.0)).unwrap();
//!
//! let menu = Rc::new(Menu);
//! let dropdown = Rc::new(DropdownController::new(&doc, &menu, DropdownConfig::menu()));
//! dropdown.set_elements(panel, trigger);
//!
//! let controllers = ControllerHost::new();
//! controllers.add_controller(dropdown.clone());
//! controllers.connect();
//!
//! doc.click(trigger);
//! doc.flush_frames();
//! assert_eq!(dropdown.position().map(|p| p.top), Some(346.0));
//! ```

pub mod config;
pub mod controller;
pub mod dom_utils;
pub mod error;
pub mod events;
pub mod geometry;
pub mod host;
pub mod styles;

pub use config::{
    Alignment, ConfigPatch, DropdownConfig, Placement, PositionProcessor, PositioningMode,
    ScrollBehavior, TriggerMode,
};
pub use controller::DropdownController;
pub use error::{PositionError, Result};
pub use events::{DropdownEvent, DropdownEventKind};
pub use geometry::{
    calculate_available_space, calculate_complete_position, calculate_max_height,
    compute_position, Position, PositionContext, PositionOptions,
};
pub use host::{ControllerHost, Host, HostController};
