//! Host contract
//!
//! A host is the widget that embeds a dropdown: it owns the trigger and panel
//! elements, re-renders on request and receives lifecycle events. Controllers
//! hook into the host's connect/disconnect lifecycle through [`ControllerHost`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::events::DropdownEvent;

/// What a widget provides to a dropdown controller
pub trait Host {
    /// A disabled host refuses to open
    fn is_disabled(&self) -> bool {
        false
    }

    /// Ask the host to re-render
    fn request_update(&self);

    /// Deliver a lifecycle event; returns false if a listener cancelled it
    fn dispatch_event(&self, event: &DropdownEvent) -> bool;
}

/// Something that follows its host's connection lifecycle
pub trait HostController {
    fn host_connected(&self);
    fn host_disconnected(&self);
}

/// Controller registry a host embeds to fan out connect/disconnect
#[derive(Default)]
pub struct ControllerHost {
    controllers: RefCell<Vec<Rc<dyn HostController>>>,
    connected: Cell<bool>,
}

impl ControllerHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller; it is connected immediately if the host already is
    pub fn add_controller(&self, controller: Rc<dyn HostController>) {
        self.controllers.borrow_mut().push(Rc::clone(&controller));
        if self.connected.get() {
            controller.host_connected();
        }
    }

    /// Unregister a controller, returning whether it was registered
    pub fn remove_controller(&self, controller: &Rc<dyn HostController>) -> bool {
        let mut controllers = self.controllers.borrow_mut();
        let before = controllers.len();
        controllers.retain(|c| !Rc::ptr_eq(c, controller));
        controllers.len() != before
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.borrow().len()
    }

    /// Host attached to the document
    pub fn connect(&self) {
        if self.connected.replace(true) {
            return;
        }
        for controller in self.snapshot() {
            controller.host_connected();
        }
    }

    /// Host detached from the document
    pub fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        for controller in self.snapshot() {
            controller.host_disconnected();
        }
    }

    // Controllers may register further controllers while being notified
    fn snapshot(&self) -> Vec<Rc<dyn HostController>> {
        self.controllers.borrow().clone()
    }
}

impl fmt::Debug for ControllerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHost")
            .field("controllers", &self.controllers.borrow().len())
            .field("connected", &self.connected.get())
            .finish()
    }
}
