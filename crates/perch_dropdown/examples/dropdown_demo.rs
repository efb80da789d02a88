//! Dropdown Demo
//!
//! Drives two dropdowns against a headless document and logs what happens:
//!
//! - A click menu near the bottom of the viewport that flips above its trigger
//! - A hover submenu whose clicks do not dismiss the parent menu
//! - Scroll repositioning and escape dismissal
//!
//! Run with: RUST_LOG=debug cargo run -p perch_dropdown --example dropdown_demo

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use perch_core::{Document, Key, NodeId, Point, Rect, Size};
use perch_dropdown::{
    ControllerHost, DropdownConfig, DropdownController, DropdownEvent, Host,
};

/// Widget that logs lifecycle events and counts re-renders
struct LoggingWidget {
    name: &'static str,
    renders: RefCell<u32>,
}

impl LoggingWidget {
    fn new(name: &'static str) -> Rc<Self> {
        Rc::new(Self {
            name,
            renders: RefCell::new(0),
        })
    }
}

impl Host for LoggingWidget {
    fn request_update(&self) {
        *self.renders.borrow_mut() += 1;
    }

    fn dispatch_event(&self, event: &DropdownEvent) -> bool {
        match event.detail() {
            Some(position) => tracing::info!(
                "[{}] {} -> {} at ({}, {})",
                self.name,
                event.name(),
                position.placement,
                position.left,
                position.top
            ),
            None => tracing::info!("[{}] {}", self.name, event.name()),
        }
        !event.is_default_prevented()
    }
}

fn element(doc: &Document, parent: NodeId, tag: &str, rect: Rect) -> Result<NodeId> {
    let node = doc.create_element(tag);
    doc.append_child(parent, node)?;
    doc.set_layout(node, rect)?;
    Ok(node)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let doc = Document::new(Size::new(800.0, 600.0));
    let root = doc.root();

    let menu_button = element(&doc, root, "button", Rect::new(10.0, 500.0, 100.0, 30.0))?;
    let menu_panel = element(&doc, root, "ul", Rect::new(10.0, 346.0, 200.0, 150.0))?;
    let share_item = element(&doc, menu_panel, "li", Rect::new(10.0, 346.0, 200.0, 30.0))?;
    let submenu_panel = element(&doc, root, "ul", Rect::new(210.0, 346.0, 160.0, 90.0))?;
    doc.add_class(submenu_panel, "submenu")?;

    let menu_widget = LoggingWidget::new("menu");
    let submenu_widget = LoggingWidget::new("submenu");

    let menu = Rc::new(DropdownController::new(
        &doc,
        &menu_widget,
        DropdownConfig::menu().with_exclude_selector(".submenu"),
    ));
    menu.set_elements(menu_panel, menu_button);

    let submenu = Rc::new(DropdownController::new(
        &doc,
        &submenu_widget,
        DropdownConfig::submenu(),
    ));
    submenu.set_elements(submenu_panel, share_item);

    let controllers = ControllerHost::new();
    controllers.add_controller(menu.clone());
    controllers.add_controller(submenu.clone());
    controllers.connect();

    tracing::info!("click the menu button");
    doc.click(menu_button);
    doc.flush_frames();

    tracing::info!("hover the share item");
    doc.pointer_move(Point::new(20.0, 350.0));
    doc.advance(100);
    doc.flush_frames();

    tracing::info!("click inside the submenu");
    doc.click(submenu_panel);
    tracing::info!(
        "menu open: {}, submenu open: {}",
        menu.is_open(),
        submenu.is_open()
    );

    tracing::info!("scroll the page");
    doc.scroll_to(Point::new(0.0, 40.0));
    doc.advance(16);

    tracing::info!("press escape");
    doc.key_down(Key::Escape);

    controllers.disconnect();
    tracing::info!(
        "listeners left: {}, renders: menu {} / submenu {}",
        doc.listener_count(),
        menu_widget.renders.borrow(),
        submenu_widget.renders.borrow()
    );
    Ok(())
}
