//! Inline styles and classes written onto the panel
//!
//! While open the panel carries `position`, `top`, `left`, `z-index`,
//! `max-height`, `overflow-y: auto`, optional `min-width`/`max-width`, and one
//! `placement-*` plus one `alignment-*` class. Closing removes all of them.

use perch_core::{Document, NodeId};

use crate::config::{Alignment, Placement};
use crate::error::Result;
use crate::geometry::Position;

/// Inline properties owned by the controller
pub const POSITION_PROPERTIES: &[&str] = &[
    "position",
    "top",
    "left",
    "z-index",
    "max-height",
    "overflow-y",
    "min-width",
    "max-width",
];

/// Classes owned by the controller
pub const POSITION_CLASSES: &[&str] = &[
    "placement-top",
    "placement-bottom",
    "alignment-left",
    "alignment-center",
    "alignment-right",
];

/// Width bounds applied alongside a position
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PanelStyle {
    pub z_index: i32,
    pub min_width: Option<f32>,
    pub max_width: Option<f32>,
}

pub fn placement_class(placement: Placement) -> &'static str {
    match placement {
        Placement::Top => "placement-top",
        Placement::Bottom => "placement-bottom",
    }
}

pub fn alignment_class(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Start => "alignment-left",
        Alignment::Center => "alignment-center",
        Alignment::End => "alignment-right",
    }
}

fn px(value: f32) -> String {
    format!("{}px", value)
}

/// Write a resolved position onto the panel
pub fn apply_position(
    doc: &Document,
    panel: NodeId,
    position: &Position,
    style: &PanelStyle,
) -> Result<()> {
    doc.set_style(panel, "position", position.mode.css_value())?;
    doc.set_style(panel, "top", &px(position.top))?;
    doc.set_style(panel, "left", &px(position.left))?;
    doc.set_style(panel, "z-index", &style.z_index.to_string())?;
    doc.set_style(panel, "max-height", &px(position.max_height))?;
    doc.set_style(panel, "overflow-y", "auto")?;

    match style.min_width {
        Some(width) => doc.set_style(panel, "min-width", &px(width))?,
        None => {
            doc.remove_style(panel, "min-width")?;
        }
    }
    match style.max_width {
        Some(width) => doc.set_style(panel, "max-width", &px(width))?,
        None => {
            doc.remove_style(panel, "max-width")?;
        }
    }

    for class in POSITION_CLASSES {
        doc.remove_class(panel, class)?;
    }
    doc.add_class(panel, placement_class(position.placement))?;
    doc.add_class(panel, alignment_class(position.alignment))?;
    Ok(())
}

/// Return the panel to passive layout
pub fn reset_position(doc: &Document, panel: NodeId) -> Result<()> {
    for property in POSITION_PROPERTIES {
        doc.remove_style(panel, property)?;
    }
    for class in POSITION_CLASSES {
        doc.remove_class(panel, class)?;
    }
    Ok(())
}
