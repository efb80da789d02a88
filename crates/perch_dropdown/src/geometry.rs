//! Panel positioning
//!
//! [`compute_position`] is the pure core: given the trigger's client rect, the
//! panel's measured size and the viewport, it resolves placement (with a single
//! greedy vertical flip), alignment, viewport clamping and the max-height bound.
//! The `calculate_*` functions measure a live [`Document`] and feed it.
//!
//! Flip rule: when constrained and the preferred side cannot fit
//! `panel height + offset`, the opposite side is used if it has strictly more
//! room. The offset counts toward the panel's size, so a side with room for the
//! panel but not for the gap still flips. Otherwise the preferred side is kept and the max-height clamp turns the
//! overflow into a scrollable panel.

use perch_core::{Document, Edges, NodeId, Rect, Size};

use crate::config::{Alignment, DropdownConfig, Placement, PositionProcessor, PositioningMode};
use crate::error::Result;

/// Resolved panel position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    /// Top edge in the coordinate space of `mode`
    pub top: f32,
    /// Left edge in the coordinate space of `mode`
    pub left: f32,
    /// Effective panel width after width constraints
    pub width: f32,
    /// Height bound so the panel never extends past the viewport
    pub max_height: f32,
    pub placement: Placement,
    pub alignment: Alignment,
    pub mode: PositioningMode,
}

/// Inputs to the positioning algorithm
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionOptions {
    pub placement: Placement,
    pub alignment: Alignment,
    pub offset: f32,
    pub mode: PositioningMode,
    pub constrain_to_viewport: bool,
    pub match_trigger_width: bool,
    pub min_width: Option<f32>,
    pub max_width: Option<f32>,
    pub max_height: Option<f32>,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self::from(&DropdownConfig::default())
    }
}

impl From<&DropdownConfig> for PositionOptions {
    fn from(config: &DropdownConfig) -> Self {
        Self {
            placement: config.placement,
            alignment: config.alignment,
            offset: config.offset,
            mode: config.positioning,
            constrain_to_viewport: config.constrain_to_viewport,
            match_trigger_width: config.match_trigger_width,
            min_width: config.min_width,
            max_width: config.max_width,
            max_height: config.max_height,
        }
    }
}

/// Measurements a position was computed from, handed to post-processors
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionContext {
    /// Trigger rect in client coordinates
    pub trigger: Rect,
    /// Measured panel size (may be empty before the first paint)
    pub panel: Size,
    pub viewport: Size,
    /// Space around the trigger
    pub available: Edges,
}

/// Compute a viewport-relative position without touching a document
pub fn compute_position(
    trigger: Rect,
    panel: Size,
    viewport: Size,
    options: &PositionOptions,
) -> Position {
    let space = Edges::between(trigger, viewport);
    let placement = resolve_placement(options, panel.height, &space);

    let mut width = panel.width;
    if options.match_trigger_width && options.mode == PositioningMode::Absolute {
        width = width.max(trigger.width());
    }
    if let Some(min) = options.min_width {
        width = width.max(min);
    }
    if let Some(max) = options.max_width {
        width = width.min(max);
    }

    let mut left = match options.alignment {
        Alignment::Start => trigger.left(),
        Alignment::End => trigger.right() - width,
        Alignment::Center => trigger.left() + (trigger.width() - width) / 2.0,
    };
    if options.constrain_to_viewport {
        // Shift, never shrink; a panel wider than the viewport pins to the left edge
        left = left.min(viewport.width - width).max(0.0);
    }

    let max_height = max_height_for(&space, placement, options.offset, options.max_height);
    let rendered_height = panel.height.min(max_height);
    let top = match placement {
        Placement::Bottom => trigger.bottom() + options.offset,
        Placement::Top => {
            let top = trigger.top() - rendered_height - options.offset;
            if options.constrain_to_viewport {
                top.max(0.0)
            } else {
                top
            }
        }
    };

    Position {
        top,
        left,
        width,
        max_height,
        placement,
        alignment: options.alignment,
        mode: options.mode,
    }
}

fn resolve_placement(options: &PositionOptions, panel_height: f32, space: &Edges) -> Placement {
    let preferred = options.placement;
    if !options.constrain_to_viewport {
        return preferred;
    }

    let needed = panel_height + options.offset;
    let (room, opposite_room) = match preferred {
        Placement::Bottom => (space.below, space.above),
        Placement::Top => (space.above, space.below),
    };
    if room < needed && opposite_room > room {
        tracing::debug!(
            "flipping placement {} -> {} (needs {}, has {}, opposite {})",
            preferred,
            preferred.opposite(),
            needed,
            room,
            opposite_room
        );
        return preferred.opposite();
    }
    preferred
}

fn max_height_for(space: &Edges, placement: Placement, offset: f32, ceiling: Option<f32>) -> f32 {
    let room = match placement {
        Placement::Bottom => space.below,
        Placement::Top => space.above,
    };
    let bound = (room - offset).max(0.0);
    ceiling.map_or(bound, |ceiling| bound.min(ceiling.max(0.0)))
}

/// Space between the trigger's edges and the viewport's edges
pub fn calculate_available_space(doc: &Document, trigger: NodeId) -> Result<Edges> {
    let rect = doc.bounding_client_rect(trigger)?;
    Ok(Edges::between(rect, doc.viewport_size()))
}

/// Max-height for a panel on the given side of the trigger
pub fn calculate_max_height(
    doc: &Document,
    trigger: NodeId,
    placement: Placement,
    offset: f32,
    ceiling: Option<f32>,
) -> Result<f32> {
    let space = calculate_available_space(doc, trigger)?;
    Ok(max_height_for(&space, placement, offset, ceiling))
}

/// Measure trigger and panel in a document and resolve the panel position
///
/// In absolute mode the result is translated into the panel's offset parent
/// (or page coordinates when it has none). The processor, when given, sees the
/// final coordinates and may replace them.
pub fn calculate_complete_position(
    doc: &Document,
    trigger: NodeId,
    panel: NodeId,
    options: &PositionOptions,
    processor: Option<&PositionProcessor>,
) -> Result<Position> {
    let trigger_rect = doc.bounding_client_rect(trigger)?;
    let panel_size = doc.bounding_client_rect(panel)?.size();
    let viewport = doc.viewport_size();

    let mut position = compute_position(trigger_rect, panel_size, viewport, options);
    if options.mode == PositioningMode::Absolute {
        match doc.offset_parent(panel) {
            Some(parent) => {
                let origin = doc.bounding_client_rect(parent)?.origin;
                position.top -= origin.y;
                position.left -= origin.x;
            }
            None => {
                let scroll = doc.scroll_offset();
                position.top += scroll.y;
                position.left += scroll.x;
            }
        }
    }

    Ok(match processor {
        Some(processor) => {
            let context = PositionContext {
                trigger: trigger_rect,
                panel: panel_size,
                viewport,
                available: Edges::between(trigger_rect, viewport),
            };
            processor(position, &context)
        }
        None => position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use perch_core::Point;
    use std::rc::Rc;

    const VIEWPORT: Size = Size::new(800.0, 600.0);

    #[test]
    fn test_flips_above_when_below_is_too_small() {
        let trigger = Rect::new(10.0, 500.0, 100.0, 30.0);
        let position = compute_position(
            trigger,
            Size::new(200.0, 150.0),
            VIEWPORT,
            &PositionOptions::default(),
        );
        assert_eq!(position.placement, Placement::Top);
        assert_eq!(position.top, 346.0);
        assert_eq!(position.left, 10.0);
        assert_eq!(position.width, 200.0);
    }

    #[test]
    fn test_flip_near_viewport_bottom() {
        let trigger = Rect::new(100.0, 560.0, 80.0, 30.0);
        let position = compute_position(
            trigger,
            Size::new(120.0, 200.0),
            VIEWPORT,
            &PositionOptions::default(),
        );
        assert_eq!(position.placement, Placement::Top);
    }

    #[test]
    fn test_keeps_preferred_side_when_it_fits() {
        let trigger = Rect::new(10.0, 100.0, 100.0, 30.0);
        let position = compute_position(
            trigger,
            Size::new(200.0, 150.0),
            VIEWPORT,
            &PositionOptions::default(),
        );
        assert_eq!(position.placement, Placement::Bottom);
        assert_eq!(position.top, 134.0);
        assert_eq!(position.max_height, 466.0);
    }

    #[test]
    fn test_no_flip_when_unconstrained() {
        let options = PositionOptions {
            constrain_to_viewport: false,
            ..PositionOptions::default()
        };
        let position = compute_position(
            Rect::new(700.0, 500.0, 100.0, 30.0),
            Size::new(200.0, 150.0),
            VIEWPORT,
            &options,
        );
        assert_eq!(position.placement, Placement::Bottom);
        assert_eq!(position.left, 700.0);
    }

    #[test]
    fn test_both_sides_short_prefers_larger_and_clamps_height() {
        let viewport = Size::new(800.0, 300.0);
        let trigger = Rect::new(10.0, 100.0, 100.0, 30.0);
        let position = compute_position(
            trigger,
            Size::new(200.0, 400.0),
            viewport,
            &PositionOptions::default(),
        );
        // below = 170, above = 100
        assert_eq!(position.placement, Placement::Bottom);
        assert_eq!(position.max_height, 166.0);
    }

    #[test]
    fn test_offset_counts_toward_flip() {
        // below = 152: room for the panel, not for the 4px gap
        let position = compute_position(
            Rect::new(10.0, 418.0, 100.0, 30.0),
            Size::new(200.0, 150.0),
            VIEWPORT,
            &PositionOptions::default(),
        );
        assert_eq!(position.placement, Placement::Top);
        assert_eq!(position.top, 264.0);
    }

    fn top_options() -> PositionOptions {
        PositionOptions {
            placement: Placement::Top,
            ..PositionOptions::default()
        }
    }

    #[test]
    fn test_top_preference_fits() {
        let position = compute_position(
            Rect::new(10.0, 300.0, 100.0, 30.0),
            Size::new(200.0, 150.0),
            VIEWPORT,
            &top_options(),
        );
        assert_eq!(position.placement, Placement::Top);
        assert_eq!(position.top, 146.0);
        assert_eq!(position.max_height, 296.0);
    }

    #[test]
    fn test_top_preference_flips_below() {
        let position = compute_position(
            Rect::new(10.0, 20.0, 100.0, 30.0),
            Size::new(200.0, 150.0),
            VIEWPORT,
            &top_options(),
        );
        assert_eq!(position.placement, Placement::Bottom);
        assert_eq!(position.top, 54.0);
        assert_eq!(position.max_height, 546.0);
    }

    #[test]
    fn test_top_preference_kept_when_both_sides_short() {
        // above = 170, below = 100
        let position = compute_position(
            Rect::new(10.0, 170.0, 100.0, 30.0),
            Size::new(200.0, 400.0),
            Size::new(800.0, 300.0),
            &top_options(),
        );
        assert_eq!(position.placement, Placement::Top);
        assert_eq!(position.max_height, 166.0);
        assert_eq!(position.top, 0.0);
    }

    #[test]
    fn test_top_clamped_to_viewport_when_no_room_for_offset() {
        // above = 2, below = 2; the gap alone would push the panel off screen
        let position = compute_position(
            Rect::new(10.0, 2.0, 100.0, 36.0),
            Size::new(200.0, 150.0),
            Size::new(800.0, 40.0),
            &top_options(),
        );
        assert_eq!(position.placement, Placement::Top);
        assert_eq!(position.max_height, 0.0);
        assert_eq!(position.top, 0.0);

        let unconstrained = compute_position(
            Rect::new(10.0, 2.0, 100.0, 36.0),
            Size::new(200.0, 150.0),
            Size::new(800.0, 40.0),
            &PositionOptions {
                constrain_to_viewport: false,
                ..top_options()
            },
        );
        assert_eq!(unconstrained.top, -2.0);
    }

    #[test]
    fn test_clamps_to_right_edge() {
        let trigger = Rect::new(700.0, 100.0, 80.0, 30.0);
        let position = compute_position(
            trigger,
            Size::new(200.0, 100.0),
            VIEWPORT,
            &PositionOptions::default(),
        );
        assert!(position.left + position.width <= VIEWPORT.width);
        assert_eq!(position.left, 600.0);
    }

    #[test]
    fn test_alignment_end_and_center() {
        let trigger = Rect::new(300.0, 100.0, 100.0, 30.0);
        let panel = Size::new(200.0, 100.0);

        let end = PositionOptions {
            alignment: Alignment::End,
            ..PositionOptions::default()
        };
        assert_eq!(compute_position(trigger, panel, VIEWPORT, &end).left, 200.0);

        let center = PositionOptions {
            alignment: Alignment::Center,
            ..PositionOptions::default()
        };
        assert_eq!(
            compute_position(trigger, panel, VIEWPORT, &center).left,
            250.0
        );

        let end_at_left_edge = compute_position(Rect::new(0.0, 100.0, 50.0, 30.0), panel, VIEWPORT, &end);
        assert_eq!(end_at_left_edge.left, 0.0);
    }

    #[test]
    fn test_zero_size_panel_uses_trigger_geometry() {
        let trigger = Rect::new(10.0, 590.0, 100.0, 10.0);
        let position = compute_position(trigger, Size::ZERO, VIEWPORT, &PositionOptions::default());
        // Nothing to fit yet, but the offset alone does not fit below
        assert_eq!(position.placement, Placement::Top);
        assert_eq!(position.top, 586.0);
        assert_eq!(position.left, 10.0);
    }

    #[test]
    fn test_width_constraints() {
        let trigger = Rect::new(10.0, 100.0, 300.0, 30.0);
        let options = PositionOptions {
            mode: PositioningMode::Absolute,
            match_trigger_width: true,
            max_width: Some(250.0),
            ..PositionOptions::default()
        };
        let position = compute_position(trigger, Size::new(120.0, 50.0), VIEWPORT, &options);
        assert_eq!(position.width, 250.0);

        let fixed = PositionOptions {
            match_trigger_width: true,
            min_width: Some(150.0),
            ..PositionOptions::default()
        };
        let position = compute_position(trigger, Size::new(120.0, 50.0), VIEWPORT, &fixed);
        assert_eq!(position.width, 150.0);
    }

    #[test]
    fn test_max_height_ceiling() {
        let options = PositionOptions {
            max_height: Some(200.0),
            ..PositionOptions::default()
        };
        let position = compute_position(
            Rect::new(10.0, 10.0, 100.0, 30.0),
            Size::new(100.0, 400.0),
            VIEWPORT,
            &options,
        );
        assert_eq!(position.max_height, 200.0);
    }

    fn document_with(trigger_rect: Rect, panel_rect: Rect) -> (Document, NodeId, NodeId) {
        let doc = Document::new(VIEWPORT);
        let trigger = doc.create_element("button");
        let panel = doc.create_element("div");
        doc.append_child(doc.root(), trigger).unwrap();
        doc.append_child(doc.root(), panel).unwrap();
        doc.set_layout(trigger, trigger_rect).unwrap();
        doc.set_layout(panel, panel_rect).unwrap();
        (doc, trigger, panel)
    }

    #[test]
    fn test_available_space_follows_scroll() {
        let (doc, trigger, _) = document_with(
            Rect::new(10.0, 500.0, 100.0, 30.0),
            Rect::new(0.0, 0.0, 200.0, 150.0),
        );
        assert_eq!(calculate_available_space(&doc, trigger).unwrap().below, 70.0);

        doc.scroll_to(Point::new(0.0, 200.0));
        let space = calculate_available_space(&doc, trigger).unwrap();
        assert_eq!(space.above, 300.0);
        assert_eq!(space.below, 270.0);
        assert_eq!(
            calculate_max_height(&doc, trigger, Placement::Bottom, 4.0, None).unwrap(),
            266.0
        );
    }

    #[test]
    fn test_absolute_mode_is_relative_to_offset_parent() {
        let (doc, trigger, panel) = document_with(
            Rect::new(110.0, 150.0, 100.0, 30.0),
            Rect::new(0.0, 0.0, 200.0, 150.0),
        );
        let container = doc.create_element("section");
        doc.append_child(doc.root(), container).unwrap();
        doc.append_child(container, panel).unwrap();
        doc.set_layout(container, Rect::new(100.0, 100.0, 400.0, 400.0))
            .unwrap();
        doc.set_positioned(container, true).unwrap();

        let options = PositionOptions {
            mode: PositioningMode::Absolute,
            ..PositionOptions::default()
        };
        let position = calculate_complete_position(&doc, trigger, panel, &options, None).unwrap();
        assert_eq!(position.top, 84.0);
        assert_eq!(position.left, 10.0);

        // Without a positioned ancestor, coordinates are page-relative
        doc.set_positioned(container, false).unwrap();
        doc.scroll_to(Point::new(0.0, 50.0));
        let position = calculate_complete_position(&doc, trigger, panel, &options, None).unwrap();
        assert_eq!(position.top, 184.0);
    }

    #[test]
    fn test_processor_replaces_position() {
        let (doc, trigger, panel) = document_with(
            Rect::new(10.0, 100.0, 100.0, 30.0),
            Rect::new(0.0, 0.0, 200.0, 150.0),
        );
        let processor: PositionProcessor = Rc::new(|mut position: Position, context: &PositionContext| {
            position.left = context.viewport.width - position.width;
            position
        });
        let position = calculate_complete_position(
            &doc,
            trigger,
            panel,
            &PositionOptions::default(),
            Some(&processor),
        )
        .unwrap();
        assert_eq!(position.left, 600.0);
    }

    #[test]
    fn test_detached_trigger_is_an_error() {
        let (doc, trigger, panel) = document_with(
            Rect::new(10.0, 100.0, 100.0, 30.0),
            Rect::new(0.0, 0.0, 200.0, 150.0),
        );
        doc.remove(trigger).unwrap();
        assert!(calculate_complete_position(
            &doc,
            trigger,
            panel,
            &PositionOptions::default(),
            None
        )
        .is_err());
    }
}
