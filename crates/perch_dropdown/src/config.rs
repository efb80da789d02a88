//! Dropdown configuration and presets
//!
//! Every option has a documented default. Partial updates arrive as a
//! [`ConfigPatch`] (usually deserialized from host attributes or JSON) and are
//! merged by shallow override. Unrecognized enum strings fall back to the
//! default value with a warning instead of failing.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geometry::{Position, PositionContext};

/// Delay before a hover-mode dropdown closes after the pointer leaves (ms)
pub const HOVER_CLOSE_DELAY_MS: u64 = 100;

/// Delay before a focus-mode dropdown closes after focus leaves the trigger (ms)
pub const FOCUS_CLOSE_DELAY_MS: u64 = 100;

/// Window scroll debounce while open (ms, roughly one frame)
pub const SCROLL_DEBOUNCE_MS: u64 = 16;

/// Window resize debounce while open (ms)
pub const RESIZE_DEBOUNCE_MS: u64 = 100;

/// Custom position post-processor
///
/// Receives the computed position and the measurements it was derived from,
/// and returns the position that is actually applied.
pub type PositionProcessor = Rc<dyn Fn(Position, &PositionContext) -> Position>;

/// Implements string conversion plus lossy serde for a config enum
macro_rules! config_enum {
    ($name:ident, $what:literal, { $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            /// Canonical lowercase name
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Parse a name, accepting aliases; `None` if unrecognized
            pub fn from_name(name: &str) -> Option<Self> {
                let name = name.trim().to_ascii_lowercase();
                match name.as_str() {
                    $($text $(| $alias)* => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Parse a name, falling back to the default for unknown values
            pub fn parse_lossy(name: &str) -> Self {
                Self::from_name(name).unwrap_or_else(|| {
                    let fallback = Self::default();
                    tracing::warn!(
                        "unknown {} `{}`, using `{}`",
                        $what,
                        name,
                        fallback.as_str()
                    );
                    fallback
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                Ok(Self::parse_lossy(&name))
            }
        }
    };
}

/// What opens and closes the dropdown automatically
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TriggerMode {
    #[default]
    Click,
    Hover,
    Focus,
    /// No automatic bindings; the host calls `open`/`close` itself
    Manual,
}

config_enum!(TriggerMode, "trigger mode", {
    Click => "click",
    Hover => "hover",
    Focus => "focus",
    Manual => "manual",
});

/// Side of the trigger the panel appears on
///
/// `left`/`right` are not supported and fall back to `bottom`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Placement {
    Top,
    #[default]
    Bottom,
}

config_enum!(Placement, "placement", {
    Top => "top",
    Bottom => "bottom",
});

impl Placement {
    pub fn opposite(self) -> Self {
        match self {
            Placement::Top => Placement::Bottom,
            Placement::Bottom => Placement::Top,
        }
    }
}

/// Horizontal alignment of the panel against the trigger
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Alignment {
    #[default]
    Start,
    Center,
    End,
}

config_enum!(Alignment, "alignment", {
    Start => "start" | "left",
    Center => "center",
    End => "end" | "right",
});

/// Coordinate space the panel is positioned in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PositioningMode {
    /// Viewport-relative (`position: fixed`)
    #[default]
    Fixed,
    /// Relative to the nearest positioned ancestor (`position: absolute`)
    Absolute,
}

config_enum!(PositioningMode, "positioning mode", {
    Fixed => "fixed",
    Absolute => "absolute",
});

impl PositioningMode {
    /// CSS `position` value
    pub fn css_value(self) -> &'static str {
        self.as_str()
    }
}

/// Reaction to window scrolling while open
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScrollBehavior {
    /// Ignore scrolling
    None,
    /// Close once the trigger has scrolled out of the viewport
    Close,
    /// Recompute the position on every debounced scroll tick
    #[default]
    Reposition,
}

config_enum!(ScrollBehavior, "scroll behavior", {
    None => "none",
    Close => "close",
    Reposition => "reposition",
});

/// Configuration for one dropdown controller
#[derive(Clone)]
pub struct DropdownConfig {
    pub trigger: TriggerMode,
    /// Preferred placement; may flip when constrained to the viewport
    pub placement: Placement,
    pub alignment: Alignment,
    /// Gap between trigger and panel in pixels
    pub offset: f32,
    pub positioning: PositioningMode,
    /// Flip and shift the panel so it stays inside the viewport
    pub constrain_to_viewport: bool,
    /// Hover intent delay before opening (ms)
    pub hover_delay_ms: u64,
    pub close_on_outside_click: bool,
    pub close_on_escape: bool,
    pub scroll_behavior: ScrollBehavior,
    pub z_index: i32,
    pub min_width: Option<f32>,
    pub max_width: Option<f32>,
    /// Ceiling for the computed max-height
    pub max_height: Option<f32>,
    /// Clicks inside elements matching any of these selectors are not "outside"
    pub exclude_selectors: Vec<String>,
    /// Force the panel at least as wide as the trigger (absolute mode)
    pub match_trigger_width: bool,
    pub disabled: bool,
    pub position_processor: Option<PositionProcessor>,
}

impl Default for DropdownConfig {
    fn default() -> Self {
        Self::menu()
    }
}

impl DropdownConfig {
    /// Click-triggered menu below the trigger
    pub fn menu() -> Self {
        Self {
            trigger: TriggerMode::Click,
            placement: Placement::Bottom,
            alignment: Alignment::Start,
            offset: 4.0,
            positioning: PositioningMode::Fixed,
            constrain_to_viewport: true,
            hover_delay_ms: 150,
            close_on_outside_click: true,
            close_on_escape: true,
            scroll_behavior: ScrollBehavior::Reposition,
            z_index: 1000,
            min_width: None,
            max_width: None,
            max_height: None,
            exclude_selectors: Vec::new(),
            match_trigger_width: false,
            disabled: false,
            position_processor: None,
        }
    }

    /// Select list: absolute, at least as wide as its trigger, scrolls past 300px
    pub fn select() -> Self {
        Self {
            positioning: PositioningMode::Absolute,
            match_trigger_width: true,
            max_height: Some(300.0),
            ..Self::menu()
        }
    }

    /// Cascading submenu opened by hovering its parent item
    pub fn submenu() -> Self {
        Self {
            trigger: TriggerMode::Hover,
            offset: 0.0,
            hover_delay_ms: 100,
            z_index: 1010,
            ..Self::menu()
        }
    }

    /// Hover tooltip centered above its trigger
    pub fn tooltip() -> Self {
        Self {
            trigger: TriggerMode::Hover,
            placement: Placement::Top,
            alignment: Alignment::Center,
            offset: 8.0,
            hover_delay_ms: 300,
            close_on_outside_click: false,
            scroll_behavior: ScrollBehavior::Close,
            z_index: 1100,
            ..Self::menu()
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerMode) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_positioning(mut self, positioning: PositioningMode) -> Self {
        self.positioning = positioning;
        self
    }

    pub fn with_scroll_behavior(mut self, behavior: ScrollBehavior) -> Self {
        self.scroll_behavior = behavior;
        self
    }

    /// Add a selector whose matches never count as an outside click
    pub fn with_exclude_selector(mut self, selector: impl Into<String>) -> Self {
        self.exclude_selectors.push(selector.into());
        self
    }

    pub fn with_position_processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(Position, &PositionContext) -> Position + 'static,
    {
        self.position_processor = Some(Rc::new(processor));
        self
    }

    /// Shallow-merge a patch into this configuration
    pub fn apply(&mut self, patch: &ConfigPatch) {
        macro_rules! merge {
            ($config:ident, $patch:ident; $($field:ident),+ $(,)?) => {
                $(if let Some(value) = &$patch.$field {
                    $config.$field = value.clone();
                })+
            };
        }
        let config = self;
        merge!(
            config, patch;
            trigger,
            placement,
            alignment,
            offset,
            positioning,
            constrain_to_viewport,
            hover_delay_ms,
            close_on_outside_click,
            close_on_escape,
            scroll_behavior,
            z_index,
            exclude_selectors,
            match_trigger_width,
            disabled,
        );
        if patch.min_width.is_some() {
            config.min_width = patch.min_width;
        }
        if patch.max_width.is_some() {
            config.max_width = patch.max_width;
        }
        if patch.max_height.is_some() {
            config.max_height = patch.max_height;
        }
    }

    /// Return a copy with a patch applied
    pub fn merged(&self, patch: &ConfigPatch) -> Self {
        let mut config = self.clone();
        config.apply(patch);
        config
    }
}

impl fmt::Debug for DropdownConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropdownConfig")
            .field("trigger", &self.trigger)
            .field("placement", &self.placement)
            .field("alignment", &self.alignment)
            .field("offset", &self.offset)
            .field("positioning", &self.positioning)
            .field("constrain_to_viewport", &self.constrain_to_viewport)
            .field("hover_delay_ms", &self.hover_delay_ms)
            .field("close_on_outside_click", &self.close_on_outside_click)
            .field("close_on_escape", &self.close_on_escape)
            .field("scroll_behavior", &self.scroll_behavior)
            .field("z_index", &self.z_index)
            .field("min_width", &self.min_width)
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("exclude_selectors", &self.exclude_selectors)
            .field("match_trigger_width", &self.match_trigger_width)
            .field("disabled", &self.disabled)
            .field("position_processor", &self.position_processor.is_some())
            .finish()
    }
}

/// Partial configuration; `None` fields leave the current value untouched
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    #[serde(alias = "triggerMode")]
    pub trigger: Option<TriggerMode>,
    pub placement: Option<Placement>,
    pub alignment: Option<Alignment>,
    pub offset: Option<f32>,
    #[serde(alias = "strategy")]
    pub positioning: Option<PositioningMode>,
    #[serde(alias = "constrainToViewport")]
    pub constrain_to_viewport: Option<bool>,
    #[serde(alias = "hoverDelay")]
    pub hover_delay_ms: Option<u64>,
    #[serde(alias = "closeOnOutsideClick")]
    pub close_on_outside_click: Option<bool>,
    #[serde(alias = "closeOnEscape")]
    pub close_on_escape: Option<bool>,
    #[serde(alias = "scrollBehavior")]
    pub scroll_behavior: Option<ScrollBehavior>,
    #[serde(alias = "zIndex")]
    pub z_index: Option<i32>,
    #[serde(alias = "minWidth")]
    pub min_width: Option<f32>,
    #[serde(alias = "maxWidth")]
    pub max_width: Option<f32>,
    #[serde(alias = "maxHeight")]
    pub max_height: Option<f32>,
    #[serde(alias = "excludeSelectors")]
    pub exclude_selectors: Option<Vec<String>>,
    #[serde(alias = "matchTriggerWidth")]
    pub match_trigger_width: Option<bool>,
    pub disabled: Option<bool>,
}

impl ConfigPatch {
    /// Parse a patch from JSON text
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
