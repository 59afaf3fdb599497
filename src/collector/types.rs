//! Raw interaction event types delivered by the host event source.
//!
//! These are the inputs to the pipeline before coordinate resolution,
//! target location and sampling have been applied.

use serde::{Deserialize, Serialize};

/// Subscription category an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Mouse,
    Touch,
    Key,
    Window,
}

impl EventCategory {
    /// All categories, in subscription order.
    pub const ALL: [EventCategory; 4] = [
        EventCategory::Mouse,
        EventCategory::Touch,
        EventCategory::Key,
        EventCategory::Window,
    ];

    /// Bit used for this category in subscription masks.
    pub(crate) fn bit(self) -> u8 {
        match self {
            EventCategory::Mouse => 0b0001,
            EventCategory::Touch => 0b0010,
            EventCategory::Key => 0b0100,
            EventCategory::Window => 0b1000,
        }
    }
}

/// Kind of interaction observed on the page.
///
/// The serialized name is the tag written into each log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    MouseDown,
    MouseUp,
    MouseMove,
    MouseOver,
    MouseOut,
    MouseWheel,
    Click,
    DblClick,
    ContextMenu,
    Scroll,
    KeyDown,
    KeyUp,
    KeyPress,
    TouchStart,
    TouchMove,
    TouchEnd,
    Load,
    Unload,
    BeforeUnload,
    Blur,
    Focus,
    Resize,
}

impl EventKind {
    /// Tag used in serialized rows.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::MouseDown => "mousedown",
            EventKind::MouseUp => "mouseup",
            EventKind::MouseMove => "mousemove",
            EventKind::MouseOver => "mouseover",
            EventKind::MouseOut => "mouseout",
            EventKind::MouseWheel => "mousewheel",
            EventKind::Click => "click",
            EventKind::DblClick => "dblclick",
            EventKind::ContextMenu => "contextmenu",
            EventKind::Scroll => "scroll",
            EventKind::KeyDown => "keydown",
            EventKind::KeyUp => "keyup",
            EventKind::KeyPress => "keypress",
            EventKind::TouchStart => "touchstart",
            EventKind::TouchMove => "touchmove",
            EventKind::TouchEnd => "touchend",
            EventKind::Load => "load",
            EventKind::Unload => "unload",
            EventKind::BeforeUnload => "beforeunload",
            EventKind::Blur => "blur",
            EventKind::Focus => "focus",
            EventKind::Resize => "resize",
        }
    }

    /// Category this kind is subscribed under.
    pub fn category(self) -> EventCategory {
        match self {
            EventKind::MouseDown
            | EventKind::MouseUp
            | EventKind::MouseMove
            | EventKind::MouseOver
            | EventKind::MouseOut
            | EventKind::MouseWheel
            | EventKind::Click
            | EventKind::DblClick
            | EventKind::ContextMenu
            | EventKind::Scroll => EventCategory::Mouse,
            EventKind::KeyDown | EventKind::KeyUp | EventKind::KeyPress => EventCategory::Key,
            EventKind::TouchStart | EventKind::TouchMove | EventKind::TouchEnd => {
                EventCategory::Touch
            }
            EventKind::Load
            | EventKind::Unload
            | EventKind::BeforeUnload
            | EventKind::Blur
            | EventKind::Focus
            | EventKind::Resize => EventCategory::Window,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step in the ancestor chain of an interacted element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetNode {
    /// Lowercase tag name
    pub tag: String,
    /// Element id, if any
    #[serde(default)]
    pub id: Option<String>,
    /// 1-based position among same-tag siblings
    #[serde(default = "default_index")]
    pub index: usize,
}

fn default_index() -> usize {
    1
}

impl TargetNode {
    pub fn new(tag: impl Into<String>, index: usize) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            index,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A single raw event as raised by the host.
///
/// Coordinates are optional: keyboard and window events usually carry none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    /// Monotonic capture time in milliseconds
    pub timestamp_ms: u64,
    /// Document-relative coordinates
    pub page_x: Option<f64>,
    pub page_y: Option<f64>,
    /// Viewport-relative coordinates
    pub client_x: Option<f64>,
    pub client_y: Option<f64>,
    /// Ancestor chain of the target element, root first. Empty for window targets.
    pub target: Vec<TargetNode>,
}

impl RawEvent {
    /// An event without coordinates or target.
    pub fn at(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Self::default()
        }
    }

    /// An event at a document position.
    pub fn at_position(timestamp_ms: u64, x: f64, y: f64) -> Self {
        Self {
            timestamp_ms,
            page_x: Some(x),
            page_y: Some(y),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: Vec<TargetNode>) -> Self {
        self.target = target;
        self
    }
}

/// One contact point of a touch event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TouchPoint {
    /// Host-assigned identifier, stable for the lifetime of the contact
    pub identifier: u32,
    pub page_x: Option<f64>,
    pub page_y: Option<f64>,
    pub client_x: Option<f64>,
    pub client_y: Option<f64>,
}

impl TouchPoint {
    pub fn new(identifier: u32, x: f64, y: f64) -> Self {
        Self {
            identifier,
            page_x: Some(x),
            page_y: Some(y),
            ..Self::default()
        }
    }
}

/// A touch event carrying any number of simultaneous contact points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTouchEvent {
    pub timestamp_ms: u64,
    pub touches: Vec<TouchPoint>,
    pub target: Vec<TargetNode>,
}

impl RawTouchEvent {
    /// Split one contact point into a standalone raw event.
    pub fn point_event(&self, point: &TouchPoint) -> RawEvent {
        RawEvent {
            timestamp_ms: self.timestamp_ms,
            page_x: point.page_x,
            page_y: point.page_y,
            client_x: point.client_x,
            client_y: point.client_y,
            target: self.target.clone(),
        }
    }
}

/// Unified message delivered by an event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceEvent {
    /// A pointer, key or window event
    Event { kind: EventKind, event: RawEvent },
    /// A touch event with one or more contact points
    Touch { kind: EventKind, event: RawTouchEvent },
    /// The page visit is ending
    Teardown,
}

impl SourceEvent {
    /// Category used for subscription filtering. Teardown has none.
    pub fn category(&self) -> Option<EventCategory> {
        match self {
            SourceEvent::Event { kind, .. } | SourceEvent::Touch { kind, .. } => {
                Some(kind.category())
            }
            SourceEvent::Teardown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_match_serde_names() {
        for kind in [
            EventKind::MouseMove,
            EventKind::DblClick,
            EventKind::BeforeUnload,
            EventKind::TouchStart,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_kind_categories() {
        assert_eq!(EventKind::Click.category(), EventCategory::Mouse);
        assert_eq!(EventKind::KeyPress.category(), EventCategory::Key);
        assert_eq!(EventKind::TouchEnd.category(), EventCategory::Touch);
        assert_eq!(EventKind::Resize.category(), EventCategory::Window);
    }

    #[test]
    fn test_source_event_json_shape() {
        let line = r#"{"type":"event","kind":"click","event":{"timestamp_ms":12,"page_x":3.0,"page_y":4.0}}"#;
        let parsed: SourceEvent = serde_json::from_str(line).unwrap();
        match parsed {
            SourceEvent::Event { kind, event } => {
                assert_eq!(kind, EventKind::Click);
                assert_eq!(event.timestamp_ms, 12);
                assert_eq!(event.page_x, Some(3.0));
                assert!(event.target.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let teardown: SourceEvent = serde_json::from_str(r#"{"type":"teardown"}"#).unwrap();
        assert_eq!(teardown, SourceEvent::Teardown);
        assert_eq!(teardown.category(), None);
    }

    #[test]
    fn test_touch_point_split_keeps_target() {
        let touch = RawTouchEvent {
            timestamp_ms: 40,
            touches: vec![TouchPoint::new(7, 1.0, 2.0)],
            target: vec![TargetNode::new("canvas", 1)],
        };
        let event = touch.point_event(&touch.touches[0]);
        assert_eq!(event.timestamp_ms, 40);
        assert_eq!(event.page_x, Some(1.0));
        assert_eq!(event.target.len(), 1);
    }
}
