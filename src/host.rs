//! Capabilities the host environment provides to the pipeline.
//!
//! The pipeline never talks to the page directly. Viewport metrics,
//! coordinate resolution and target location are injected through the
//! narrow traits below so that hosts and tests can substitute their own.

use crate::collector::{RawEvent, TargetNode};
use serde::{Deserialize, Serialize};

/// Page, window and screen sizes, read once when a session is initialised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMetrics {
    pub url: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub document_width: u32,
    pub document_height: u32,
}

/// Source of viewport/document metrics.
pub trait MetricsProvider: Send {
    fn metrics(&self) -> PageMetrics;
}

/// Resolves the position of an event, in document coordinates.
pub trait CoordinateResolver: Send {
    /// `None` when the event has no meaningful position.
    fn resolve(&self, event: &RawEvent) -> Option<(f64, f64)>;
}

/// Maps an interacted element to a stable string identifier.
pub trait TargetLocator: Send {
    fn locate(&self, target: &[TargetNode]) -> String;
}

/// Metrics fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticMetrics(pub PageMetrics);

impl MetricsProvider for StaticMetrics {
    fn metrics(&self) -> PageMetrics {
        self.0.clone()
    }
}

/// Uses page coordinates when present, otherwise client coordinates
/// shifted by the document scroll offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageCoordinates {
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl CoordinateResolver for PageCoordinates {
    fn resolve(&self, event: &RawEvent) -> Option<(f64, f64)> {
        match (event.page_x, event.page_y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => match (event.client_x, event.client_y) {
                (Some(x), Some(y)) => Some((x + self.scroll_x, y + self.scroll_y)),
                _ => None,
            },
        }
    }
}

/// Builds an XPath-like structural path from the ancestor chain.
///
/// The nearest ancestor with an id anchors the path (`//*[@id='x']/...`);
/// otherwise the path starts at the root. Window targets map to `window`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralPathLocator;

/// Identifier used when an event has no element target.
pub const WINDOW_TARGET: &str = "window";

impl TargetLocator for StructuralPathLocator {
    fn locate(&self, target: &[TargetNode]) -> String {
        if target.is_empty() {
            return WINDOW_TARGET.to_string();
        }

        let anchor = target
            .iter()
            .rposition(|node| node.id.as_deref().is_some_and(|id| !id.is_empty()));

        let mut path = String::new();
        let steps = match anchor {
            Some(i) => {
                let id = target[i].id.as_deref().unwrap_or_default();
                path.push_str(&format!("//*[@id='{id}']"));
                &target[i + 1..]
            }
            None => target,
        };

        for node in steps {
            path.push('/');
            path.push_str(&node.tag.to_lowercase());
            if node.index > 1 {
                path.push_str(&format!("[{}]", node.index));
            }
        }
        path
    }
}

/// The bundle of host capabilities a pipeline is constructed with.
pub struct Host {
    pub metrics: Box<dyn MetricsProvider>,
    pub coordinates: Box<dyn CoordinateResolver>,
    pub locator: Box<dyn TargetLocator>,
}

impl Host {
    /// Default resolvers around the given metrics provider.
    pub fn new(metrics: impl MetricsProvider + 'static) -> Self {
        Self {
            metrics: Box::new(metrics),
            coordinates: Box::new(PageCoordinates::default()),
            locator: Box::new(StructuralPathLocator),
        }
    }

    pub fn with_coordinates(mut self, coordinates: impl CoordinateResolver + 'static) -> Self {
        self.coordinates = Box::new(coordinates);
        self
    }

    pub fn with_locator(mut self, locator: impl TargetLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(StaticMetrics::default())
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}

/// Clamp a resolved coordinate into the non-negative integer range.
pub(crate) fn clamp_coordinate(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_coordinates_prefer_page_position() {
        let resolver = PageCoordinates {
            scroll_x: 0.0,
            scroll_y: 200.0,
        };
        let event = RawEvent {
            page_x: Some(5.0),
            page_y: Some(6.0),
            client_x: Some(1.0),
            client_y: Some(1.0),
            ..RawEvent::default()
        };
        assert_eq!(resolver.resolve(&event), Some((5.0, 6.0)));

        let client_only = RawEvent {
            client_x: Some(10.0),
            client_y: Some(20.0),
            ..RawEvent::default()
        };
        assert_eq!(resolver.resolve(&client_only), Some((10.0, 220.0)));
        assert_eq!(resolver.resolve(&RawEvent::at(0)), None);
    }

    #[test]
    fn test_structural_path() {
        let locator = StructuralPathLocator;
        let chain = vec![
            TargetNode::new("html", 1),
            TargetNode::new("body", 1),
            TargetNode::new("DIV", 2),
            TargetNode::new("a", 1),
        ];
        assert_eq!(locator.locate(&chain), "/html/body/div[2]/a");
    }

    #[test]
    fn test_structural_path_anchors_on_nearest_id() {
        let locator = StructuralPathLocator;
        let chain = vec![
            TargetNode::new("html", 1),
            TargetNode::new("body", 1).with_id("page"),
            TargetNode::new("form", 1).with_id("signup"),
            TargetNode::new("input", 3),
        ];
        assert_eq!(locator.locate(&chain), "//*[@id='signup']/input[3]");
        assert_eq!(locator.locate(&[]), WINDOW_TARGET);
    }

    #[test]
    fn test_clamp_coordinate() {
        assert_eq!(clamp_coordinate(-4.0), 0);
        assert_eq!(clamp_coordinate(f64::NAN), 0);
        assert_eq!(clamp_coordinate(12.6), 13);
        assert_eq!(clamp_coordinate(0.0), 0);
    }
}
