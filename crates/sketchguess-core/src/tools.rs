//! Drawing tool configuration and pointer capture.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::stroke::StrokeStyle;

/// Smallest selectable brush width.
pub const MIN_WIDTH: f64 = 1.0;
/// Largest selectable brush width.
pub const MAX_WIDTH: f64 = 50.0;

/// The brush the local drawer is holding.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    style: StrokeStyle,
}

impl ToolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.style.color = color.into();
    }

    /// Set the brush width, clamped to `[MIN_WIDTH, MAX_WIDTH]`.
    pub fn set_width(&mut self, width: f64) {
        self.style.width = if width.is_finite() {
            width.clamp(MIN_WIDTH, MAX_WIDTH)
        } else {
            MIN_WIDTH
        };
    }

    pub fn set_eraser(&mut self, is_eraser: bool) {
        self.style.is_eraser = is_eraser;
    }
}

/// Pointer input in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down { position: Point },
    Move { position: Point },
    Up,
    /// Pointer left the surface; ends the drag like `Up`.
    Leave,
}

/// Tracks an in-progress drag.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerTracker {
    last_position: Option<Point>,
}

impl PointerTracker {
    pub fn is_drawing(&self) -> bool {
        self.last_position.is_some()
    }

    pub fn begin(&mut self, position: Point) {
        self.last_position = Some(position);
    }

    /// Advance the drag. Returns the segment to draw, if a drag is active.
    pub fn advance(&mut self, position: Point) -> Option<(Point, Point)> {
        let start = self.last_position?;
        self.last_position = Some(position);
        Some((start, position))
    }

    /// End the drag. Returns whether a drag was active.
    pub fn end(&mut self) -> bool {
        self.last_position.take().is_some()
    }
}
