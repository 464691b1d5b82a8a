//! Stroke model: the atomic unit of the drawing log.

use kurbo::Point;
use peniko::Color;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Style applied to a stroke when it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeStyle {
    /// Color token, usually `#rrggbb`.
    pub color: String,
    /// Line width in surface pixels.
    pub width: f64,
    /// Whether the stroke erases instead of painting.
    pub is_eraser: bool,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            width: 5.0,
            is_eraser: false,
        }
    }
}

/// One line segment with its style.
///
/// Strokes have no identity; two strokes are the same stroke when every
/// field matches. The serialized field names match the drawing log documents
/// (`start`, `end`, `color`, `width`, `isEraser`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub start: Point,
    pub end: Point,
    pub color: String,
    pub width: f64,
    pub is_eraser: bool,
}

impl Stroke {
    /// Build a stroke between two surface points.
    ///
    /// Only `width > 0` is checked here. Clamping to a usable range is the
    /// caller's job (see `ToolConfig::set_width`).
    pub fn new(start: Point, end: Point, style: &StrokeStyle) -> Result<Self, ClientError> {
        if !(style.width > 0.0) || !style.width.is_finite() {
            return Err(ClientError::InvalidWidth(style.width));
        }
        Ok(Self {
            start,
            end,
            color: style.color.clone(),
            width: style.width,
            is_eraser: style.is_eraser,
        })
    }

    /// Whether start and end are the same point (a tap without movement).
    pub fn is_dot(&self) -> bool {
        (self.start.x - self.end.x).abs() < f64::EPSILON
            && (self.start.y - self.end.y).abs() < f64::EPSILON
    }

    /// Width actually painted. Erasers are doubled so they do not look thinner
    /// than the ink they remove.
    pub fn effective_width(&self) -> f64 {
        if self.is_eraser {
            self.width * 2.0
        } else {
            self.width
        }
    }

    /// Parsed stroke color.
    pub fn color(&self) -> Color {
        parse_color(&self.color)
    }
}

/// Parse a color token (`#rgb`, `#rrggbb`, `#rrggbbaa` or `transparent`).
///
/// Unknown tokens fall back to opaque black.
pub fn parse_color(token: &str) -> Color {
    let token = token.trim();
    if token.eq_ignore_ascii_case("transparent") {
        return Color::from_rgba8(0, 0, 0, 0);
    }

    if let Some(hex) = token.strip_prefix('#').filter(|hex| hex.is_ascii()) {
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        match hex.len() {
            3 => {
                // #rgb -> #rrggbb
                let short = |i: usize| channel(i..i + 1).map(|v| v * 17);
                if let (Some(r), Some(g), Some(b)) = (short(0), short(1), short(2)) {
                    return Color::from_rgba8(r, g, b, 255);
                }
            }
            6 => {
                if let (Some(r), Some(g), Some(b)) = (channel(0..2), channel(2..4), channel(4..6)) {
                    return Color::from_rgba8(r, g, b, 255);
                }
            }
            8 => {
                if let (Some(r), Some(g), Some(b), Some(a)) =
                    (channel(0..2), channel(2..4), channel(4..6), channel(6..8))
                {
                    return Color::from_rgba8(r, g, b, a);
                }
            }
            _ => {}
        }
    }

    log::debug!("Unrecognized color token {:?}, using black", token);
    Color::from_rgba8(0, 0, 0, 255)
}
