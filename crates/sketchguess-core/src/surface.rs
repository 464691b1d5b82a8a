//! Drawing surfaces.
//!
//! A [`Surface`] paints strokes, wipes itself, and round-trips its full
//! visible content through an opaque [`Snapshot`]. Two implementations are
//! provided: a [`RasterSurface`] backed by a tiny-skia pixmap, and a
//! [`RecordingSurface`] that keeps the visible stroke list, used for
//! deterministic replay checks and headless logic.

use thiserror::Error;
use tiny_skia::{
    BlendMode, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Transform,
};

use crate::stroke::Stroke;

/// Surface errors.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Snapshot encoding failed: {0}")]
    Encode(String),
    #[error("Snapshot decoding failed: {0}")]
    Decode(String),
}

/// Opaque capture of a whole surface at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(Vec<u8>);

impl Snapshot {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Trait for drawing surfaces.
///
/// All operations are synchronous. Applying the same stroke or restoring the
/// same snapshot twice yields the same visible result.
pub trait Surface {
    /// Paint one segment with round caps.
    fn apply_stroke(&mut self, stroke: &Stroke);

    /// Wipe the whole surface.
    fn clear(&mut self);

    /// Capture the full visible surface.
    fn capture_snapshot(&self) -> Result<Snapshot, SurfaceError>;

    /// Replace the visible surface with a previous capture.
    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError>;
}

// ============================================================================
// Raster surface
// ============================================================================

/// Pixel surface backed by a tiny-skia pixmap.
///
/// The background is transparent so eraser strokes (destination-out) leave
/// real holes, the same way a browser canvas behaves.
pub struct RasterSurface {
    pixmap: Pixmap,
}

impl RasterSurface {
    /// Create a transparent surface.
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        let pixmap = Pixmap::new(width, height).ok_or(SurfaceError::InvalidSize { width, height })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Encode the current surface as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, SurfaceError> {
        self.pixmap
            .encode_png()
            .map_err(|e| SurfaceError::Encode(e.to_string()))
    }

    /// Alpha of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn alpha_at(&self, x: u32, y: u32) -> Option<u8> {
        self.pixmap.pixel(x, y).map(|p| p.alpha())
    }

    /// Raw premultiplied RGBA bytes.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    fn paint_for(stroke: &Stroke) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.anti_alias = true;
        if stroke.is_eraser {
            // Only the source alpha matters for destination-out
            paint.set_color_rgba8(0, 0, 0, 255);
            paint.blend_mode = BlendMode::DestinationOut;
        } else {
            let rgba = stroke.color().to_rgba8();
            paint.set_color_rgba8(rgba.r, rgba.g, rgba.b, rgba.a);
            paint.blend_mode = BlendMode::SourceOver;
        }
        paint
    }
}

impl Surface for RasterSurface {
    fn apply_stroke(&mut self, stroke: &Stroke) {
        let paint = Self::paint_for(stroke);
        let width = stroke.effective_width() as f32;

        if stroke.is_dot() {
            // A zero-length segment with round caps is a filled disc
            let path = PathBuilder::from_circle(
                stroke.start.x as f32,
                stroke.start.y as f32,
                (width / 2.0).max(0.5),
            );
            if let Some(path) = path {
                self.pixmap
                    .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
            }
            return;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(stroke.start.x as f32, stroke.start.y as f32);
        pb.line_to(stroke.end.x as f32, stroke.end.y as f32);

        let line = tiny_skia::Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        };

        if let Some(path) = pb.finish() {
            self.pixmap
                .stroke_path(&path, &paint, &line, Transform::identity(), None);
        }
    }

    fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    fn capture_snapshot(&self) -> Result<Snapshot, SurfaceError> {
        self.encode_png().map(Snapshot::from_bytes)
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError> {
        let image = Pixmap::decode_png(snapshot.as_bytes())
            .map_err(|e| SurfaceError::Decode(e.to_string()))?;
        if image.width() == self.pixmap.width() && image.height() == self.pixmap.height() {
            self.pixmap = image;
            return Ok(());
        }

        self.clear();
        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Ok(())
    }
}

// ============================================================================
// Recording surface
// ============================================================================

/// Surface that remembers which strokes are currently visible.
///
/// Eraser strokes stay in the visible list: the picture is the ordered
/// sequence of strokes since the last clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSurface {
    visible: Vec<Stroke>,
    applied: usize,
    clears: usize,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strokes painted since the last clear, in paint order.
    pub fn visible(&self) -> &[Stroke] {
        &self.visible
    }

    /// Total number of `apply_stroke` calls.
    pub fn applied_count(&self) -> usize {
        self.applied
    }

    /// Total number of `clear` calls.
    pub fn clear_count(&self) -> usize {
        self.clears
    }

    /// Same picture, ignoring how many operations produced it.
    pub fn same_picture(&self, other: &Self) -> bool {
        self.visible == other.visible
    }
}

impl Surface for RecordingSurface {
    fn apply_stroke(&mut self, stroke: &Stroke) {
        self.applied += 1;
        self.visible.push(stroke.clone());
    }

    fn clear(&mut self) {
        self.clears += 1;
        self.visible.clear();
    }

    fn capture_snapshot(&self) -> Result<Snapshot, SurfaceError> {
        serde_json::to_vec(&self.visible)
            .map(Snapshot::from_bytes)
            .map_err(|e| SurfaceError::Encode(e.to_string()))
    }

    fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError> {
        let visible: Vec<Stroke> = serde_json::from_slice(snapshot.as_bytes())
            .map_err(|e| SurfaceError::Decode(e.to_string()))?;
        self.visible = visible;
        Ok(())
    }
}
