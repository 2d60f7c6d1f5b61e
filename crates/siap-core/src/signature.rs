//! Freehand signature capture on a fixed-resolution raster.
//!
//! A signing surface consumes a device-agnostic pointer stream
//! (`Begin`, `Move*`, `End`) and produces a PNG artifact when a stroke ends on
//! a surface that carries ink. Device points are mapped into raster space by
//! the ratio of raster size to displayed size, so on-screen scaling and pixel
//! density do not change the output.
//!
//! Strokes are rasterized without anti-aliasing: a segment covers every pixel
//! whose center lies within half the stroke width of it. The union of those
//! capsules gives round caps and round joins, and the output depends only on
//! the mapped point sequence.

use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::codec::{self, CodecError, ImageArtifact};
use crate::error::CoreError;

/// Reference raster width of a signing surface.
pub const SIGNATURE_WIDTH: u32 = 500;
/// Reference raster height of a signing surface.
pub const SIGNATURE_HEIGHT: u32 = 176;
/// Stroke width in raster units.
pub const STROKE_WIDTH: f64 = 3.0;
/// Opaque dark ink (`#0f172a`).
pub const INK_COLOR: Rgba<u8> = Rgba([0x0f, 0x17, 0x2a, 0xff]);

/// A point in device/client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientPoint {
    pub x: f64,
    pub y: f64,
}

impl ClientPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in raster coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterPoint {
    pub x: f64,
    pub y: f64,
}

/// Where the surface is displayed, in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Viewport {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Result<Self, CoreError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) || !left.is_finite() || !top.is_finite() {
            return Err(CoreError::InvalidViewport { width, height });
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    /// A viewport displaying the raster 1:1 at the origin.
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: f64::from(width.max(1)),
            height: f64::from(height.max(1)),
        }
    }
}

/// Unified pointer stream consumed by [`SignatureCapture`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Begin(ClientPoint),
    Move(ClientPoint),
    End,
}

/// Notification to the owner of a signing surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureOutcome {
    /// A stroke ended on an inked surface.
    Saved(ImageArtifact),
    /// The surface was wiped; the stored signature must become empty.
    Cleared,
}

impl SignatureOutcome {
    pub fn into_artifact(self) -> ImageArtifact {
        match self {
            Self::Saved(artifact) => artifact,
            Self::Cleared => ImageArtifact::empty(),
        }
    }
}

/// A single signing surface.
#[derive(Debug, Clone)]
pub struct SignatureCapture {
    raster: RgbaImage,
    viewport: Viewport,
    /// Last sampled point of the active stroke; `None` when not drawing.
    cursor: Option<RasterPoint>,
    has_ink: bool,
}

impl SignatureCapture {
    pub fn new(width: u32, height: u32, viewport: Viewport) -> Result<Self, CoreError> {
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidRaster { width, height });
        }
        Ok(Self {
            raster: RgbaImage::new(width, height),
            viewport,
            cursor: None,
            has_ink: false,
        })
    }

    /// A surface at the reference resolution, displayed 1:1.
    pub fn reference() -> Self {
        Self {
            raster: RgbaImage::new(SIGNATURE_WIDTH, SIGNATURE_HEIGHT),
            viewport: Viewport::identity(SIGNATURE_WIDTH, SIGNATURE_HEIGHT),
            cursor: None,
            has_ink: false,
        }
    }

    /// Update the displayed geometry, e.g. after a layout change.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn has_ink(&self) -> bool {
        self.has_ink
    }

    pub fn is_drawing(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn map(&self, point: ClientPoint) -> RasterPoint {
        let (w, h) = self.raster.dimensions();
        let scale_x = f64::from(w) / self.viewport.width;
        let scale_y = f64::from(h) / self.viewport.height;
        RasterPoint {
            x: (point.x - self.viewport.left) * scale_x,
            y: (point.y - self.viewport.top) * scale_y,
        }
    }

    pub fn begin(&mut self, point: ClientPoint) {
        self.cursor = Some(self.map(point));
    }

    /// Draw from the last sampled point to `point`. No-op without an active stroke.
    pub fn extend(&mut self, point: ClientPoint) {
        let Some(from) = self.cursor else {
            return;
        };
        let to = self.map(point);
        stroke_segment(&mut self.raster, from, to, STROKE_WIDTH / 2.0, INK_COLOR);
        self.cursor = Some(to);
        self.has_ink = true;
    }

    /// Finish the active stroke; returns the encoded surface if it carries ink.
    pub fn end(&mut self) -> Result<Option<ImageArtifact>, CodecError> {
        if self.cursor.take().is_none() {
            return Ok(None);
        }
        if !self.has_ink {
            return Ok(None);
        }
        let artifact = codec::encode_png(&self.raster)?;
        debug!(bytes = artifact.as_str().len(), "signature saved");
        Ok(Some(artifact))
    }

    /// Erase all ink. Always yields the empty artifact.
    pub fn clear(&mut self) -> ImageArtifact {
        self.raster.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
        self.cursor = None;
        self.has_ink = false;
        ImageArtifact::empty()
    }

    /// Feed one pointer event.
    pub fn handle(&mut self, event: PointerEvent) -> Result<Option<SignatureOutcome>, CodecError> {
        match event {
            PointerEvent::Begin(p) => {
                self.begin(p);
                Ok(None)
            }
            PointerEvent::Move(p) => {
                self.extend(p);
                Ok(None)
            }
            PointerEvent::End => Ok(self.end()?.map(SignatureOutcome::Saved)),
        }
    }
}

impl Default for SignatureCapture {
    fn default() -> Self {
        Self::reference()
    }
}

/// Paint every pixel whose center lies within `radius` of segment `a`–`b`.
fn stroke_segment(raster: &mut RgbaImage, a: RasterPoint, b: RasterPoint, radius: f64, ink: Rgba<u8>) {
    let (w, h) = raster.dimensions();
    let min_x = (a.x.min(b.x) - radius).floor().max(0.0);
    let min_y = (a.y.min(b.y) - radius).floor().max(0.0);
    let max_x = (a.x.max(b.x) + radius).ceil().min(f64::from(w) - 1.0);
    let max_y = (a.y.max(b.y) + radius).ceil().min(f64::from(h) - 1.0);
    if max_x < min_x || max_y < min_y {
        return;
    }

    let r2 = radius * radius;
    for py in (min_y as u32)..=(max_y as u32) {
        for px in (min_x as u32)..=(max_x as u32) {
            let c = RasterPoint {
                x: f64::from(px) + 0.5,
                y: f64::from(py) + 0.5,
            };
            if distance_sq_to_segment(c, a, b) <= r2 {
                raster.put_pixel(px, py, ink);
            }
        }
    }
}

fn distance_sq_to_segment(p: RasterPoint, a: RasterPoint, b: RasterPoint) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (qx, qy) = (a.x + t * dx, a.y + t * dy);
    (p.x - qx).powi(2) + (p.y - qy).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> ClientPoint {
        ClientPoint::new(x, y)
    }

    fn inked_pixels(capture: &SignatureCapture) -> usize {
        capture.raster().pixels().filter(|px| px[3] == 255).count()
    }

    #[test]
    fn begin_end_without_drag_is_not_ink() {
        let mut pad = SignatureCapture::reference();
        pad.begin(p(10.0, 10.0));
        assert!(pad.end().unwrap().is_none());
        assert!(!pad.has_ink());
        assert_eq!(inked_pixels(&pad), 0);
    }

    #[test]
    fn drag_produces_artifact() {
        let mut pad = SignatureCapture::reference();
        pad.begin(p(10.0, 10.0));
        pad.extend(p(60.0, 40.0));
        let artifact = pad.end().unwrap().expect("artifact");
        assert!(!artifact.is_empty());
        assert_eq!(artifact.mime_type(), Some("image/png"));
        assert!(pad.has_ink());
        assert!(!pad.is_drawing());
    }

    #[test]
    fn clear_resets_surface() {
        let mut pad = SignatureCapture::reference();
        pad.begin(p(10.0, 10.0));
        pad.extend(p(60.0, 40.0));
        pad.end().unwrap();

        let cleared = pad.clear();
        assert!(cleared.is_empty());
        assert!(!pad.has_ink());
        assert_eq!(inked_pixels(&pad), 0);
    }

    #[test]
    fn extend_without_stroke_is_noop() {
        let mut pad = SignatureCapture::reference();
        pad.extend(p(60.0, 40.0));
        assert!(!pad.has_ink());
        assert_eq!(inked_pixels(&pad), 0);
        assert!(pad.end().unwrap().is_none());
    }

    #[test]
    fn tap_on_inked_surface_resaves() {
        let mut pad = SignatureCapture::reference();
        pad.begin(p(10.0, 10.0));
        pad.extend(p(60.0, 40.0));
        pad.end().unwrap();

        pad.begin(p(100.0, 100.0));
        assert!(pad.end().unwrap().is_some());
    }

    #[test]
    fn stroke_has_expected_width() {
        let mut pad = SignatureCapture::reference();
        pad.begin(p(50.0, 50.5));
        pad.extend(p(150.0, 50.5));
        // Horizontal line through pixel-center row 50: rows 49..=51 inked.
        for y in 49..=51 {
            assert_eq!(pad.raster().get_pixel(100, y), &INK_COLOR, "row {y}");
        }
        assert_eq!(pad.raster().get_pixel(100, 47)[3], 0);
        assert_eq!(pad.raster().get_pixel(100, 53)[3], 0);
        // Round cap extends past the endpoint by the radius only.
        assert_eq!(pad.raster().get_pixel(151, 50), &INK_COLOR);
        assert_eq!(pad.raster().get_pixel(153, 50)[3], 0);
    }

    #[test]
    fn mapping_compensates_for_display_scale() {
        // Surface shown at half size, offset by (20, 30).
        let viewport = Viewport::new(20.0, 30.0, 250.0, 88.0).unwrap();
        let mut scaled = SignatureCapture::new(500, 176, viewport).unwrap();
        let mut direct = SignatureCapture::reference();

        for (pad, pts) in [
            (&mut scaled, [p(25.0, 35.0), p(70.0, 60.0), p(120.0, 40.0)]),
            (&mut direct, [p(10.0, 10.0), p(100.0, 60.0), p(200.0, 20.0)]),
        ] {
            pad.begin(pts[0]);
            pad.extend(pts[1]);
            pad.extend(pts[2]);
            pad.end().unwrap();
        }
        assert_eq!(scaled.raster().as_raw(), direct.raster().as_raw());
    }

    #[test]
    fn deterministic_for_same_stream() {
        let stream = [
            PointerEvent::Begin(p(5.0, 5.0)),
            PointerEvent::Move(p(40.0, 90.0)),
            PointerEvent::Move(p(300.0, 120.0)),
            PointerEvent::End,
        ];
        let run = || {
            let mut pad = SignatureCapture::reference();
            let mut saved = None;
            for event in stream {
                if let Some(outcome) = pad.handle(event).unwrap() {
                    saved = Some(outcome);
                }
            }
            saved
        };
        let first = run().expect("saved");
        assert!(matches!(first, SignatureOutcome::Saved(_)));
        assert_eq!(Some(first), run());
    }

    #[test]
    fn strokes_outside_raster_are_clipped() {
        let mut pad = SignatureCapture::reference();
        pad.begin(p(-100.0, -100.0));
        pad.extend(p(-50.0, -50.0));
        assert!(pad.has_ink());
        assert_eq!(inked_pixels(&pad), 0);
    }

    #[test]
    fn rejects_degenerate_geometry() {
        assert!(Viewport::new(0.0, 0.0, 0.0, 10.0).is_err());
        assert!(SignatureCapture::new(0, 176, Viewport::identity(500, 176)).is_err());
    }
}
