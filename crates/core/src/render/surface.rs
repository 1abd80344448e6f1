use std::path::Path;

use tiny_skia::{Color, ColorU8, Paint, Pixmap, Rect, Transform};

use crate::{Result, SurfaceConfig, VisualiserError};

/// Colour laid over the previous frame before each strategy draws.
const FADE_RGB: [u8; 3] = [10, 10, 10];

/// Persistent pixel buffer the rendering strategies paint into.
///
/// Frames are never cleared between ticks; every strategy fades the previous
/// content instead so motion leaves a trail.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    pixmap: Pixmap,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            VisualiserError::InvalidConfig(format!("cannot allocate a {width}x{height} surface"))
        })?;
        Ok(Self { pixmap })
    }

    pub fn from_config(config: &SurfaceConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.width, config.height)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Resets every pixel to fully transparent.
    pub fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
    }

    pub fn is_blank(&self) -> bool {
        self.pixmap.data().iter().all(|byte| *byte == 0)
    }

    /// Straight-alpha colour at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<ColorU8> {
        self.pixmap.pixel(x, y).map(|pixel| pixel.demultiply())
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    /// Blends a translucent dark layer over the whole surface.
    pub(crate) fn fade(&mut self, alpha: f32) {
        let Some(rect) = Rect::from_xywh(0.0, 0.0, self.width() as f32, self.height() as f32)
        else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color(rgba(FADE_RGB, alpha));
        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|err| VisualiserError::Image(err.to_string()))
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.encode_png()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// Builds a colour from an RGB triple and a `0..=1` alpha.
pub(crate) fn rgba(rgb: [u8; 3], alpha: f32) -> Color {
    let alpha = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color::from_rgba8(rgb[0], rgb[1], rgb[2], alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surfaces_are_blank() {
        let surface = RasterSurface::from_config(&SurfaceConfig::default()).unwrap();
        assert_eq!((surface.width(), surface.height()), (800, 256));
        assert!(surface.is_blank());
    }

    #[test]
    fn rejects_empty_surfaces() {
        assert!(RasterSurface::new(0, 10).is_err());
    }

    #[test]
    fn fading_accumulates_and_clear_resets() {
        let mut surface = RasterSurface::new(4, 4).unwrap();
        surface.fade(0.3);
        let once = surface.pixel(1, 1).unwrap().alpha();
        surface.fade(0.3);
        let twice = surface.pixel(1, 1).unwrap().alpha();

        assert!(once > 0);
        assert!(twice > once);
        assert!(twice < 255);

        surface.clear();
        assert!(surface.is_blank());
    }

    #[test]
    fn encodes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut surface = RasterSurface::new(8, 8).unwrap();
        surface.fade(1.0);

        surface.save_png(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
