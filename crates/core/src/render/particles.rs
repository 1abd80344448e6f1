use std::time::Duration;

use tiny_skia::{FillRule, Paint, PathBuilder, Transform};

use super::{palette, surface::rgba, RasterSurface};

const FADE_ALPHA: f32 = 0.1;
const BIN_STRIDE: usize = 4;
const MAX_RADIUS: f32 = 20.0;
const SWAY_AMPLITUDE: f64 = 50.0;
/// Phase advance per millisecond of frame time.
const SWAY_RATE: f64 = 0.01;

/// Circles over every fourth bin, bobbing on a sine driven by the frame
/// timestamp. Size and opacity both follow the bin's magnitude.
pub(crate) fn draw(snapshot: &[u8], surface: &mut RasterSurface, timestamp: Duration) {
    surface.fade(FADE_ALPHA);
    if snapshot.is_empty() {
        return;
    }

    let width = surface.width() as f32;
    let centre_y = f64::from(surface.height()) / 2.0;
    let count = snapshot.len() as f32;
    let phase = timestamp.as_secs_f64() * 1_000.0 * SWAY_RATE;
    let pixmap = surface.pixmap_mut();

    for i in (0..snapshot.len()).step_by(BIN_STRIDE) {
        if snapshot[i] == 0 {
            continue;
        }
        let level = f32::from(snapshot[i]) / 255.0;
        let x = i as f32 / count * width;
        let y = centre_y + (phase + i as f64).sin() * SWAY_AMPLITUDE;

        let Some(circle) = PathBuilder::from_circle(x, y as f32, level * MAX_RADIUS) else {
            continue;
        };

        let mut paint = Paint::default();
        paint.anti_alias = true;
        paint.set_color(rgba(palette::GOLD, level));
        pixmap.fill_path(&circle, &paint, FillRule::Winding, Transform::identity(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loud_bins_draw_opaque_particles_on_the_sway_curve() {
        let mut surface = RasterSurface::new(800, 256).unwrap();
        let mut snapshot = vec![0u8; 128];
        snapshot[64] = 255;
        draw(&snapshot, &mut surface, Duration::ZERO);

        // Bin 64 sits at x = 400 with y = 128 + sin(64) * 50.
        let y = (128.0 + 64.0_f64.sin() * 50.0).round() as u32;
        let centre = surface.pixel(400, y).unwrap();
        assert!(centre.alpha() > 200);
        assert!(centre.red() > 200);
    }

    #[test]
    fn particles_move_with_time() {
        let mut snapshot = vec![0u8; 128];
        snapshot[0] = 255;

        let mut early = RasterSurface::new(800, 256).unwrap();
        draw(&snapshot, &mut early, Duration::ZERO);
        let mut later = RasterSurface::new(800, 256).unwrap();
        draw(&snapshot, &mut later, Duration::from_millis(157));

        // sin(0) puts the first particle on the centre line; 1.57 rad later it
        // has swung roughly 50px down.
        assert!(early.pixel(5, 128).unwrap().alpha() > 200);
        assert!(later.pixel(5, 128).unwrap().alpha() < 64);
        assert!(later.pixel(5, 178).unwrap().alpha() > 200);
    }

    #[test]
    fn silent_bins_leave_only_the_fade_layer() {
        let mut surface = RasterSurface::new(64, 64).unwrap();
        draw(&[0; 32], &mut surface, Duration::from_millis(40));

        let background = surface.pixmap().pixels()[0];
        assert!(surface
            .pixmap()
            .pixels()
            .iter()
            .all(|pixel| *pixel == background));
    }

    #[test]
    fn bins_between_the_stride_are_ignored() {
        let mut surface = RasterSurface::new(800, 256).unwrap();
        let mut snapshot = vec![0u8; 128];
        snapshot[1] = 255;
        draw(&snapshot, &mut surface, Duration::ZERO);

        assert!(surface
            .pixmap()
            .pixels()
            .iter()
            .all(|pixel| pixel.demultiply().red() < 50));
    }
}
