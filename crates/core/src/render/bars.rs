use tiny_skia::{GradientStop, LinearGradient, Paint, Point, Rect, Shader, SpreadMode, Transform};

use super::{palette, surface::rgba, RasterSurface};

const FADE_ALPHA: f32 = 0.3;
const WIDTH_SCALE: f32 = 2.5;
const HEIGHT_SCALE: f32 = 0.8;
const GUTTER: f32 = 1.0;

/// Vertical bars, left to right from the lowest bin. Bars that would start
/// past the right edge are not drawn.
pub(crate) fn draw(snapshot: &[u8], surface: &mut RasterSurface) {
    surface.fade(FADE_ALPHA);
    if snapshot.is_empty() {
        return;
    }

    let width = surface.width() as f32;
    let height = surface.height() as f32;
    let bar_width = width / snapshot.len() as f32 * WIDTH_SCALE;
    let pixmap = surface.pixmap_mut();

    let mut x = 0.0;
    for &value in snapshot {
        if x >= width {
            break;
        }

        let bar_height = f32::from(value) / 255.0 * height * HEIGHT_SCALE;
        if bar_height > 0.0 {
            if let Some(rect) = Rect::from_xywh(x, height - bar_height, bar_width, bar_height) {
                let mut paint = Paint::default();
                paint.anti_alias = true;
                paint.shader = LinearGradient::new(
                    Point::from_xy(0.0, height),
                    Point::from_xy(0.0, height - bar_height),
                    vec![
                        GradientStop::new(0.0, rgba(palette::GOLD, 1.0)),
                        GradientStop::new(0.5, rgba(palette::LIGHT_GOLD, 1.0)),
                        GradientStop::new(1.0, rgba(palette::BRIGHT_GOLD, 1.0)),
                    ],
                    SpreadMode::Pad,
                    Transform::identity(),
                )
                .unwrap_or(Shader::SolidColor(rgba(palette::GOLD, 1.0)));

                pixmap.fill_rect(rect, &paint, Transform::identity(), None);
            }
        }

        x += bar_width + GUTTER;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_bars_reach_eighty_percent_of_the_height() {
        let mut surface = RasterSurface::new(800, 256).unwrap();
        draw(&[255; 128], &mut surface);

        // Bars span 51.2..256; the gradient starts at gold on the baseline.
        let base = surface.pixel(5, 250).unwrap();
        assert_eq!(base.alpha(), 255);
        assert!(base.red() > 200);

        let above = surface.pixel(5, 40).unwrap();
        assert!(above.alpha() < 128);
    }

    #[test]
    fn gutters_separate_bars() {
        let mut surface = RasterSurface::new(800, 256).unwrap();
        draw(&[255; 128], &mut surface);

        // First bar covers 0..15.625, the gutter 15.625..16.625.
        let gutter = surface.pixel(16, 250).unwrap();
        let bar = surface.pixel(20, 250).unwrap();
        assert!(gutter.red() < bar.red());
    }

    #[test]
    fn silent_snapshot_only_fades() {
        let mut surface = RasterSurface::new(64, 32).unwrap();
        draw(&[0; 16], &mut surface);

        let pixel = surface.pixel(0, 31).unwrap();
        assert!(pixel.alpha() > 0 && pixel.alpha() < 128);
        assert!(pixel.red() < 50);
    }
}
