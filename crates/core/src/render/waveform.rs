use tiny_skia::{Paint, PathBuilder, Stroke, Transform};

use super::{palette, surface::rgba, RasterSurface};

const FADE_ALPHA: f32 = 0.2;
const LINE_WIDTH: f32 = 2.0;
/// Byte value drawn on the vertical midline.
const CENTRE_VALUE: f32 = 128.0;

/// Oscilloscope-style trace across the full width, closed onto the midline
/// at the right edge.
pub(crate) fn draw(snapshot: &[u8], surface: &mut RasterSurface) {
    surface.fade(FADE_ALPHA);
    if snapshot.is_empty() {
        return;
    }

    let width = surface.width() as f32;
    let height = surface.height() as f32;
    let slice_width = width / snapshot.len() as f32;

    let mut builder = PathBuilder::new();
    for (i, &value) in snapshot.iter().enumerate() {
        let x = i as f32 * slice_width;
        let y = f32::from(value) / CENTRE_VALUE * height / 2.0;
        if i == 0 {
            builder.move_to(x, y);
        } else {
            builder.line_to(x, y);
        }
    }
    builder.line_to(width, height / 2.0);

    let Some(path) = builder.finish() else {
        return;
    };

    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.set_color(rgba(palette::GOLD, 1.0));
    let stroke = Stroke {
        width: LINE_WIDTH,
        ..Stroke::default()
    };

    surface
        .pixmap_mut()
        .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centred_values_trace_the_midline() {
        let mut surface = RasterSurface::new(256, 100).unwrap();
        draw(&[128; 64], &mut surface);

        let on_line = surface.pixel(100, 50).unwrap();
        assert!(on_line.alpha() > 200);
        assert!(on_line.red() > 200);

        let off_line = surface.pixel(100, 20).unwrap();
        assert!(off_line.alpha() < 128);
    }

    #[test]
    fn silent_trace_runs_along_the_top_then_closes_to_the_midline() {
        let mut surface = RasterSurface::new(256, 100).unwrap();
        draw(&[0; 64], &mut surface);

        let top = surface.pixel(50, 0).unwrap();
        assert!(top.red() > 100);
        let bottom = surface.pixel(50, 99).unwrap();
        assert!(bottom.red() < 50);
    }
}
