use std::f32::consts::TAU;

use tiny_skia::{
    GradientStop, LinearGradient, Paint, PathBuilder, Point, Shader, SpreadMode, Stroke, Transform,
};

use super::{palette, surface::rgba, RasterSurface};

const FADE_ALPHA: f32 = 0.1;
const RADIUS_SCALE: f32 = 0.6;
const LENGTH_SCALE: f32 = 0.5;
const LINE_WIDTH: f32 = 3.0;

/// Radial segments around the centre, one per bin, starting at angle zero
/// and proceeding clockwise in screen space.
pub(crate) fn draw(snapshot: &[u8], surface: &mut RasterSurface) {
    surface.fade(FADE_ALPHA);
    if snapshot.is_empty() {
        return;
    }

    let center_x = surface.width() as f32 / 2.0;
    let center_y = surface.height() as f32 / 2.0;
    let radius = center_x.min(center_y) * RADIUS_SCALE;
    let count = snapshot.len() as f32;
    let stroke = Stroke {
        width: LINE_WIDTH,
        ..Stroke::default()
    };
    let pixmap = surface.pixmap_mut();

    for (i, &value) in snapshot.iter().enumerate() {
        let length = f32::from(value) / 255.0 * radius * LENGTH_SCALE;
        if length <= 0.0 {
            continue;
        }

        let angle = i as f32 / count * TAU;
        let (sin, cos) = angle.sin_cos();
        let start = Point::from_xy(center_x + cos * radius, center_y + sin * radius);
        let end = Point::from_xy(
            center_x + cos * (radius + length),
            center_y + sin * (radius + length),
        );

        let mut builder = PathBuilder::new();
        builder.move_to(start.x, start.y);
        builder.line_to(end.x, end.y);
        let Some(path) = builder.finish() else {
            continue;
        };

        let mut paint = Paint::default();
        paint.anti_alias = true;
        paint.shader = LinearGradient::new(
            start,
            end,
            vec![
                GradientStop::new(0.0, rgba(palette::GOLD, 1.0)),
                GradientStop::new(1.0, rgba(palette::BRIGHT_GOLD, 1.0)),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        )
        .unwrap_or(Shader::SolidColor(rgba(palette::GOLD, 1.0)));

        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_bin_points_right_from_the_base_radius() {
        let mut surface = RasterSurface::new(800, 256).unwrap();
        let mut snapshot = vec![0u8; 128];
        snapshot[0] = 255;
        draw(&snapshot, &mut surface);

        // Centre (400, 128), base radius 76.8, segment length 38.4.
        let on_segment = surface.pixel(495, 128).unwrap();
        assert!(on_segment.alpha() > 200);
        assert!(on_segment.red() > 200);

        let inside_ring = surface.pixel(450, 128).unwrap();
        assert!(inside_ring.alpha() < 64);
    }

    #[test]
    fn silent_snapshot_draws_no_segments() {
        let mut surface = RasterSurface::new(200, 200).unwrap();
        draw(&[0; 64], &mut surface);

        let pixel = surface.pixel(100 + 70, 100).unwrap();
        assert!(pixel.red() < 50);
    }
}
