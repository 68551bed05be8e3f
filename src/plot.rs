//! Scatter rendering of resolved acquisition positions, one image per grid.

use std::collections::BTreeMap;

use plotters::prelude::*;

use crate::epu::AtlasLocation;

const MARGIN: f64 = 12.0;
const MARKER_RADIUS: i32 = 3;
const COLOR_MARKER: RGBColor = RGBColor(0, 190, 190);
const COLOR_AXIS: RGBColor = RGBColor(180, 180, 180);

/// Groups resolved locations by grid id into parallel x/y vectors, ordered by
/// grid id. Locations whose coordinates do not parse as numbers are skipped.
pub fn group_by_grid(locations: &[AtlasLocation]) -> BTreeMap<String, (Vec<f64>, Vec<f64>)> {
    let mut grids: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();

    for location in locations {
        let (Ok(x), Ok(y)) = (location.x.parse::<f64>(), location.y.parse::<f64>()) else {
            continue;
        };
        let (xs, ys) = grids.entry(location.grid.clone()).or_default();
        xs.push(x);
        ys.push(y);
    }

    grids
}

/// Renders a scatter of stage positions into an in-memory RGB pixel buffer.
///
/// Both axes share one scale factor so stage distances stay proportional on
/// screen. Returns an empty buffer for degenerate input.
pub fn render_locations_rgb(
    xs: &[f64],
    ys: &[f64],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, String> {
    if width == 0 || height == 0 || xs.is_empty() || xs.len() != ys.len() {
        return Ok(Vec::new());
    }

    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| "width*height overflow".to_string())?;

    let mut rgb = vec![255u8; pixel_count * 3];

    {
        let root = BitMapBackend::with_buffer(&mut rgb, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| e.to_string())?;

        let (min_x, max_x) = bounds(xs);
        let (min_y, max_y) = bounds(ys);

        let span_x = (max_x - min_x).max(f64::EPSILON);
        let span_y = (max_y - min_y).max(f64::EPSILON);

        let avail_w = (f64::from(width) - 2.0 * MARGIN).max(1.0);
        let avail_h = (f64::from(height) - 2.0 * MARGIN).max(1.0);
        let scale = (avail_w / span_x).min(avail_h / span_y);

        // Pixel y grows downward, stage y upward.
        let to_pixel = |x: f64, y: f64| {
            let px = MARGIN + (x - min_x) * scale;
            let py = f64::from(height) - MARGIN - (y - min_y) * scale;
            (px as i32, py as i32)
        };

        let (origin_x, origin_y) = to_pixel(min_x, min_y);
        let (end_x, end_y) = to_pixel(max_x, max_y);
        root.draw(&PathElement::new(
            [(origin_x, origin_y), (end_x, origin_y)],
            COLOR_AXIS,
        ))
        .map_err(|e| e.to_string())?;
        root.draw(&PathElement::new(
            [(origin_x, origin_y), (origin_x, end_y)],
            COLOR_AXIS,
        ))
        .map_err(|e| e.to_string())?;

        for (&x, &y) in xs.iter().zip(ys) {
            root.draw(&Circle::new(to_pixel(x, y), MARKER_RADIUS, COLOR_MARKER.filled()))
                .map_err(|e| e.to_string())?;
        }

        root.present().map_err(|e| e.to_string())?;
    }

    Ok(rgb)
}

fn bounds(values: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &value in values {
        min = min.min(value);
        max = max.max(value);
    }
    (min, max)
}
