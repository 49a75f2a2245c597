use plotters::prelude::*;

use crate::detect::{Detection, DetectionMethod, PixelGrid};

const COLOR_HOUGH: RGBColor = RGBColor(230, 130, 30);
const COLOR_BLOB: RGBColor = RGBColor(60, 110, 220);
const COLOR_CONTOUR: RGBColor = RGBColor(210, 70, 210);

fn method_color(method: DetectionMethod) -> RGBColor {
    match method {
        DetectionMethod::HoughCircle => COLOR_HOUGH,
        DetectionMethod::Blob => COLOR_BLOB,
        DetectionMethod::Contour => COLOR_CONTOUR,
    }
}

/// Renders the frame with every detection outlined, as an RGBA pixel buffer.
///
/// Each detection gets a ring at its radius and a small filled center
/// marker, colored by the stage that produced it.
pub fn render_overlay_rgba(grid: &PixelGrid, detections: &[Detection]) -> Result<Vec<u8>, String> {
    let (width, height) = (grid.width(), grid.height());
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| "width*height overflow".to_string())?;

    let mut rgb = grid.rgb().as_raw().clone();

    {
        let root = BitMapBackend::with_buffer(&mut rgb, (width, height)).into_drawing_area();
        let max_x = width.saturating_sub(1) as i32;
        let max_y = height.saturating_sub(1) as i32;

        for d in detections {
            let (cx, cy) = d.center();
            let x = (cx.round() as i32).clamp(0, max_x);
            let y = (cy.round() as i32).clamp(0, max_y);
            let r = d.radius_px().round().max(1.0) as i32;
            let color = method_color(d.method());

            root.draw(&Circle::new((x, y), r, color.stroke_width(2)))
                .map_err(|e| e.to_string())?;
            root.draw(&Circle::new((x, y), 2, color.filled()))
                .map_err(|e| e.to_string())?;
        }

        root.present().map_err(|e| e.to_string())?;
    }

    let mut rgba = vec![255u8; pixel_count * 4];
    for i in 0..pixel_count {
        rgba[i * 4] = rgb[i * 3];
        rgba[i * 4 + 1] = rgb[i * 3 + 1];
        rgba[i * 4 + 2] = rgb[i * 3 + 2];
        rgba[i * 4 + 3] = 255;
    }

    Ok(rgba)
}
