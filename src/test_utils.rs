//! Synthetic images for detector unit tests.

use image::{GrayImage, Luma};

/// Filled disk: pixels within `radius` of `center` get `disk_pix`.
pub(crate) fn draw_disk_image(
    w: u32,
    h: u32,
    center: [f32; 2],
    radius: f32,
    disk_pix: u8,
    bg_pix: u8,
) -> GrayImage {
    draw_ellipse_image(w, h, center, radius, radius, disk_pix, bg_pix)
}

/// Filled axis-aligned ellipse with semi-axes `a` (x) and `b` (y).
pub(crate) fn draw_ellipse_image(
    w: u32,
    h: u32,
    center: [f32; 2],
    a: f32,
    b: f32,
    fg_pix: u8,
    bg_pix: u8,
) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        let nx = (x as f32 - center[0]) / a;
        let ny = (y as f32 - center[1]) / b;
        Luma([if nx * nx + ny * ny <= 1.0 { fg_pix } else { bg_pix }])
    })
}

/// Filled rectangle with top-left corner `origin` and `size` (w, h).
pub(crate) fn draw_rect_image(
    w: u32,
    h: u32,
    origin: (u32, u32),
    size: (u32, u32),
    fg_pix: u8,
    bg_pix: u8,
) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        let inside_x = x >= origin.0 && x < origin.0 + size.0;
        let inside_y = y >= origin.1 && y < origin.1 + size.1;
        let inside = inside_x && inside_y;
        Luma([if inside { fg_pix } else { bg_pix }])
    })
}
