use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use std::io::Cursor;

/// Filled disk described as `(cx, cy, radius)`.
pub type Disk = (f32, f32, f32);

/// Uniform background with bright (or dark) filled disks.
pub fn disks_gray(width: u32, height: u32, disks: &[Disk], fg: u8, bg: u8) -> GrayImage {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    GrayImage::from_fn(width, height, |x, y| {
        let inside = disks.iter().any(|&(cx, cy, r)| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            dx * dx + dy * dy <= r * r
        });
        Luma([if inside { fg } else { bg }])
    })
}

pub fn solid_gray(width: u32, height: u32, value: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([value]))
}

/// Encodes a grayscale image as a three-channel PNG, the way a camera frame
/// would arrive.
pub fn png_bytes(gray: &GrayImage) -> Vec<u8> {
    let rgb: RgbImage = DynamicImage::ImageLuma8(gray.clone()).to_rgb8();
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub fn jpeg_bytes(gray: &GrayImage) -> Vec<u8> {
    let rgb: RgbImage = DynamicImage::ImageLuma8(gray.clone()).to_rgb8();
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .expect("encode jpeg");
    bytes
}
