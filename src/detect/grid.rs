//! Image decoding into the read-only pixel grid every detector consumes.

use image::{DynamicImage, GrayImage, RgbImage};
use kornia::{
    image::{Image, ImageError, ImageSize, allocator::CpuAllocator},
    imgproc,
};
use log::debug;

type CpuImage<T, const C: usize> = Image<T, C, CpuAllocator>;

/// Errors raised while turning encoded bytes into a [`PixelGrid`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("not a decodable raster image: {0}")]
    Image(#[from] image::ImageError),

    #[error("kornia image error: {0}")]
    Kornia(#[from] ImageError),

    #[error("image has empty dimensions {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("grayscale buffer does not match {width}x{height}")]
    BufferSize { width: u32, height: u32 },
}

/// Decoded image: the RGB color plane plus its luma conversion.
///
/// Both dimensions are non-zero. Detectors only ever borrow it.
#[derive(Debug, Clone)]
pub struct PixelGrid {
    rgb: RgbImage,
    gray: GrayImage,
}

impl PixelGrid {
    pub fn from_dynamic(source: &DynamicImage) -> Result<Self, DecodeError> {
        Self::from_rgb(source.to_rgb8())
    }

    /// Builds the grid from an RGB plane, deriving grayscale with the standard
    /// luma weights.
    pub fn from_rgb(rgb: RgbImage) -> Result<Self, DecodeError> {
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage { width, height });
        }

        let image = CpuImage::<u8, 3>::new(
            ImageSize {
                width: width as usize,
                height: height as usize,
            },
            rgb.as_raw().clone(),
            CpuAllocator,
        )?;
        let mut luma = CpuImage::<u8, 1>::from_size_val(image.size(), 0u8, CpuAllocator)?;
        imgproc::color::gray_from_rgb_u8(&image, &mut luma)?;

        let gray = GrayImage::from_raw(width, height, luma.as_slice().to_vec())
            .ok_or(DecodeError::BufferSize { width, height })?;
        Ok(Self { rgb, gray })
    }

    /// Builds the grid from a grayscale plane; the color plane replicates it.
    pub fn from_gray(gray: GrayImage) -> Result<Self, DecodeError> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage { width, height });
        }
        let rgb = DynamicImage::ImageLuma8(gray.clone()).to_rgb8();
        Ok(Self { rgb, gray })
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }
}

/// Decodes an encoded raster image (JPEG, PNG, ...) into a [`PixelGrid`].
pub fn decode_image(bytes: &[u8]) -> Result<PixelGrid, DecodeError> {
    let decoded = image::load_from_memory(bytes)?;
    let grid = PixelGrid::from_dynamic(&decoded)?;
    debug!("decoded {}x{} image from {} bytes", grid.width(), grid.height(), bytes.len());
    Ok(grid)
}
