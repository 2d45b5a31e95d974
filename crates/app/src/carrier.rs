//! Image adapter: raw RGB bytes in and out of decoded images
//!
//! Sealing only ever sees the RGB channels as a flat byte buffer. Alpha is
//! carried alongside, untouched, so an image rebuilt from the same
//! dimensions keeps its transparency.

use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("pixel buffer is {actual} bytes, a {width}x{height} image needs {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Dimensions and alpha plane of an image whose RGB bytes were extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carrier {
    width: u32,
    height: u32,
    alpha: Option<Vec<u8>>,
}

impl Carrier {
    pub fn open(path: &Path) -> Result<(Self, Vec<u8>), CarrierError> {
        Ok(Self::extract(&image::open(path)?))
    }

    /// Split `image` into its carrier and an `R G B R G B ..` byte buffer
    ///
    /// Deeper color formats are reduced to 8 bits per channel.
    pub fn extract(image: &DynamicImage) -> (Self, Vec<u8>) {
        let (width, height) = (image.width(), image.height());
        if !image.color().has_alpha() {
            let rgb = image.to_rgb8().into_raw();
            return (
                Self {
                    width,
                    height,
                    alpha: None,
                },
                rgb,
            );
        }

        let rgba = image.to_rgba8().into_raw();
        let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
        let mut alpha = Vec::with_capacity(rgba.len() / 4);
        for px in rgba.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
            alpha.push(px[3]);
        }
        (
            Self {
                width,
                height,
                alpha: Some(alpha),
            },
            rgb,
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// Number of RGB bytes an image of this size holds
    pub fn rgb_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Rebuild an image from `rgb` using this carrier's size and alpha
    pub fn rebuild(&self, rgb: &[u8]) -> Result<DynamicImage, CarrierError> {
        if rgb.len() != self.rgb_len() {
            return Err(CarrierError::SizeMismatch {
                width: self.width,
                height: self.height,
                expected: self.rgb_len(),
                actual: rgb.len(),
            });
        }

        let image = match &self.alpha {
            None => RgbImage::from_raw(self.width, self.height, rgb.to_vec())
                .map(DynamicImage::ImageRgb8),
            Some(alpha) => {
                let mut rgba = Vec::with_capacity(alpha.len() * 4);
                for (px, a) in rgb.chunks_exact(3).zip(alpha) {
                    rgba.extend_from_slice(px);
                    rgba.push(*a);
                }
                RgbaImage::from_raw(self.width, self.height, rgba).map(DynamicImage::ImageRgba8)
            }
        };
        // Only unreachable if the length check above is wrong
        image.ok_or(CarrierError::SizeMismatch {
            width: self.width,
            height: self.height,
            expected: self.rgb_len(),
            actual: rgb.len(),
        })
    }
}

/// Write `image` as a PNG regardless of the path's extension
pub fn save_png(image: &DynamicImage, path: &Path) -> Result<(), CarrierError> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
