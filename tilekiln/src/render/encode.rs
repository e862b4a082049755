//! Tile image encoding.
//!
//! Renderers produce premultiplied RGBA. PNG and WebP are written straight
//! alpha; JPEG has no alpha channel so transparent areas come out black.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::renderer::RawImage;

/// JPEG quality used for `jpg` tiles.
pub const JPEG_QUALITY: u8 = 90;

/// Output image format of rendered tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpg,
    Webp,
}

impl ImageFormat {
    /// All formats, in CLI order.
    pub const ALL: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Jpg, ImageFormat::Webp];

    /// Name stored in the MBTiles `format` metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized format name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown image format '{0}' (expected png, jpg or webp)")]
pub struct UnknownFormat(pub String);

impl FromStr for ImageFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "webp" => Ok(ImageFormat::Webp),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Errors from encoding a raw image.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("{format} encoding failed: {message}")]
    Codec {
        format: ImageFormat,
        message: String,
    },
}

/// Converts premultiplied RGBA8 to straight alpha in place.
pub fn unpremultiply(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(4) {
        let alpha = pixel[3] as u32;
        match alpha {
            255 => {}
            0 => pixel[..3].fill(0),
            _ => {
                for channel in &mut pixel[..3] {
                    *channel = ((*channel as u32 * 255 + alpha / 2) / alpha).min(255) as u8;
                }
            }
        }
    }
}

/// Encodes a premultiplied raw image.
pub fn encode(image: RawImage, format: ImageFormat) -> Result<Vec<u8>, EncodeError> {
    let expected = image.expected_len();
    if image.data.len() != expected || expected == 0 {
        return Err(EncodeError::BufferSize {
            width: image.width,
            height: image.height,
            expected,
            actual: image.data.len(),
        });
    }

    let RawImage {
        width,
        height,
        mut data,
    } = image;
    let codec_error = |e: image::ImageError| EncodeError::Codec {
        format,
        message: e.to_string(),
    };

    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Png => {
            unpremultiply(&mut data);
            PngEncoder::new(&mut out)
                .write_image(&data, width, height, ExtendedColorType::Rgba8)
                .map_err(codec_error)?;
        }
        ImageFormat::Webp => {
            unpremultiply(&mut data);
            WebPEncoder::new_lossless(&mut out)
                .encode(&data, width, height, ExtendedColorType::Rgba8)
                .map_err(codec_error)?;
        }
        ImageFormat::Jpg => {
            // Premultiplied colour is the image flattened onto black.
            let rgb: Vec<u8> = data
                .chunks_exact(4)
                .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
                .collect();
            JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
                .encode(&rgb, width, height, ExtendedColorType::Rgb8)
                .map_err(codec_error)?;
        }
    }
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RawImage {
        RawImage {
            width,
            height,
            data: rgba.repeat((width * height) as usize),
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("JPEG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpg);
        assert_eq!("jpg".parse::<ImageFormat>().unwrap(), ImageFormat::Jpg);
        assert_eq!("webp".parse::<ImageFormat>().unwrap(), ImageFormat::Webp);
        assert!("gif".parse::<ImageFormat>().is_err());
        assert_eq!(ImageFormat::Jpg.to_string(), "jpg");
    }

    #[test]
    fn test_unpremultiply() {
        let mut data = vec![64, 32, 0, 128, 10, 20, 30, 255, 5, 5, 5, 0];
        unpremultiply(&mut data);
        assert_eq!(&data[0..4], &[128, 64, 0, 128]);
        assert_eq!(&data[4..8], &[10, 20, 30, 255]);
        assert_eq!(&data[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_png_is_straight_alpha_at_full_size() {
        let bytes = encode(solid(8, 4, [64, 0, 0, 128]), ImageFormat::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(0, 0).0, [128, 0, 0, 128]);
    }

    #[test]
    fn test_jpeg_and_webp_decode() {
        let jpg = encode(solid(16, 16, [200, 100, 50, 255]), ImageFormat::Jpg).unwrap();
        assert_eq!(&jpg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));

        let webp = encode(solid(16, 16, [0, 0, 255, 255]), ImageFormat::Webp).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        let decoded = image::load_from_memory(&webp).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(3, 3).0, [0, 0, 255, 255]);
    }

    #[test]
    fn test_buffer_size_mismatch() {
        let image = RawImage {
            width: 4,
            height: 4,
            data: vec![0; 10],
        };
        assert!(matches!(
            encode(image, ImageFormat::Png),
            Err(EncodeError::BufferSize {
                expected: 64,
                actual: 10,
                ..
            })
        ));
    }
}
