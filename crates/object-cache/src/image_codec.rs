//! Image encoding for the image cache paths

use crate::error::{CacheError, Result};
use image::DynamicImage;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Converts between an image value and its encoded bytes.
///
/// The cache never inspects `Image`; it only stores the value in memory and
/// persists whatever bytes `encode` returns.
pub trait ImageCodec: Send + Sync + 'static {
    type Image: Send + Sync + 'static;

    fn encode(&self, image: &Self::Image) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Image>;
}

/// Encoding used when persisting images
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    fn as_image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::WebP => image::ImageFormat::WebP,
        }
    }
}

impl FromStr for ImageFormat {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::WebP),
            other => Err(CacheError::Config(format!(
                "unknown image format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg => write!(f, "jpeg"),
            ImageFormat::WebP => write!(f, "webp"),
        }
    }
}

/// [`ImageCodec`] for raster images backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec {
    format: ImageFormat,
}

impl RasterCodec {
    pub fn new(format: ImageFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl ImageCodec for RasterCodec {
    type Image = DynamicImage;

    fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        // JPEG has no alpha channel and the WebP encoder only takes 8-bit RGBA
        let converted = match self.format {
            ImageFormat::Png => None,
            ImageFormat::Jpeg => Some(DynamicImage::ImageRgb8(image.to_rgb8())),
            ImageFormat::WebP => Some(DynamicImage::ImageRgba8(image.to_rgba8())),
        };
        let source = converted.as_ref().unwrap_or(image);

        let mut buf = Cursor::new(Vec::new());
        source
            .write_to(&mut buf, self.format.as_image_format())
            .map_err(|e| CacheError::Serialization(format!("image encode failed: {}", e)))?;
        Ok(buf.into_inner())
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| CacheError::Deserialization(format!("image decode failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn checkerboard() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(4, 4, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        }))
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("png".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert_eq!("JPG".parse::<ImageFormat>().unwrap(), ImageFormat::Jpeg);
        assert_eq!(" webp ".parse::<ImageFormat>().unwrap(), ImageFormat::WebP);
        assert!(matches!(
            "tiff".parse::<ImageFormat>(),
            Err(CacheError::Config(_))
        ));
    }

    #[test]
    fn test_default_is_png() {
        assert_eq!(RasterCodec::default().format(), ImageFormat::Png);
        assert_eq!(ImageFormat::default().to_string(), "png");
    }

    #[test]
    fn test_png_is_lossless() {
        let codec = RasterCodec::new(ImageFormat::Png);
        let bytes = codec.encode(&checkerboard()).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, checkerboard());
    }

    #[test]
    fn test_jpeg_encodes_rgba_source() {
        let codec = RasterCodec::new(ImageFormat::Jpeg);
        let rgba = DynamicImage::ImageRgba8(checkerboard().to_rgba8());

        let bytes = codec.encode(&rgba).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8]));

        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn test_decode_garbage() {
        let err = RasterCodec::default().decode(b"not an image").unwrap_err();
        assert!(matches!(err, CacheError::Deserialization(_)));
    }
}
