//! Photo preparation before upload

use crate::error::{Result, RoofDeskError};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageFormat;
use std::io::Cursor;

/// Upload image quality
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PhotoQuality {
    /// 2400px, 85%
    High,
    /// 1600px, 75%（デフォルト）
    #[default]
    Medium,
    /// 1024px, 60%
    Low,
    /// Upload the file untouched
    Original,
}

impl PhotoQuality {
    /// 最大ピクセル幅（長辺）
    pub fn max_edge(&self) -> Option<u32> {
        match self {
            PhotoQuality::High => Some(2400),
            PhotoQuality::Medium => Some(1600),
            PhotoQuality::Low => Some(1024),
            PhotoQuality::Original => None,
        }
    }

    /// JPEG品質 (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            PhotoQuality::High => 85,
            PhotoQuality::Medium => 75,
            PhotoQuality::Low => 60,
            PhotoQuality::Original => 100,
        }
    }
}

impl std::str::FromStr for PhotoQuality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" | "h" => Ok(PhotoQuality::High),
            "medium" | "med" | "m" => Ok(PhotoQuality::Medium),
            "low" | "l" => Ok(PhotoQuality::Low),
            "original" | "orig" | "o" => Ok(PhotoQuality::Original),
            _ => Err(format!("Unknown quality: {}. Use high, medium, low, or original", s)),
        }
    }
}

impl std::fmt::Display for PhotoQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhotoQuality::High => write!(f, "high"),
            PhotoQuality::Medium => write!(f, "medium"),
            PhotoQuality::Low => write!(f, "low"),
            PhotoQuality::Original => write!(f, "original"),
        }
    }
}

/// Bytes ready for upload with their file extension
#[derive(Debug, Clone)]
pub struct PreparedPhoto {
    pub bytes: Vec<u8>,
    pub extension: String,
}

/// Downscale and re-encode as JPEG when the photo is larger than the quality
/// allows. Formats the decoder does not handle (e.g. HEIC) pass through.
pub fn prepare_photo(bytes: Vec<u8>, extension: &str, quality: PhotoQuality) -> Result<PreparedPhoto> {
    let passthrough = |bytes: Vec<u8>| PreparedPhoto { bytes, extension: extension.to_lowercase() };

    let Some(max_edge) = quality.max_edge() else {
        return Ok(passthrough(bytes));
    };
    let Ok(format) = image::guess_format(&bytes) else {
        return Ok(passthrough(bytes));
    };
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) {
        return Ok(passthrough(bytes));
    }

    let img = image::load_from_memory_with_format(&bytes, format)
        .map_err(|e| RoofDeskError::Image(e.to_string()))?;
    if img.width().max(img.height()) <= max_edge && format == ImageFormat::Jpeg {
        return Ok(passthrough(bytes));
    }

    let img = if img.width().max(img.height()) > max_edge {
        img.resize(max_edge, max_edge, FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.jpeg_quality());
    encoder
        .encode_image(&rgb)
        .map_err(|e| RoofDeskError::Image(e.to_string()))?;

    Ok(PreparedPhoto { bytes: out, extension: "jpg".into() })
}

/// Decode an image and return (width, height); rejects empty images
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let img = image::load_from_memory(bytes).map_err(|e| RoofDeskError::Image(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(RoofDeskError::Image("image has no pixels".into()));
    }
    Ok((img.width(), img.height()))
}

/// Encode an in-memory image as PNG (test fixtures, signature normalization)
pub fn encode_png(img: &image::DynamicImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| RoofDeskError::Image(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&DynamicImage::ImageRgb8(RgbImage::new(width, height))).unwrap()
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!("H".parse::<PhotoQuality>().unwrap(), PhotoQuality::High);
        assert_eq!("original".parse::<PhotoQuality>().unwrap(), PhotoQuality::Original);
        assert!("ultra".parse::<PhotoQuality>().is_err());
    }

    #[test]
    fn test_large_png_is_downscaled_to_jpeg() {
        let prepared = prepare_photo(png(2000, 1000), "png", PhotoQuality::Low).unwrap();
        assert_eq!(prepared.extension, "jpg");
        assert_eq!(image_dimensions(&prepared.bytes).unwrap(), (1024, 512));
    }

    #[test]
    fn test_unknown_bytes_pass_through() {
        let prepared = prepare_photo(b"heic-ish".to_vec(), "HEIC", PhotoQuality::Medium).unwrap();
        assert_eq!(prepared.bytes, b"heic-ish");
        assert_eq!(prepared.extension, "heic");
    }

    #[test]
    fn test_original_quality_untouched() {
        let bytes = png(3000, 3000);
        let prepared = prepare_photo(bytes.clone(), "png", PhotoQuality::Original).unwrap();
        assert_eq!(prepared.bytes, bytes);
        assert_eq!(prepared.extension, "png");
    }

    #[test]
    fn test_image_dimensions_rejects_garbage() {
        assert!(image_dimensions(b"nope").is_err());
        assert_eq!(image_dimensions(&png(3, 2)).unwrap(), (3, 2));
    }
}
