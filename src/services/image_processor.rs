// src/services/image_processor.rs
use crate::errors::VitrineError;
use crate::services::ImagePostProcessor;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat as ImgFormat, Rgba, RgbaImage};

/// Side of the square canvas generated images are normalized onto.
pub const CANVAS_SIZE: u32 = 1200;
/// Uploads larger than this on either side are refused outright.
pub const MAX_SOURCE_SIDE: u32 = 4096;
const MARK_OFFSET: u32 = 20;
// ~2cm at 96 DPI, drawn at 45 degrees.
const MARK_LENGTH: f64 = 76.0;
const MARK_COLOR: Rgba<u8> = Rgba([128, 128, 128, 255]);
const JPEG_QUALITY: u8 = 90;

/// A reference upload ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedUpload {
    pub data: Vec<u8>,
    /// Set when the bytes were re-encoded and the client's type no longer applies.
    pub content_type: Option<&'static str>,
    pub width: u32,
    pub height: u32,
}

pub struct ImageProcessor;

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Decodes an upload once, refuses anything past `MAX_SOURCE_SIDE` and
    /// scales the rest down to `max_side`. Scaled uploads become PNG.
    pub fn prepare_upload(&self, data: Vec<u8>, max_side: u32) -> Result<PreparedUpload, VitrineError> {
        let img = image::load_from_memory(&data)
            .map_err(|e| VitrineError::ImageProcessing(format!("Unreadable upload: {}", e)))?;

        let (width, height) = img.dimensions();
        if width > MAX_SOURCE_SIDE || height > MAX_SOURCE_SIDE {
            return Err(VitrineError::ImageProcessing(format!(
                "Upload is {}x{}, larger than {}x{}",
                width, height, MAX_SOURCE_SIDE, MAX_SOURCE_SIDE
            )));
        }

        if width <= max_side && height <= max_side {
            return Ok(PreparedUpload {
                data,
                content_type: None,
                width,
                height,
            });
        }

        let scaled = img.resize(max_side, max_side, image::imageops::FilterType::Lanczos3);
        let mut png = Vec::new();
        scaled
            .write_to(&mut std::io::Cursor::new(&mut png), ImgFormat::Png)
            .map_err(|e| VitrineError::ImageProcessing(format!("Failed to re-encode upload: {}", e)))?;

        Ok(PreparedUpload {
            data: png,
            content_type: Some("image/png"),
            width: scaled.width(),
            height: scaled.height(),
        })
    }

    /// Fits a generated image onto a white square canvas, adds the corner
    /// registration marks and re-encodes it as JPEG.
    pub fn normalize(&self, data: &[u8]) -> Result<Bytes, VitrineError> {
        let img = image::load_from_memory(data)
            .map_err(|e| VitrineError::ImageProcessing(format!("Failed to load image: {}", e)))?;

        let fitted = img.resize(CANVAS_SIZE, CANVAS_SIZE, image::imageops::FilterType::Lanczos3);
        let (width, height) = fitted.dimensions();

        let mut canvas = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba([255, 255, 255, 255]));
        let x = (CANVAS_SIZE - width) / 2;
        let y = (CANVAS_SIZE - height) / 2;
        image::imageops::overlay(&mut canvas, &fitted.to_rgba8(), x as i64, y as i64);

        draw_corner_marks(&mut canvas);

        let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, JPEG_QUALITY)
            .encode(rgb.as_raw(), CANVAS_SIZE, CANVAS_SIZE, ColorType::Rgb8)
            .map_err(|e| {
                VitrineError::ImageProcessing(format!("Failed to encode normalized image: {}", e))
            })?;

        Ok(Bytes::from(output))
    }
}

impl ImagePostProcessor for ImageProcessor {
    fn normalize(&self, raw: &[u8]) -> Result<Bytes, VitrineError> {
        ImageProcessor::normalize(self, raw)
    }
}

/// Diagonal marks in the top-left and bottom-right corners, 2px wide.
fn draw_corner_marks(canvas: &mut RgbaImage) {
    let end = MARK_OFFSET + (MARK_LENGTH / std::f64::consts::SQRT_2).round() as u32;

    for i in MARK_OFFSET..=end {
        canvas.put_pixel(i, i, MARK_COLOR);
        canvas.put_pixel(i + 1, i, MARK_COLOR);

        let j = CANVAS_SIZE - i;
        canvas.put_pixel(j, j, MARK_COLOR);
        canvas.put_pixel(j - 1, j, MARK_COLOR);
    }
}

/// Download-friendly stem built from the first two words of a title.
pub fn download_file_name(title: &str) -> String {
    let stem: String = title
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    if stem.is_empty() {
        "produto".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), ImgFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn normalize_produces_a_square_jpeg() {
        let processor = ImageProcessor::new();
        let out = processor.normalize(&png(300, 150)).unwrap();

        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
        assert_eq!(image::guess_format(&out).unwrap(), ImgFormat::Jpeg);

        // Wide source leaves white bands above and below.
        let top = decoded.get_pixel(CANVAS_SIZE / 2, 5);
        assert!(top[0] > 240 && top[1] > 240 && top[2] > 240);
        let middle = decoded.get_pixel(CANVAS_SIZE / 2, CANVAS_SIZE / 2);
        assert!(middle[0] > 150 && middle[1] < 90);
    }

    #[test]
    fn corner_marks_are_gray() {
        let processor = ImageProcessor::new();
        let decoded = image::load_from_memory(&processor.normalize(&png(100, 400)).unwrap()).unwrap();

        for (x, y) in [(40, 40), (CANVAS_SIZE - 40, CANVAS_SIZE - 40)] {
            let px = decoded.get_pixel(x, y);
            assert!(px[0] < 200, "mark at ({x},{y}) was {:?}", px);
        }
    }

    #[test]
    fn undecodable_payload_is_rejected() {
        let processor = ImageProcessor::new();
        assert!(matches!(
            processor.normalize(b"not an image"),
            Err(VitrineError::ImageProcessing(_))
        ));
        assert!(matches!(
            processor.prepare_upload(b"nope".to_vec(), 100),
            Err(VitrineError::ImageProcessing(_))
        ));
    }

    #[test]
    fn large_uploads_are_scaled_to_png() {
        let processor = ImageProcessor::new();
        let upload = processor.prepare_upload(png(400, 200), 100).unwrap();
        assert_eq!((upload.width, upload.height), (100, 50));
        assert_eq!(upload.content_type, Some("image/png"));
        let decoded = image::load_from_memory(&upload.data).unwrap();
        assert_eq!(decoded.dimensions(), (100, 50));
    }

    #[test]
    fn small_uploads_pass_through_untouched() {
        let processor = ImageProcessor::new();
        let small = png(50, 30);
        let upload = processor.prepare_upload(small.clone(), 100).unwrap();
        assert_eq!(upload.data, small);
        assert_eq!(upload.content_type, None);
        assert_eq!((upload.width, upload.height), (50, 30));
    }

    #[test]
    fn uploads_past_the_source_limit_are_refused() {
        let processor = ImageProcessor::new();
        let err = processor.prepare_upload(png(MAX_SOURCE_SIDE + 1, 8), 100).unwrap_err();
        assert!(err.to_string().contains("4097x8"));
    }

    #[test]
    fn file_names_use_the_first_two_words() {
        assert_eq!(download_file_name("Capa de Celular Azul"), "capa_de");
        assert_eq!(download_file_name("  Fone-XYZ Pro!  Max"), "fonexyz_pro");
        assert_eq!(download_file_name(""), "produto");
    }
}
