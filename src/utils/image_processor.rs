use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbaImage};

use crate::error::TranscodeError;
use crate::models::settings::{FitMode, OutputFormat, OutputSettings};

const FILTER: FilterType = FilterType::Lanczos3;
const AVIF_SPEED: u8 = 6;
/// Largest side a variant may have, configured or derived.
pub const MAX_DIMENSION: u32 = 10_000;

/// Decodes `data`, fits it into the target box and re-encodes it.
///
/// A missing width or height is derived from the source aspect ratio; at
/// least one must be given, neither may be zero, and neither side of the
/// final box may exceed [`MAX_DIMENSION`]. Alpha is kept in both
/// fit modes; `contain` pads with transparent pixels.
pub fn resize(
    data: &[u8],
    width: Option<u32>,
    height: Option<u32>,
    fit: FitMode,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, TranscodeError> {
    // 1. Validate target before paying for a decode
    if width == Some(0)
        || height == Some(0)
        || (width.is_none() && height.is_none())
        || width.is_some_and(|w| w > MAX_DIMENSION)
        || height.is_some_and(|h| h > MAX_DIMENSION)
    {
        return Err(TranscodeError::InvalidDimensions { width, height });
    }

    // 2. Load image, format sniffed from content
    if data.is_empty() {
        return Err(TranscodeError::UnsupportedSource("empty input".to_string()));
    }
    let img = image::load_from_memory(data)
        .map_err(|e| TranscodeError::UnsupportedSource(e.to_string()))?;

    let (src_w, src_h) = img.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(TranscodeError::DegenerateSource);
    }

    // 3. Fit into the target box
    let (target_w, target_h) = target_box(src_w, src_h, width, height);
    if target_w > MAX_DIMENSION || target_h > MAX_DIMENSION {
        return Err(TranscodeError::InvalidDimensions {
            width: Some(target_w),
            height: Some(target_h),
        });
    }
    let rgba = img.to_rgba8();
    let fitted = match fit {
        FitMode::Contain => contain(&rgba, target_w, target_h),
        FitMode::Cover => cover(&rgba, target_w, target_h),
    };

    // 4. Encode
    encode(fitted, format, quality)
}

/// Completes a partially specified target from the source aspect ratio.
pub fn target_box(src_w: u32, src_h: u32, width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scaled(src_h, w as f64 / src_w as f64)),
        (None, Some(h)) => (scaled(src_w, h as f64 / src_h as f64), h),
        (None, None) => (src_w, src_h),
    }
}

/// Size of the scaled source under `contain`; never larger than the target.
pub fn contain_dimensions(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    let scale = f64::min(
        target_w as f64 / src_w as f64,
        target_h as f64 / src_h as f64,
    );
    (
        scaled(src_w, scale).min(target_w),
        scaled(src_h, scale).min(target_h),
    )
}

/// Size of the scaled source under `cover`; never smaller than the target.
pub fn cover_dimensions(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32) {
    let scale = f64::max(
        target_w as f64 / src_w as f64,
        target_h as f64 / src_h as f64,
    );
    (
        scaled(src_w, scale).max(target_w),
        scaled(src_h, scale).max(target_h),
    )
}

fn scaled(side: u32, scale: f64) -> u32 {
    ((side as f64 * scale).round() as u32).max(1)
}

fn contain(src: &RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
    let (w, h) = contain_dimensions(src.width(), src.height(), target_w, target_h);
    let scaled = imageops::resize(src, w, h, FILTER);

    let mut canvas = RgbaImage::new(target_w, target_h);
    let x = (target_w - w) / 2;
    let y = (target_h - h) / 2;
    imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
    canvas
}

/// Crops the source to the region that survives the cover scale, then
/// resizes that region, so no intermediate larger than the target is built.
fn cover(src: &RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
    let (src_w, src_h) = src.dimensions();
    let (w, h) = cover_dimensions(src_w, src_h, target_w, target_h);

    let crop_w = scaled(target_w, src_w as f64 / w as f64).min(src_w);
    let crop_h = scaled(target_h, src_h as f64 / h as f64).min(src_h);
    let x = (src_w - crop_w) / 2;
    let y = (src_h - crop_h) / 2;

    let region = imageops::crop_imm(src, x, y, crop_w, crop_h).to_image();
    imageops::resize(&region, target_w, target_h, FILTER)
}

fn encode(img: RgbaImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, TranscodeError> {
    let quality = quality.clamp(1, 100);
    let (width, height) = img.dimensions();
    let mut buffer = Vec::new();

    match format {
        OutputFormat::Webp => {
            // image's own WebP encoder is lossless only
            let encoded = webp::Encoder::from_rgba(&img, width, height).encode(quality as f32);
            buffer.extend_from_slice(&encoded);
        }
        OutputFormat::Avif => {
            DynamicImage::ImageRgba8(img)
                .write_with_encoder(AvifEncoder::new_with_speed_quality(
                    &mut buffer,
                    AVIF_SPEED,
                    quality,
                ))
                .map_err(|e| TranscodeError::EncodeFailure(e.to_string()))?;
        }
        OutputFormat::Png => {
            DynamicImage::ImageRgba8(img)
                .write_with_encoder(PngEncoder::new(&mut buffer))
                .map_err(|e| TranscodeError::EncodeFailure(e.to_string()))?;
        }
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            DynamicImage::ImageRgb8(rgb)
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))
                .map_err(|e| TranscodeError::EncodeFailure(e.to_string()))?;
        }
    }

    if buffer.is_empty() {
        return Err(TranscodeError::EncodeFailure(format!(
            "{:?} encoder returned no bytes",
            format
        )));
    }
    Ok(buffer)
}

/// Stateless transcoder bound to the global output settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transcoder {
    output: OutputSettings,
}

impl Transcoder {
    pub fn new(output: OutputSettings) -> Self {
        Self { output }
    }

    pub fn output(&self) -> OutputSettings {
        self.output
    }

    pub fn resize(
        &self,
        data: &[u8],
        width: Option<u32>,
        height: Option<u32>,
        fit: FitMode,
    ) -> Result<Vec<u8>, TranscodeError> {
        resize(
            data,
            width,
            height,
            fit,
            self.output.format,
            self.output.quality,
        )
    }
}
