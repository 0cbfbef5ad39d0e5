//! Image transformation on top of the `image` crate
//!
//! Handles the actual pipeline: decode → crop/resize → flip → rotate → blur →
//! mono → encode

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use super::spec::{
    Anchor, FitMode, Horizontal, Mono, OutputFormat, ProcessSpec, Rotation, Vertical,
};
use super::{Manipulator, ManipulatorError};
use crate::config::ProcessorConfig;

const FILTER: FilterType = FilterType::Lanczos3;

/// Default [`Manipulator`]; CPU work runs on the blocking pool
#[derive(Debug, Clone, Copy)]
pub struct ImageManipulator {
    default_quality: u8,
    max_dimension: u32,
}

impl ImageManipulator {
    pub fn new(default_quality: u8, max_dimension: u32) -> Self {
        Self {
            default_quality,
            max_dimension,
        }
    }

    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self::new(config.default_quality, config.max_dimension)
    }

    fn transform(&self, data: &[u8], spec: &ProcessSpec) -> Result<Bytes, ManipulatorError> {
        let source_format = image::guess_format(data).ok();
        let mut img = image::load_from_memory(data)
            .map_err(|e| ManipulatorError::Decode(e.to_string()))?;

        img = self.resize(img, spec);

        if let Some(flip) = spec.flip() {
            if flip.horizontal {
                img = img.fliph();
            }
            if flip.vertical {
                img = img.flipv();
            }
        }

        img = match spec.rotation() {
            Some(Rotation::Cw90) => img.rotate90(),
            Some(Rotation::Cw180) => img.rotate180(),
            Some(Rotation::Cw270) => img.rotate270(),
            Some(Rotation::None) | None => img,
        };

        if let Some(sigma) = spec.blur() {
            img = img.blur(sigma);
        }

        if let Some(mono) = spec.mono() {
            img = monochrome(&img, mono);
        }

        let format = spec
            .format()
            .unwrap_or_else(|| output_format_for(source_format));
        let quality = spec.quality().unwrap_or(self.default_quality);

        encode(&img, format, quality)
    }

    fn resize(&self, img: DynamicImage, spec: &ProcessSpec) -> DynamicImage {
        let width = spec.width().map(|w| w.min(self.max_dimension));
        let height = spec.height().map(|h| h.min(self.max_dimension));

        let Some(target) = target_dimensions((img.width(), img.height()), width, height) else {
            return img;
        };
        let (target_w, target_h) = bounded(target, self.max_dimension);

        let both = width.is_some() && height.is_some();
        match spec.fit() {
            Some(FitMode::Crop) if both => cover(&img, target_w, target_h, spec.crop()),
            None if both => img.resize(target_w, target_h, FILTER),
            _ => img.resize_exact(target_w, target_h, FILTER),
        }
    }
}

impl Default for ImageManipulator {
    fn default() -> Self {
        Self::from_config(&ProcessorConfig::default())
    }
}

#[async_trait]
impl Manipulator for ImageManipulator {
    async fn process(&self, image: Bytes, spec: &ProcessSpec) -> Result<Bytes, ManipulatorError> {
        if spec.is_empty() {
            return Err(ManipulatorError::EmptySpec);
        }

        let manipulator = *self;
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || manipulator.transform(&image, &spec)).await?
    }
}

/// Output box for the requested dimensions; a single dimension keeps the
/// source aspect ratio.
fn target_dimensions(
    (src_w, src_h): (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    match (width, height) {
        (None, None) => None,
        (Some(w), Some(h)) => Some((w, h)),
        (Some(w), None) => Some((w, proportional(src_h, w, src_w))),
        (None, Some(h)) => Some((proportional(src_w, h, src_h), h)),
    }
}

fn proportional(len: u32, num: u32, den: u32) -> u32 {
    if den == 0 {
        return num.max(1);
    }
    let scaled = (u64::from(len) * u64::from(num) + u64::from(den) / 2) / u64::from(den);
    scaled.clamp(1, u64::from(u32::MAX)) as u32
}

/// Shrink `(w, h)` so neither side exceeds `max`, keeping the ratio
fn bounded((w, h): (u32, u32), max: u32) -> (u32, u32) {
    let max = max.max(1);
    let longest = w.max(h);
    if longest <= max {
        return (w, h);
    }
    if w >= h {
        (max, proportional(h, max, w))
    } else {
        (proportional(w, max, h), max)
    }
}

/// Cut the largest window with the target ratio out of the source at
/// `anchor`, then scale it to the target box. The source is never scaled
/// beyond the output size.
fn cover(img: &DynamicImage, target_w: u32, target_h: u32, anchor: Anchor) -> DynamicImage {
    let (src_w, src_h) = (img.width().max(1), img.height().max(1));
    let (target_w, target_h) = (target_w.max(1), target_h.max(1));

    let window_w = proportional(src_h, target_w, target_h).min(src_w);
    let window_h = proportional(src_w, target_h, target_w).min(src_h);

    let (x, y) = crop_origin((src_w, src_h), (window_w, window_h), anchor);
    img.crop_imm(x, y, window_w, window_h).resize_exact(target_w, target_h, FILTER)
}

fn crop_origin(
    (resized_w, resized_h): (u32, u32),
    (target_w, target_h): (u32, u32),
    anchor: Anchor,
) -> (u32, u32) {
    let spare_x = resized_w.saturating_sub(target_w);
    let spare_y = resized_h.saturating_sub(target_h);

    let x = match anchor.horizontal {
        Horizontal::Left => 0,
        Horizontal::Center => spare_x / 2,
        Horizontal::Right => spare_x,
    };
    let y = match anchor.vertical {
        Vertical::Top => 0,
        Vertical::Center => spare_y / 2,
        Vertical::Bottom => spare_y,
    };
    (x, y)
}

fn monochrome(img: &DynamicImage, mono: Mono) -> DynamicImage {
    let luma = img.to_luma8();
    let Some([r, g, b]) = mono.tint else {
        return DynamicImage::ImageLuma8(luma);
    };

    let tint = |l: u8, c: u8| ((u16::from(l) * u16::from(c)) / 255) as u8;
    let tinted = RgbImage::from_fn(luma.width(), luma.height(), |x, y| {
        let l = luma.get_pixel(x, y)[0];
        Rgb([tint(l, r), tint(l, g), tint(l, b)])
    });
    DynamicImage::ImageRgb8(tinted)
}

/// Keep the source encoding when we can write it, PNG otherwise
fn output_format_for(source: Option<ImageFormat>) -> OutputFormat {
    match source {
        Some(ImageFormat::Jpeg) => OutputFormat::Jpeg,
        Some(ImageFormat::WebP) => OutputFormat::WebP,
        Some(ImageFormat::Gif) => OutputFormat::Gif,
        _ => OutputFormat::Png,
    }
}

fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    quality: u8,
) -> Result<Bytes, ManipulatorError> {
    let mut buf = Cursor::new(Vec::new());

    let result = match format {
        // JPEG has no alpha channel
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality)),
        OutputFormat::Png => img.write_to(&mut buf, ImageFormat::Png),
        OutputFormat::WebP => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buf, ImageFormat::WebP)
        }
        OutputFormat::Gif => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buf, ImageFormat::Gif)
        }
    };
    result.map_err(|e| ManipulatorError::Encode(e.to_string()))?;

    Ok(Bytes::from(buf.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::SpecParser;

    fn png(width: u32, height: u32) -> Bytes {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        Bytes::from(buf.into_inner())
    }

    fn spec(query: &[(&str, &str)]) -> ProcessSpec {
        let pairs: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SpecParser::new().parse(&pairs)
    }

    fn dimensions(data: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(data).unwrap();
        (img.width(), img.height())
    }

    #[test]
    fn test_target_dimensions() {
        assert_eq!(target_dimensions((800, 400), None, None), None);
        assert_eq!(target_dimensions((800, 400), Some(200), None), Some((200, 100)));
        assert_eq!(target_dimensions((800, 400), None, Some(100)), Some((200, 100)));
        assert_eq!(target_dimensions((800, 400), Some(50), Some(50)), Some((50, 50)));
        assert_eq!(target_dimensions((1000, 1), Some(10), None), Some((10, 1)));
    }

    #[test]
    fn test_bounded() {
        assert_eq!(bounded((16, 8), 16), (16, 8));
        assert_eq!(bounded((16, 1600), 16), (1, 16));
        assert_eq!(bounded((4000, 2000), 1000), (1000, 500));
        assert_eq!(bounded((10, 10), 0), (1, 1));
    }

    #[test]
    fn test_crop_origin() {
        let top_left = Anchor {
            horizontal: Horizontal::Left,
            vertical: Vertical::Top,
        };
        let bottom_right = Anchor {
            horizontal: Horizontal::Right,
            vertical: Vertical::Bottom,
        };
        assert_eq!(crop_origin((200, 100), (100, 100), Anchor::default()), (50, 0));
        assert_eq!(crop_origin((200, 100), (100, 100), top_left), (0, 0));
        assert_eq!(crop_origin((100, 300), (100, 100), bottom_right), (0, 200));
    }

    #[tokio::test]
    async fn test_resize_keeps_aspect_ratio() {
        let out = ImageManipulator::default()
            .process(png(8, 4), &spec(&[("w", "4")]))
            .await
            .unwrap();
        assert_eq!(dimensions(&out), (4, 2));
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_resize_within_box() {
        let out = ImageManipulator::default()
            .process(png(8, 4), &spec(&[("w", "4"), ("h", "4")]))
            .await
            .unwrap();
        assert_eq!(dimensions(&out), (4, 2));
    }

    #[tokio::test]
    async fn test_fit_crop_and_scale() {
        let manipulator = ImageManipulator::default();

        let cropped = manipulator
            .process(png(8, 4), &spec(&[("w", "3"), ("h", "3"), ("fit", "crop")]))
            .await
            .unwrap();
        assert_eq!(dimensions(&cropped), (3, 3));

        let scaled = manipulator
            .process(png(8, 4), &spec(&[("w", "3"), ("h", "5"), ("fit", "scale")]))
            .await
            .unwrap();
        assert_eq!(dimensions(&scaled), (3, 5));
    }

    #[tokio::test]
    async fn test_max_dimension_clamp() {
        let out = ImageManipulator::new(80, 16)
            .process(png(8, 4), &spec(&[("w", "10000")]))
            .await
            .unwrap();
        assert_eq!(dimensions(&out), (16, 8));
    }

    #[tokio::test]
    async fn test_max_dimension_bounds_derived_side() {
        let manipulator = ImageManipulator::new(80, 16);

        let out = manipulator
            .process(png(1, 100), &spec(&[("w", "16")]))
            .await
            .unwrap();
        let (width, height) = dimensions(&out);
        assert!(width <= 16 && height <= 16, "got {width}x{height}");

        let cropped = manipulator
            .process(png(1, 100), &spec(&[("w", "16"), ("h", "16"), ("fit", "crop")]))
            .await
            .unwrap();
        assert_eq!(dimensions(&cropped), (16, 16));
    }

    #[tokio::test]
    async fn test_fit_crop_keeps_anchor_region() {
        // Left half red, right half blue
        let img = RgbImage::from_fn(8, 4, |x, _| {
            if x < 4 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();

        let out = ImageManipulator::default()
            .process(
                Bytes::from(buf.into_inner()),
                &spec(&[("w", "2"), ("h", "2"), ("fit", "crop"), ("crop", "right")]),
            )
            .await
            .unwrap();
        let out = image::load_from_memory(&out).unwrap().to_rgb8();
        assert_eq!(out.dimensions(), (2, 2));
        assert!(out.get_pixel(1, 1)[2] > out.get_pixel(1, 1)[0]);
    }

    #[tokio::test]
    async fn test_rotate_and_flip() {
        let out = ImageManipulator::default()
            .process(png(8, 4), &spec(&[("rot", "90"), ("flip", "h")]))
            .await
            .unwrap();
        assert_eq!(dimensions(&out), (4, 8));
    }

    #[tokio::test]
    async fn test_format_conversion() {
        let out = ImageManipulator::default()
            .process(png(8, 4), &spec(&[("fm", "jpg"), ("q", "50")]))
            .await
            .unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_mono_with_tint() {
        let out = ImageManipulator::default()
            .process(png(2, 2), &spec(&[("mono", "ff0000")]))
            .await
            .unwrap();
        let img = image::load_from_memory(&out).unwrap().to_rgb8();
        let pixel = img.get_pixel(0, 0);
        assert_eq!(pixel[1], 0);
        assert_eq!(pixel[2], 0);
    }

    #[tokio::test]
    async fn test_empty_spec_rejected() {
        let result = ImageManipulator::default()
            .process(png(2, 2), &ProcessSpec::EMPTY)
            .await;
        assert!(matches!(result, Err(ManipulatorError::EmptySpec)));
    }

    #[tokio::test]
    async fn test_undecodable_input() {
        let result = ImageManipulator::default()
            .process(Bytes::from_static(b"not an image"), &spec(&[("w", "10")]))
            .await;
        assert!(matches!(result, Err(ManipulatorError::Decode(_))));
    }
}
