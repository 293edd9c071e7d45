/// Image codec adapter
///
/// The variant generator and the edit-macro pipeline are written against this
/// surface rather than the `image` crate directly: decode, encode-to-format,
/// resize, and the pixel-level operations the underlying crate does not ship.
use crate::error::{MediaError, MediaResult};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Encodings the variant matrix and edit pipeline can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageEncoding {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageEncoding {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageEncoding::Jpeg),
            "png" => Some(ImageEncoding::Png),
            "gif" => Some(ImageEncoding::Gif),
            "webp" => Some(ImageEncoding::Webp),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "jpg",
            ImageEncoding::Png => "png",
            ImageEncoding::Gif => "gif",
            ImageEncoding::Webp => "webp",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
            ImageEncoding::Gif => "image/gif",
            ImageEncoding::Webp => "image/webp",
        }
    }

    fn format(&self) -> ImageFormat {
        match self {
            ImageEncoding::Jpeg => ImageFormat::Jpeg,
            ImageEncoding::Png => ImageFormat::Png,
            ImageEncoding::Gif => ImageFormat::Gif,
            ImageEncoding::Webp => ImageFormat::WebP,
        }
    }
}

/// Decode an image from raw bytes
pub fn decode(data: &[u8]) -> MediaResult<DynamicImage> {
    image::load_from_memory(data).map_err(Into::into)
}

/// Encode an image to the given format.
///
/// Pixel layout is normalised first: JPEG has no alpha channel, WebP and GIF
/// encoders only accept 8-bit RGB(A).
pub fn encode(image: &DynamicImage, encoding: ImageEncoding) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);

    match encoding {
        ImageEncoding::Jpeg => {
            DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut cursor, encoding.format())?
        }
        ImageEncoding::Png => image.write_to(&mut cursor, encoding.format())?,
        ImageEncoding::Gif | ImageEncoding::Webp => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut cursor, encoding.format())?
        }
    }

    Ok(buf)
}

/// Resize to a target width, preserving aspect ratio, never upscaling.
///
/// Returns the image untouched when the target is at or beyond the original
/// width.
pub fn scale_to_width(image: &DynamicImage, width: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    if width >= w {
        return image.clone();
    }
    let height = ((width as f64 * h as f64 / w as f64).round() as u32).max(1);
    image.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
}

/// Resize to a target height, preserving aspect ratio, never upscaling
pub fn scale_to_height(image: &DynamicImage, height: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    if height >= h {
        return image.clone();
    }
    let width = ((height as f64 * w as f64 / h as f64).round() as u32).max(1);
    image.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
}

/// Nine-position crop anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Anchor {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "top-left" => Some(Anchor::TopLeft),
            "top" => Some(Anchor::Top),
            "top-right" => Some(Anchor::TopRight),
            "left" => Some(Anchor::Left),
            "center" => Some(Anchor::Center),
            "right" => Some(Anchor::Right),
            "bottom-left" => Some(Anchor::BottomLeft),
            "bottom" => Some(Anchor::Bottom),
            "bottom-right" => Some(Anchor::BottomRight),
            _ => None,
        }
    }

    /// Crop origin for a `crop_w` x `crop_h` window inside `w` x `h`
    fn origin(&self, w: u32, h: u32, crop_w: u32, crop_h: u32) -> (u32, u32) {
        let max_x = w.saturating_sub(crop_w);
        let max_y = h.saturating_sub(crop_h);
        let (fx, fy) = match self {
            Anchor::TopLeft => (0.0, 0.0),
            Anchor::Top => (0.5, 0.0),
            Anchor::TopRight => (1.0, 0.0),
            Anchor::Left => (0.0, 0.5),
            Anchor::Center => (0.5, 0.5),
            Anchor::Right => (1.0, 0.5),
            Anchor::BottomLeft => (0.0, 1.0),
            Anchor::Bottom => (0.5, 1.0),
            Anchor::BottomRight => (1.0, 1.0),
        };
        (
            (max_x as f64 * fx).round() as u32,
            (max_y as f64 * fy).round() as u32,
        )
    }
}

/// Scale so the target box is covered, then crop to it at the anchor
pub fn fit(image: &DynamicImage, width: u32, height: u32, anchor: Anchor) -> DynamicImage {
    let (w, h) = image.dimensions();
    let scale = (width as f64 / w as f64).max(height as f64 / h as f64);
    let scaled_w = ((w as f64 * scale).ceil() as u32).max(width);
    let scaled_h = ((h as f64 * scale).ceil() as u32).max(height);
    let scaled = image.resize_exact(scaled_w, scaled_h, image::imageops::FilterType::Lanczos3);

    let (x, y) = anchor.origin(scaled_w, scaled_h, width, height);
    scaled.crop_imm(x, y, width, height)
}

/// Crop a window; origin defaults to the centre when not given
pub fn crop(
    image: &DynamicImage,
    width: u32,
    height: u32,
    origin: Option<(u32, u32)>,
) -> DynamicImage {
    let (w, h) = image.dimensions();
    let crop_w = width.min(w);
    let crop_h = height.min(h);
    let (x, y) = origin.unwrap_or_else(|| Anchor::Center.origin(w, h, crop_w, crop_h));
    image.crop_imm(x.min(w - crop_w), y.min(h - crop_h), crop_w, crop_h)
}

/// Average pixels into `amount`-sized blocks
pub fn pixelate(image: &DynamicImage, amount: u32) -> DynamicImage {
    let amount = amount.max(1);
    let (w, h) = image.dimensions();
    let small_w = (w / amount).max(1);
    let small_h = (h / amount).max(1);
    image
        .resize_exact(small_w, small_h, image::imageops::FilterType::Nearest)
        .resize_exact(w, h, image::imageops::FilterType::Nearest)
}

/// Gamma correction; values above 1.0 brighten
pub fn gamma(image: &DynamicImage, value: f64) -> DynamicImage {
    let exponent = 1.0 / value.max(f64::EPSILON);
    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            let normalised = *channel as f64 / 255.0;
            *channel = (normalised.powf(exponent) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgba8(rgba)
}

/// Shift each channel by a percentage in -100..100
pub fn colorize(image: &DynamicImage, r: f64, g: f64, b: f64) -> DynamicImage {
    let mut rgba = image.to_rgba8();
    let shifts = [r * 2.55, g * 2.55, b * 2.55];
    for pixel in rgba.pixels_mut() {
        for (channel, shift) in pixel.0.iter_mut().zip(shifts) {
            *channel = (*channel as f64 + shift).round().clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgba8(rgba)
}

/// Brightness shift by a percentage in -100..100
pub fn brightness(image: &DynamicImage, delta: f64) -> DynamicImage {
    image.brighten((delta * 2.55).round() as i32)
}

/// Rotate counter-clockwise by an arbitrary angle, filling exposed corners
/// with the background colour.
///
/// Right-angle rotations take the exact fast path; anything else is an
/// inverse-mapped nearest-neighbour resample into the rotated bounding box.
pub fn rotate(image: &DynamicImage, angle: f64, background: Rgba<u8>) -> DynamicImage {
    let normalised = angle.rem_euclid(360.0);
    if normalised == 0.0 {
        return image.clone();
    }
    if normalised == 90.0 {
        return image.rotate270();
    }
    if normalised == 180.0 {
        return image.rotate180();
    }
    if normalised == 270.0 {
        return image.rotate90();
    }

    let radians = normalised.to_radians();
    let (sin, cos) = radians.sin_cos();
    let (w, h) = image.dimensions();
    let (wf, hf) = (w as f64, h as f64);

    let out_w = (wf * cos.abs() + hf * sin.abs()).ceil() as u32;
    let out_h = (wf * sin.abs() + hf * cos.abs()).ceil() as u32;

    let src = image.to_rgba8();
    let mut out = RgbaImage::from_pixel(out_w, out_h, background);

    let (cx, cy) = (wf / 2.0, hf / 2.0);
    let (ox, oy) = (out_w as f64 / 2.0, out_h as f64 / 2.0);

    for y in 0..out_h {
        for x in 0..out_w {
            let dx = x as f64 + 0.5 - ox;
            let dy = y as f64 + 0.5 - oy;
            // inverse rotation back into source space
            let sx = dx * cos - dy * sin + cx;
            let sy = dx * sin + dy * cos + cy;
            if sx >= 0.0 && sy >= 0.0 && sx < wf && sy < hf {
                out.put_pixel(x, y, *src.get_pixel(sx as u32, sy as u32));
            }
        }
    }

    DynamicImage::ImageRgba8(out)
}

/// Parse a `#rrggbb` (or `#rgb`) colour; bare names are limited to the
/// handful the edit UI offers
pub fn parse_color(value: &str) -> MediaResult<Rgba<u8>> {
    match value {
        "white" => return Ok(Rgba([255, 255, 255, 255])),
        "black" => return Ok(Rgba([0, 0, 0, 255])),
        "transparent" => return Ok(Rgba([0, 0, 0, 0])),
        _ => {}
    }

    let hex_part = value.strip_prefix('#').unwrap_or(value);
    let expanded = match hex_part.len() {
        3 => hex_part
            .chars()
            .flat_map(|c| [c, c])
            .collect::<String>(),
        6 => hex_part.to_string(),
        _ => {
            return Err(MediaError::Validation(format!(
                "Invalid colour value: {value}"
            )))
        }
    };

    let bytes = hex::decode(&expanded)
        .map_err(|_| MediaError::Validation(format!("Invalid colour value: {value}")))?;
    Ok(Rgba([bytes[0], bytes[1], bytes[2], 255]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([120, 80, 40, 255])))
    }

    #[test]
    fn scale_to_width_preserves_aspect() {
        let img = test_image(800, 400);
        let scaled = scale_to_width(&img, 200);
        assert_eq!(scaled.dimensions(), (200, 100));
    }

    #[test]
    fn scale_to_width_never_upscales() {
        let img = test_image(300, 150);
        let scaled = scale_to_width(&img, 640);
        assert_eq!(scaled.dimensions(), (300, 150));
    }

    #[test]
    fn encode_decode_round_trip() {
        let img = test_image(16, 8);
        for encoding in [
            ImageEncoding::Jpeg,
            ImageEncoding::Png,
            ImageEncoding::Gif,
            ImageEncoding::Webp,
        ] {
            let bytes = encode(&img, encoding).unwrap();
            let decoded = decode(&bytes).unwrap();
            assert_eq!(decoded.dimensions(), (16, 8), "{:?}", encoding);
        }
    }

    #[test]
    fn fit_covers_and_crops() {
        let img = test_image(400, 200);
        let fitted = fit(&img, 100, 100, Anchor::Center);
        assert_eq!(fitted.dimensions(), (100, 100));
    }

    #[test]
    fn crop_defaults_to_center() {
        let img = test_image(100, 100);
        let cropped = crop(&img, 50, 40, None);
        assert_eq!(cropped.dimensions(), (50, 40));
    }

    #[test]
    fn rotate_right_angle_swaps_dimensions() {
        let img = test_image(30, 10);
        let rotated = rotate(&img, 90.0, Rgba([255, 255, 255, 255]));
        assert_eq!(rotated.dimensions(), (10, 30));
    }

    #[test]
    fn rotate_arbitrary_angle_grows_canvas() {
        let img = test_image(20, 20);
        let rotated = rotate(&img, 45.0, Rgba([255, 255, 255, 255]));
        let (w, h) = rotated.dimensions();
        assert!(w > 20 && h > 20);
    }

    #[test]
    fn parse_color_variants() {
        assert_eq!(parse_color("white").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("#336699").unwrap(), Rgba([0x33, 0x66, 0x99, 255]));
        assert_eq!(parse_color("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert!(parse_color("chartreuse-ish").is_err());
    }

    #[test]
    fn pixelate_keeps_dimensions() {
        let img = test_image(64, 48);
        assert_eq!(pixelate(&img, 8).dimensions(), (64, 48));
    }
}
