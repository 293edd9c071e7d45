/// Macro operations: parsing and application
use crate::{
    codec::{self, Anchor},
    error::{MediaError, MediaResult},
};
use image::{DynamicImage, GenericImageView, Rgba};
use serde_json::Value;

/// Flip axis for the `flip` operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Horizontal,
    Vertical,
    Both,
}

/// One parsed, validated operation
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOp {
    Blur { amount: f64 },
    Sharpen { amount: f64 },
    Pixelate { amount: u32 },
    Brightness { delta: f64 },
    Contrast { delta: f64 },
    Gamma { value: f64 },
    Colorize { r: f64, g: f64, b: f64 },
    Greyscale { enabled: bool },
    Invert { enabled: bool },
    Crop {
        width: u32,
        height: u32,
        origin: Option<(u32, u32)>,
    },
    Fit {
        width: Option<u32>,
        height: Option<u32>,
        position: Anchor,
    },
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        keep_aspect_ratio: bool,
        prevent_upsize: bool,
    },
    Flip { direction: FlipDirection },
    Rotate { angle: f64, background: Rgba<u8> },
}

/// Parses a macro and applies it to an image
#[derive(Debug)]
pub struct MacroProcessor {
    ops: Vec<ImageOp>,
}

impl MacroProcessor {
    /// Parse an ordered (name, parameters) list. Fails on the first unknown
    /// filter or missing parameter without touching any image.
    pub fn parse(macro_entries: &[(String, Value)]) -> MediaResult<Self> {
        let ops = macro_entries
            .iter()
            .map(|(name, args)| parse_op(name, args))
            .collect::<MediaResult<Vec<_>>>()?;
        Ok(Self { ops })
    }

    pub fn ops(&self) -> &[ImageOp] {
        &self.ops
    }

    /// Apply every operation in order. Each step consumes the previous
    /// step's output; the caller's original bytes are untouched.
    pub fn process(&self, image: DynamicImage) -> DynamicImage {
        self.ops.iter().fold(image, |image, op| apply(image, op))
    }
}

fn parse_op(name: &str, args: &Value) -> MediaResult<ImageOp> {
    match name {
        "blur" => Ok(ImageOp::Blur {
            amount: require_number(name, "amount", args)?,
        }),
        "sharpen" => Ok(ImageOp::Sharpen {
            amount: require_number(name, "amount", args)?,
        }),
        "pixelate" => Ok(ImageOp::Pixelate {
            amount: require_number(name, "amount", args)?.max(1.0) as u32,
        }),
        "brightness" => Ok(ImageOp::Brightness {
            delta: require_number(name, "delta", args)?,
        }),
        "contrast" => Ok(ImageOp::Contrast {
            delta: require_number(name, "delta", args)?,
        }),
        "gamma" => Ok(ImageOp::Gamma {
            value: require_number(name, "value", args)?,
        }),
        "colorize" => {
            let values = args
                .as_array()
                .filter(|a| a.len() == 3)
                .ok_or_else(|| MediaError::missing_parameter(name, "the \"r\", \"g\" and \"b\" parameters"))?;
            let mut channels = [0.0; 3];
            for (slot, value) in channels.iter_mut().zip(values) {
                *slot = as_number(value)
                    .ok_or_else(|| MediaError::missing_parameter(name, "the \"r\", \"g\" and \"b\" parameters"))?;
            }
            Ok(ImageOp::Colorize {
                r: channels[0],
                g: channels[1],
                b: channels[2],
            })
        }
        "greyscale" => Ok(ImageOp::Greyscale {
            enabled: require_bool(name, args)?,
        }),
        "invert" => Ok(ImageOp::Invert {
            enabled: require_bool(name, args)?,
        }),
        "crop" => {
            let width = field_u32(args, "width");
            let height = field_u32(args, "height");
            let (Some(width), Some(height)) = (width, height) else {
                return Err(MediaError::missing_parameter(name, "the \"width\" and \"height\" parameters"));
            };
            let origin = match (field_u32(args, "x"), field_u32(args, "y")) {
                (Some(x), Some(y)) => Some((x, y)),
                _ => None,
            };
            Ok(ImageOp::Crop {
                width,
                height,
                origin,
            })
        }
        "fit" => {
            let width = field_u32(args, "width");
            let height = field_u32(args, "height");
            if width.is_none() && height.is_none() {
                return Err(MediaError::missing_parameter(name, "either the \"width\" or \"height\" parameter"));
            }
            let position = match args.get("position").and_then(Value::as_str) {
                Some(raw) => Anchor::parse(raw).ok_or_else(|| {
                    MediaError::Validation(format!("Unknown fit position: \"{raw}\""))
                })?,
                None => Anchor::Center,
            };
            Ok(ImageOp::Fit {
                width,
                height,
                position,
            })
        }
        "resize" => {
            let width = field_u32(args, "width");
            let height = field_u32(args, "height");
            if width.is_none() && height.is_none() {
                return Err(MediaError::missing_parameter(name, "either the \"width\" or \"height\" parameter"));
            }
            Ok(ImageOp::Resize {
                width,
                height,
                keep_aspect_ratio: field_bool(args, "keepAspectRatio"),
                prevent_upsize: field_bool(args, "preventUpsize"),
            })
        }
        "flip" => {
            let direction = match args.as_str() {
                Some("horizontal") | Some("h") => FlipDirection::Horizontal,
                Some("vertical") | Some("v") => FlipDirection::Vertical,
                Some("both") => FlipDirection::Both,
                _ => return Err(MediaError::missing_parameter(name, "the \"direction\" parameter")),
            };
            Ok(ImageOp::Flip { direction })
        }
        "rotate" => {
            let angle = match as_number(args) {
                Some(angle) => angle,
                None => args
                    .get("angle")
                    .and_then(as_number)
                    .ok_or_else(|| MediaError::missing_parameter(name, "the \"angle\" parameter"))?,
            };
            let background = match args.get("backgroundColor").and_then(Value::as_str) {
                Some(raw) => codec::parse_color(raw)?,
                None => Rgba([255, 255, 255, 255]),
            };
            Ok(ImageOp::Rotate { angle, background })
        }
        other => Err(MediaError::UnsupportedFilter(other.to_string())),
    }
}

fn apply(image: DynamicImage, op: &ImageOp) -> DynamicImage {
    match op {
        ImageOp::Blur { amount } => image.blur(*amount as f32),
        ImageOp::Sharpen { amount } => image.unsharpen((*amount / 10.0) as f32, 1),
        ImageOp::Pixelate { amount } => codec::pixelate(&image, *amount),
        ImageOp::Brightness { delta } => codec::brightness(&image, *delta),
        ImageOp::Contrast { delta } => image.adjust_contrast(*delta as f32),
        ImageOp::Gamma { value } => codec::gamma(&image, *value),
        ImageOp::Colorize { r, g, b } => codec::colorize(&image, *r, *g, *b),
        ImageOp::Greyscale { enabled } => {
            if *enabled {
                image.grayscale()
            } else {
                image
            }
        }
        ImageOp::Invert { enabled } => {
            if *enabled {
                let mut image = image;
                image.invert();
                image
            } else {
                image
            }
        }
        ImageOp::Crop {
            width,
            height,
            origin,
        } => codec::crop(&image, *width, *height, *origin),
        ImageOp::Fit {
            width,
            height,
            position,
        } => {
            let w = width.or(*height).expect("validated at parse");
            let h = height.or(*width).expect("validated at parse");
            codec::fit(&image, w, h, *position)
        }
        ImageOp::Resize {
            width,
            height,
            keep_aspect_ratio,
            prevent_upsize,
        } => resize(&image, *width, *height, *keep_aspect_ratio, *prevent_upsize),
        ImageOp::Flip { direction } => match direction {
            FlipDirection::Horizontal => image.fliph(),
            FlipDirection::Vertical => image.flipv(),
            FlipDirection::Both => image.fliph().flipv(),
        },
        ImageOp::Rotate { angle, background } => codec::rotate(&image, *angle, *background),
    }
}

fn resize(
    image: &DynamicImage,
    width: Option<u32>,
    height: Option<u32>,
    keep_aspect_ratio: bool,
    prevent_upsize: bool,
) -> DynamicImage {
    let (w0, h0) = image.dimensions();

    if keep_aspect_ratio {
        return match (width, height) {
            (Some(w), None) => {
                if prevent_upsize {
                    codec::scale_to_width(image, w)
                } else {
                    let h = ((w as f64 * h0 as f64 / w0 as f64).round() as u32).max(1);
                    image.resize_exact(w, h, image::imageops::FilterType::Lanczos3)
                }
            }
            (None, Some(h)) => {
                if prevent_upsize {
                    codec::scale_to_height(image, h)
                } else {
                    let w = ((h as f64 * w0 as f64 / h0 as f64).round() as u32).max(1);
                    image.resize_exact(w, h, image::imageops::FilterType::Lanczos3)
                }
            }
            (Some(w), Some(h)) => {
                let (w, h) = if prevent_upsize {
                    (w.min(w0), h.min(h0))
                } else {
                    (w, h)
                };
                // fits within the box, aspect preserved
                image.resize(w, h, image::imageops::FilterType::Lanczos3)
            }
            (None, None) => unreachable!("validated at parse"),
        };
    }

    let mut w = width.unwrap_or(w0);
    let mut h = height.unwrap_or(h0);
    if prevent_upsize {
        w = w.min(w0);
        h = h.min(h0);
    }
    image.resize_exact(w, h, image::imageops::FilterType::Lanczos3)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn require_number(filter: &str, parameter: &str, args: &Value) -> MediaResult<f64> {
    as_number(args)
        .or_else(|| args.get(parameter).and_then(as_number))
        .ok_or_else(|| {
            MediaError::missing_parameter(filter, &format!("the \"{parameter}\" parameter"))
        })
}

fn require_bool(filter: &str, args: &Value) -> MediaResult<bool> {
    match args {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        _ => Err(MediaError::missing_parameter(filter, "the \"enabled\" flag")),
    }
}

fn field_u32(args: &Value, field: &str) -> Option<u32> {
    args.get(field).and_then(as_number).map(|n| n.max(0.0) as u32)
}

fn field_bool(args: &Value, field: &str) -> bool {
    match args.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, args: Value) -> (String, Value) {
        (name.to_string(), args)
    }

    fn test_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            w,
            h,
            Rgba([200, 100, 50, 255]),
        ))
    }

    #[test]
    fn unknown_filter_fails_before_processing() {
        let err = MacroProcessor::parse(&[entry("frobnicate", json!({}))]).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedFilter(name) if name == "frobnicate"));
    }

    #[test]
    fn crop_requires_both_dimensions() {
        let err = MacroProcessor::parse(&[entry("crop", json!({"width": 100}))]).unwrap_err();
        assert!(matches!(err, MediaError::MissingParameter { ref filter, .. } if filter == "crop"));
    }

    #[test]
    fn invalid_late_op_fails_whole_pipeline() {
        // the bad entry is last; parse still rejects everything up front
        let err = MacroProcessor::parse(&[
            entry("blur", json!(4)),
            entry("greyscale", json!(true)),
            entry("frobnicate", json!({})),
        ])
        .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedFilter(_)));
    }

    #[test]
    fn colorize_requires_three_channels() {
        let err = MacroProcessor::parse(&[entry("colorize", json!([10, 20]))]).unwrap_err();
        assert!(matches!(err, MediaError::MissingParameter { .. }));

        let processor =
            MacroProcessor::parse(&[entry("colorize", json!([10, 20, 30]))]).unwrap();
        assert_eq!(
            processor.ops()[0],
            ImageOp::Colorize {
                r: 10.0,
                g: 20.0,
                b: 30.0
            }
        );
    }

    #[test]
    fn resize_requires_some_dimension() {
        let err = MacroProcessor::parse(&[entry("resize", json!({}))]).unwrap_err();
        assert!(matches!(err, MediaError::MissingParameter { ref filter, .. } if filter == "resize"));
    }

    #[test]
    fn rotate_accepts_bare_angle_or_object() {
        let bare = MacroProcessor::parse(&[entry("rotate", json!(90))]).unwrap();
        assert!(matches!(bare.ops()[0], ImageOp::Rotate { angle, .. } if angle == 90.0));

        let with_background = MacroProcessor::parse(&[entry(
            "rotate",
            json!({"angle": 45, "backgroundColor": "#000000"}),
        )])
        .unwrap();
        assert!(matches!(
            with_background.ops()[0],
            ImageOp::Rotate { background, .. } if background == Rgba([0, 0, 0, 255])
        ));
    }

    #[test]
    fn crop_applies_requested_window() {
        let processor = MacroProcessor::parse(&[entry(
            "crop",
            json!({"width": 40, "height": 30, "x": 0, "y": 0}),
        )])
        .unwrap();
        let result = processor.process(test_image(100, 100));
        assert_eq!(result.dimensions(), (40, 30));
    }

    #[test]
    fn resize_with_aspect_and_upsize_guard() {
        let processor = MacroProcessor::parse(&[entry(
            "resize",
            json!({"width": 500, "keepAspectRatio": true, "preventUpsize": true}),
        )])
        .unwrap();
        // source is smaller than the target; upsize is prevented
        let result = processor.process(test_image(200, 100));
        assert_eq!(result.dimensions(), (200, 100));
    }

    #[test]
    fn resize_exact_when_aspect_unlocked() {
        let processor = MacroProcessor::parse(&[entry(
            "resize",
            json!({"width": 50, "height": 80}),
        )])
        .unwrap();
        let result = processor.process(test_image(200, 100));
        assert_eq!(result.dimensions(), (50, 80));
    }

    #[test]
    fn greyscale_false_is_a_no_op() {
        let processor = MacroProcessor::parse(&[entry("greyscale", json!(false))]).unwrap();
        let image = test_image(10, 10);
        let result = processor.process(image.clone());
        assert_eq!(result.to_rgba8(), image.to_rgba8());
    }

    #[test]
    fn ops_apply_in_order() {
        // crop to 60x60, then fit to 30x20: order matters for the result size
        let processor = MacroProcessor::parse(&[
            entry("crop", json!({"width": 60, "height": 60})),
            entry("fit", json!({"width": 30, "height": 20})),
        ])
        .unwrap();
        let result = processor.process(test_image(100, 100));
        assert_eq!(result.dimensions(), (30, 20));
    }

    #[test]
    fn flip_directions_parse() {
        for (raw, expected) in [
            ("horizontal", FlipDirection::Horizontal),
            ("v", FlipDirection::Vertical),
            ("both", FlipDirection::Both),
        ] {
            let processor = MacroProcessor::parse(&[entry("flip", json!(raw))]).unwrap();
            assert_eq!(processor.ops()[0], ImageOp::Flip { direction: expected });
        }
    }

    #[test]
    fn fit_uses_missing_dimension_from_the_other() {
        let processor =
            MacroProcessor::parse(&[entry("fit", json!({"width": 40}))]).unwrap();
        let result = processor.process(test_image(100, 60));
        assert_eq!(result.dimensions(), (40, 40));
    }
}
