/// Render-time variant selection and markup assembly
///
/// Chooses which derived files a client should receive: modern formats first
/// in the source list, a broadly-compatible fallback for the base tag, and a
/// simplified single-tag mode for email HTML.

pub mod html;

use crate::{
    config::PresenterConfig,
    error::{MediaError, MediaResult},
    media::{MediaAsset, MediaKind},
};
use std::collections::HashMap;

/// Preferred order for `<source>` entries: modern formats first
pub const MEDIA_LOAD_ORDER: &[&str] =
    &["image/webp", "image/png", "image/gif", "image/jpeg"];

/// Preference order for the broadly-compatible base image
pub const MEDIA_FALLBACK_ORDER: &[&str] = &["image/png", "image/gif", "image/jpeg"];

/// Smallest acceptable fallback width for ordinary web pages
pub const IDEAL_WEB_FALLBACK_WIDTH: u32 = 1000;

/// Smallest acceptable fallback width for email-safe HTML
pub const IDEAL_EMAIL_FALLBACK_WIDTH: u32 = 600;

/// Output flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentStyle {
    /// Full `<picture>` markup with per-format source sets
    #[default]
    Web,
    /// Single `<img>` tag, for email clients
    Email,
}

/// One selectable rendition of an image at a known width
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub filename: String,
    pub width: Option<u32>,
}

/// Assembles markup and URLs for assets
#[derive(Clone)]
pub struct MediaPresenter {
    config: PresenterConfig,
}

impl MediaPresenter {
    pub fn new(config: PresenterConfig) -> Self {
        Self { config }
    }

    /// Web-accessible URL for a stored filename
    pub fn file_url(&self, filename: &str, external: bool) -> String {
        let path = format!("{}/{}", self.config.web_path.trim_end_matches('/'), filename);
        if external {
            format!("{}{}", self.config.public_url.trim_end_matches('/'), path)
        } else {
            path
        }
    }

    /// Group an image's variants by MIME type
    pub fn image_sources(
        &self,
        asset: &MediaAsset,
        external: bool,
    ) -> MediaResult<HashMap<String, Vec<SourceCandidate>>> {
        if asset.kind != MediaKind::Image {
            return Err(MediaError::WrongMediaType(format!(
                "Expected an image, got {}",
                asset.kind.as_str()
            )));
        }

        let mut sources: HashMap<String, Vec<SourceCandidate>> = HashMap::new();
        for variant in asset.variants() {
            sources
                .entry(variant.mime.clone())
                .or_default()
                .push(SourceCandidate {
                    filename: self.file_url(&variant.filename, external),
                    width: variant.width,
                });
        }
        Ok(sources)
    }

    /// Select the base-tag source: the first broadly-compatible MIME type
    /// with a candidate, preferring the smallest variant at or above
    /// `ideal_min_width`. A width-less candidate is chosen only when no
    /// sized candidate qualifies. Returns an empty string (with a warning)
    /// when nothing compatible exists.
    pub fn fallback_source(
        &self,
        asset: &MediaAsset,
        sources: &HashMap<String, Vec<SourceCandidate>>,
        ideal_min_width: u32,
    ) -> String {
        for mime in MEDIA_FALLBACK_ORDER {
            let Some(candidates) = sources.get(*mime) else {
                continue;
            };

            let mut best: Option<&SourceCandidate> = None;
            for candidate in candidates {
                match candidate.width {
                    None => {
                        if best.map_or(true, |b| b.width.is_none()) {
                            best = Some(candidate);
                        }
                    }
                    Some(width) if width >= ideal_min_width => {
                        let smaller = best
                            .map_or(true, |b| b.width.map_or(true, |bw| width < bw));
                        if smaller {
                            best = Some(candidate);
                        }
                    }
                    Some(_) => {}
                }
            }

            if let Some(best) = best {
                return best.filename.clone();
            }
        }

        tracing::warn!(
            "Image \"{}\" is missing an appropriate fallback format amongst {:?}",
            asset.slug,
            sources.keys().collect::<Vec<_>>()
        );
        String::new()
    }

    /// Render an asset to markup appropriate for its kind
    pub fn render(
        &self,
        asset: &MediaAsset,
        style: PresentStyle,
        external: bool,
    ) -> MediaResult<String> {
        match asset.kind {
            MediaKind::Image => self.render_image(asset, style, external),
            MediaKind::Audio => self.render_audio(asset, external),
            MediaKind::Document => Ok(self.render_document(asset, external)),
        }
    }

    /// `<picture>` markup with one source set per MIME type, modern formats
    /// first, plus a fallback base image. Email style gets the base tag only.
    fn render_image(
        &self,
        asset: &MediaAsset,
        style: PresentStyle,
        external: bool,
    ) -> MediaResult<String> {
        let sources = self.image_sources(asset, external)?;

        let ideal_width = match style {
            PresentStyle::Web => IDEAL_WEB_FALLBACK_WIDTH,
            PresentStyle::Email => IDEAL_EMAIL_FALLBACK_WIDTH,
        };
        let alt = asset.caption.clone().unwrap_or_else(|| asset.name.clone());
        let img_tag = html::img(&[
            ("src", self.fallback_source(asset, &sources, ideal_width)),
            ("alt", alt),
        ]);

        if style == PresentStyle::Email {
            return Ok(img_tag);
        }

        let mut markup = String::from("<picture>");
        for mime in MEDIA_LOAD_ORDER {
            let Some(candidates) = sources.get(*mime) else {
                continue;
            };
            markup.push_str(&format!(
                "<source {}></source>",
                html::attributes(&[
                    ("type", mime.to_string()),
                    ("srcset", html::srcset(candidates)),
                ])
            ));
        }
        markup.push_str(&img_tag);
        markup.push_str("</picture>");
        Ok(markup)
    }

    /// `<audio>` markup with one source per encoded variant
    fn render_audio(&self, asset: &MediaAsset, external: bool) -> MediaResult<String> {
        if asset.kind != MediaKind::Audio {
            return Err(MediaError::WrongMediaType(format!(
                "Expected audio, got {}",
                asset.kind.as_str()
            )));
        }

        let mut sources: Vec<(String, String)> = Vec::new();
        for variant in asset.variants() {
            let url = self.file_url(&variant.filename, external);
            match sources.iter_mut().find(|(mime, _)| *mime == variant.mime) {
                Some(entry) => entry.1 = url,
                None => sources.push((variant.mime, url)),
            }
        }

        Ok(html::audio(
            &sources,
            &[("controls", "controls".to_string())],
            "Audio Not Supported",
        ))
    }

    /// Link to the canonical stored file
    fn render_document(&self, asset: &MediaAsset, external: bool) -> String {
        let href = self.file_url(&asset.filename, external);
        let content = asset.caption.clone().unwrap_or_else(|| asset.name.clone());
        html::anchor(
            &content,
            &[("target", "_blank".to_string()), ("href", href)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn presenter() -> MediaPresenter {
        MediaPresenter::new(PresenterConfig {
            web_path: "/files".to_string(),
            public_url: "http://media.test".to_string(),
        })
    }

    fn image_asset() -> MediaAsset {
        MediaAsset {
            id: 1,
            name: "Sunset".to_string(),
            slug: "sunset".to_string(),
            filename: format!("{}.jpg", "ab".repeat(32)),
            kind: MediaKind::Image,
            author: None,
            caption: Some("A sunset".to_string()),
            description: None,
            stored_variants: Vec::new(),
            directory_id: None,
            head_version: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn candidates(entries: &[(&str, Option<u32>)]) -> Vec<SourceCandidate> {
        entries
            .iter()
            .map(|(filename, width)| SourceCandidate {
                filename: filename.to_string(),
                width: *width,
            })
            .collect()
    }

    #[test]
    fn fallback_picks_smallest_at_or_above_minimum() {
        let presenter = presenter();
        let asset = image_asset();
        let mut sources = HashMap::new();
        sources.insert(
            "image/jpeg".to_string(),
            candidates(&[("x", Some(320)), ("y", Some(960))]),
        );

        assert_eq!(presenter.fallback_source(&asset, &sources, 600), "y");
    }

    #[test]
    fn fallback_empty_when_nothing_qualifies() {
        let presenter = presenter();
        let asset = image_asset();
        let mut sources = HashMap::new();
        sources.insert(
            "image/jpeg".to_string(),
            candidates(&[("x", Some(320)), ("y", Some(960))]),
        );

        // nothing at >= 1200 and no width-less candidate
        assert_eq!(presenter.fallback_source(&asset, &sources, 1200), "");
    }

    #[test]
    fn fallback_uses_original_when_no_sized_candidate_qualifies() {
        let presenter = presenter();
        let asset = image_asset();
        let mut sources = HashMap::new();
        sources.insert(
            "image/jpeg".to_string(),
            candidates(&[("x", Some(320)), ("orig", None)]),
        );

        assert_eq!(presenter.fallback_source(&asset, &sources, 1200), "orig");
    }

    #[test]
    fn fallback_prefers_png_over_jpeg() {
        let presenter = presenter();
        let asset = image_asset();
        let mut sources = HashMap::new();
        sources.insert("image/jpeg".to_string(), candidates(&[("j", Some(1000))]));
        sources.insert("image/png".to_string(), candidates(&[("p", Some(1000))]));
        // webp is never a fallback
        sources.insert("image/webp".to_string(), candidates(&[("w", Some(1000))]));

        assert_eq!(presenter.fallback_source(&asset, &sources, 600), "p");
    }

    #[test]
    fn picture_markup_orders_modern_formats_first() {
        let presenter = presenter();
        let mut asset = image_asset();
        asset.add_variant("a.webp".to_string(), Some(320), "image/webp".to_string());
        asset.add_variant("b.jpg".to_string(), Some(1280), "image/jpeg".to_string());

        let markup = presenter
            .render(&asset, PresentStyle::Web, false)
            .unwrap();

        assert!(markup.starts_with("<picture>"));
        let webp_at = markup.find("image/webp").unwrap();
        let jpeg_at = markup.find("image/jpeg").unwrap();
        assert!(webp_at < jpeg_at);
        assert!(markup.contains("/files/a.webp 320w"));
        assert!(markup.contains("alt=\"A sunset\""));
        assert!(markup.ends_with("</picture>"));
    }

    #[test]
    fn email_style_is_a_bare_img() {
        let presenter = presenter();
        let mut asset = image_asset();
        asset.add_variant("b.jpg".to_string(), Some(640), "image/jpeg".to_string());

        let markup = presenter
            .render(&asset, PresentStyle::Email, false)
            .unwrap();

        assert!(markup.starts_with("<img "));
        assert!(!markup.contains("<picture>"));
        // the 640 jpeg satisfies the email ideal width of 600
        assert!(markup.contains("src=\"/files/b.jpg\""));
    }

    #[test]
    fn external_urls_carry_the_public_base() {
        let presenter = presenter();
        let asset = image_asset();

        let markup = presenter.render(&asset, PresentStyle::Web, true).unwrap();
        assert!(markup.contains(&format!("http://media.test/files/{}", asset.filename)));
    }

    #[test]
    fn audio_markup_lists_each_encoding() {
        let presenter = presenter();
        let mut asset = image_asset();
        asset.kind = MediaKind::Audio;
        asset.filename = format!("{}.mp3", "cd".repeat(32));
        asset.add_variant("alt.ogg".to_string(), None, "audio/ogg".to_string());

        let markup = presenter.render(&asset, PresentStyle::Web, false).unwrap();
        assert!(markup.starts_with("<audio "));
        assert!(markup.contains("type=\"audio/ogg\""));
        assert!(markup.contains("type=\"audio/mpeg\""));
        assert!(markup.contains("Audio Not Supported"));
    }

    #[test]
    fn document_renders_as_link() {
        let presenter = presenter();
        let mut asset = image_asset();
        asset.kind = MediaKind::Document;
        asset.filename = format!("{}.pdf", "ef".repeat(32));
        asset.caption = None;

        let markup = presenter.render(&asset, PresentStyle::Web, false).unwrap();
        assert!(markup.starts_with("<a "));
        assert!(markup.contains("target=\"_blank\""));
        assert!(markup.contains(&asset.filename));
        assert!(markup.contains(">Sunset</a>"));
    }
}
