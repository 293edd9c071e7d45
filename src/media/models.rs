/// Media asset data models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Extension to (MIME type, kind) map for everything the service accepts
pub const EXTENSION_MAP: &[(&str, &str, MediaKind)] = &[
    ("webp", "image/webp", MediaKind::Image),
    ("jpg", "image/jpeg", MediaKind::Image),
    ("jpeg", "image/jpeg", MediaKind::Image),
    ("png", "image/png", MediaKind::Image),
    ("gif", "image/gif", MediaKind::Image),
    ("pdf", "application/pdf", MediaKind::Document),
    ("mp3", "audio/mpeg", MediaKind::Audio),
    ("m4a", "audio/m4a", MediaKind::Audio),
    ("ogg", "audio/ogg", MediaKind::Audio),
    ("ogx", "audio/ogg", MediaKind::Audio),
    ("mpga", "audio/mpeg", MediaKind::Audio),
    ("aif", "audio/aiff", MediaKind::Audio),
    ("wav", "audio/wav", MediaKind::Audio),
];

/// What sort of file an asset holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Document,
    Audio,
}

impl MediaKind {
    /// Kind for a file extension, None when the extension is not accepted
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        EXTENSION_MAP
            .iter()
            .find(|(e, _, _)| *e == ext)
            .map(|(_, _, kind)| *kind)
    }

    /// Integer column representation
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(MediaKind::Image),
            1 => Some(MediaKind::Document),
            2 => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            MediaKind::Image => 0,
            MediaKind::Document => 1,
            MediaKind::Audio => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Document => "Document",
            MediaKind::Audio => "Audio",
        }
    }
}

/// MIME type for a file extension
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    EXTENSION_MAP
        .iter()
        .find(|(e, _, _)| *e == ext)
        .map(|(_, mime, _)| *mime)
}

/// One derived file: resized and/or re-encoded at a specific width.
///
/// The serialized shape `{filename, width, mime}` is stable; backup and
/// export tooling reads it across process boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub filename: String,
    /// None means original size
    pub width: Option<u32>,
    pub mime: String,
}

/// One logical media file with its variants and placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: i64,
    pub name: String,
    pub slug: String,
    /// Content-addressed: `<sha256-hex>.<extension>`
    pub filename: String,
    pub kind: MediaKind,
    pub author: Option<String>,
    pub caption: Option<String>,
    pub description: Option<String>,
    /// Stored variants; the original is not stored here but is reported by
    /// `variants()`
    pub stored_variants: Vec<Variant>,
    pub directory_id: Option<i64>,
    /// None for the head record; historical versions point at the head's id
    pub head_version: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MediaAsset {
    /// Extension of the stored file
    pub fn extension(&self) -> &str {
        self.filename.rsplit('.').next().unwrap_or("")
    }

    /// MIME type of the stored file
    pub fn mime_type(&self) -> Option<&'static str> {
        mime_for_extension(self.extension())
    }

    /// Whether this record is the current version of its chain
    pub fn is_head(&self) -> bool {
        self.head_version.is_none()
    }

    /// The full variant list: every stored variant plus the original file as
    /// a width-less entry.
    pub fn variants(&self) -> Vec<Variant> {
        let mut variants = self.stored_variants.clone();
        variants.push(Variant {
            filename: self.filename.clone(),
            width: None,
            mime: self.mime_type().unwrap_or("application/octet-stream").to_string(),
        });
        variants
    }

    /// Append a variant record. The (width, mime) pair is expected to be
    /// unique within the asset; callers check `has_variant` first.
    pub fn add_variant(&mut self, filename: String, width: Option<u32>, mime: String) {
        self.stored_variants.push(Variant {
            filename,
            width,
            mime,
        });
    }

    /// True when a variant exists at this width. A None `desired_mime`
    /// matches any MIME type.
    pub fn has_variant(&self, width: Option<u32>, desired_mime: Option<&str>) -> bool {
        self.variants().iter().any(|v| {
            v.width == width && desired_mime.map_or(true, |mime| v.mime == mime)
        })
    }

    /// Drop all stored variants (used when a new version replaces the file)
    pub fn clear_variants(&mut self) {
        self.stored_variants.clear();
    }

    /// Successor name for a cloned asset: `Photo` -> `Photo 2`,
    /// `Photo 2` -> `Photo 3`
    pub fn next_name(&self) -> String {
        bump_trailing_number(&self.name, ' ')
    }

    /// Successor slug for a cloned asset: `photo` -> `photo-2`
    pub fn next_slug(&self) -> String {
        bump_trailing_number(&self.slug, '-')
    }
}

fn bump_trailing_number(value: &str, separator: char) -> String {
    let digits_at = value
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + value[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);

    let (prefix, digits) = value.split_at(digits_at.min(value.len()));
    if digits.is_empty() {
        format!("{value}{separator}2")
    } else {
        let next = digits.parse::<u64>().map(|n| n + 1).unwrap_or(2);
        format!("{prefix}{next}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_asset() -> MediaAsset {
        MediaAsset {
            id: 1,
            name: "Sunset".to_string(),
            slug: "sunset".to_string(),
            filename: format!("{}.jpg", "ab".repeat(32)),
            kind: MediaKind::Image,
            author: None,
            caption: None,
            description: None,
            stored_variants: Vec::new(),
            directory_id: None,
            head_version: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn variants_always_include_original() {
        let asset = test_asset();
        let variants = asset.variants();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].filename, asset.filename);
        assert_eq!(variants[0].width, None);
        assert_eq!(variants[0].mime, "image/jpeg");
    }

    #[test]
    fn has_variant_matches_width_and_mime() {
        let mut asset = test_asset();
        asset.add_variant("aa.webp".to_string(), Some(320), "image/webp".to_string());

        assert!(asset.has_variant(Some(320), Some("image/webp")));
        assert!(asset.has_variant(Some(320), None));
        assert!(!asset.has_variant(Some(320), Some("image/jpeg")));
        assert!(!asset.has_variant(Some(640), None));
        // the implicit original entry
        assert!(asset.has_variant(None, Some("image/jpeg")));
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(MediaKind::from_extension("PNG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_extension("mp3"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_extension("pdf"), Some(MediaKind::Document));
        assert_eq!(MediaKind::from_extension("exe"), None);
    }

    #[test]
    fn name_and_slug_succession() {
        let mut asset = test_asset();
        assert_eq!(asset.next_name(), "Sunset 2");
        assert_eq!(asset.next_slug(), "sunset-2");

        asset.name = "Sunset 2".to_string();
        asset.slug = "sunset-2".to_string();
        assert_eq!(asset.next_name(), "Sunset 3");
        assert_eq!(asset.next_slug(), "sunset-3");
    }

    #[test]
    fn variant_record_shape_is_stable() {
        let variant = Variant {
            filename: "aa.webp".to_string(),
            width: Some(320),
            mime: "image/webp".to_string(),
        };
        let json = serde_json::to_value(&variant).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"filename": "aa.webp", "width": 320, "mime": "image/webp"})
        );

        let original: Variant = serde_json::from_value(
            serde_json::json!({"filename": "bb.jpg", "width": null, "mime": "image/jpeg"}),
        )
        .unwrap();
        assert_eq!(original.width, None);
    }
}
