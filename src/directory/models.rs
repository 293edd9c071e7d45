/// Directory data model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One directory in the media tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDirectory {
    pub id: i64,
    /// Display name; falls back to a title-cased slug when absent
    pub name: Option<String>,
    pub slug: String,
    /// None for root-level directories
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MediaDirectory {
    /// Display name, derived from the slug when none was set
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => title_case_slug(&self.slug),
        }
    }
}

/// `holiday-photos` -> `Holiday Photos`
fn title_case_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Slugify a display name: lowercase, non-alphanumerics collapsed to `-`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}
