/// Markup helpers for the presenter
use crate::presenter::SourceCandidate;

/// Escape a value for use inside an HTML attribute or text node
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a `key="value"` attribute list, preserving insertion order
pub fn attributes(attrs: &[(&str, String)]) -> String {
    attrs
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", key, escape(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders an image tag
pub fn img(attrs: &[(&str, String)]) -> String {
    format!("<img {} />", attributes(attrs))
}

/// Renders an audio element with one source per encoding
pub fn audio(sources: &[(String, String)], attrs: &[(&str, String)], fallback_text: &str) -> String {
    let mut out = format!("<audio {}>", attributes(attrs));
    for (mime, src) in sources {
        out.push_str(&format!(
            "<source {}>",
            attributes(&[("src", src.clone()), ("type", mime.clone())])
        ));
    }
    out.push_str(fallback_text);
    out.push_str("</audio>");
    out
}

/// Renders a link to a document
pub fn anchor(content: &str, attrs: &[(&str, String)]) -> String {
    format!("<a {}>{}</a>", attributes(attrs), escape(content))
}

/// Composes the `srcset` attribute from a candidate list
pub fn srcset(sources: &[SourceCandidate]) -> String {
    sources
        .iter()
        .map(|source| {
            let mut src = escape(&source.filename);
            if let Some(width) = source.width {
                src.push_str(&format!(" {}w", width));
            }
            src
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_attribute_values() {
        assert_eq!(escape("a\"b<c>&"), "a&quot;b&lt;c&gt;&amp;");
    }

    #[test]
    fn srcset_annotates_widths() {
        let sources = vec![
            SourceCandidate {
                filename: "/files/a.webp".to_string(),
                width: Some(320),
            },
            SourceCandidate {
                filename: "/files/b.webp".to_string(),
                width: None,
            },
        ];
        assert_eq!(srcset(&sources), "/files/a.webp 320w, /files/b.webp");
    }

    #[test]
    fn audio_includes_sources_and_fallback() {
        let markup = audio(
            &[("audio/mpeg".to_string(), "/files/a.mp3".to_string())],
            &[("controls", "controls".to_string())],
            "Audio Not Supported",
        );
        assert_eq!(
            markup,
            "<audio controls=\"controls\"><source src=\"/files/a.mp3\" type=\"audio/mpeg\">Audio Not Supported</audio>"
        );
    }
}
