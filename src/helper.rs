use std::{fs, path::Path};

use log::{debug, error, trace};

use crate::{Document, NotesError, Result};

/// Helper method to load a single document from file
pub fn load_document_from_file<T: Document>(path: &Path) -> Result<T> {
    debug!("Loading document from file: {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open document file {}: {}", path.display(), e);
        NotesError::Io(e)
    })?;

    let doc: T = serde_json::from_str(&content)?;

    if doc.id().is_empty() {
        let error_msg = format!("Document from {} has an empty ID", path.display());
        error!("{}", error_msg);
        return Err(NotesError::ApplicationError { message: error_msg });
    }

    trace!("Successfully loaded document: {}", doc.id());
    Ok(doc)
}

// Helper method for parsing comma-separated lists such as tags
pub fn parse_tags(tags: Option<String>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Drops HTML tags and decodes the handful of entities a rich-text editor
/// emits, leaving the readable text.
pub fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;

    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_len` characters of the readable text, with an ellipsis when cut.
pub fn content_preview(body: &str, max_len: usize) -> String {
    let text = strip_html(body);
    if text.chars().count() <= max_len {
        return text;
    }
    let cut: String = text.chars().take(max_len).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup() {
        assert_eq!(
            strip_html("<p>Milk, <b>eggs</b></p><p>bread&nbsp;&amp; jam</p>"),
            "Milk, eggs bread & jam"
        );
        assert_eq!(strip_html("plain text"), "plain text");
    }

    #[test]
    fn parses_tags() {
        assert_eq!(
            parse_tags(Some(" work, ,home ".into())),
            vec!["work".to_string(), "home".to_string()]
        );
        assert!(parse_tags(None).is_empty());
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(content_preview("<p>héllo wörld</p>", 5), "héllo...");
        assert_eq!(content_preview("short", 10), "short");
    }
}
