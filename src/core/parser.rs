// src/core/parser.rs — Tagged-field extraction from model replies

/// Return the trimmed text between the first `<tag>` and the following
/// `</tag>`. Missing or blank fields yield `None`.
pub fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let start = text.find(&open)? + open.len();
    let len = text[start..].find(&close)?;
    let inner = text[start..start + len].trim();

    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}
