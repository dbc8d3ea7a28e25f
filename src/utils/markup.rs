//! Message markup helpers.
//!
//! Messages use a small HTML vocabulary: `<b>`, `<i>` and literal newlines.
//! Page text is escaped before it is wrapped.

/// Escape the characters HTML parse mode treats as markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wrap already-escaped text in bold markers.
pub fn bold(text: &str) -> String {
    format!("<b>{text}</b>")
}

/// Wrap already-escaped text in italic markers.
pub fn italic(text: &str) -> String {
    format!("<i>{text}</i>")
}
