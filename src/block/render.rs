//! Minimal HTML rendering helpers
//!
//! Templating lives outside this crate. Blocks only produce escaped fragments
//! so that a value can always be displayed without external context.

/// Escapes text for inclusion in HTML
pub fn escape_html(s: &str) -> String {
    let mut output = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            c => output.push(c),
        }
    }
    output
}

/// ` class="..."` for a block's classname, or nothing
pub fn css_class_attr(classname: Option<&str>) -> String {
    match classname {
        Some(name) if !name.is_empty() => format!(" class=\"{}\"", escape_html(name)),
        _ => String::new(),
    }
}
