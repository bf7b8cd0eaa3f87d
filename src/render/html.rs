//! HTML escaping and document assembly.

use std::fmt::Write;

use crate::descriptor::page::{MetaTag, ResolvedPage, ScriptTag};

const INDENT: &str = "\n    ";

/// Escape `& < > " '` for use in text content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// `key="value"` pairs separated by spaces, values escaped.
pub fn attributes(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!(r#"{key}="{}""#, escape_html(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn meta_tag(meta: &MetaTag) -> String {
    match &meta.property {
        Some(property) => format!(
            r#"<meta property="{}" content="{}">"#,
            escape_html(property),
            escape_html(&meta.content)
        ),
        None => format!(
            r#"<meta name="{}" content="{}">"#,
            escape_html(meta.name.as_deref().unwrap_or_default()),
            escape_html(&meta.content)
        ),
    }
}

/// Script tag. Inline content is inserted verbatim.
pub fn script_tag(script: &ScriptTag) -> String {
    let mut attrs = Vec::new();
    if let Some(src) = &script.src {
        attrs.push(format!(r#"src="{}""#, escape_html(src)));
    }
    if script.is_async {
        attrs.push("async".to_string());
    }
    if script.defer {
        attrs.push("defer".to_string());
    }
    if let Some(kind) = &script.kind {
        attrs.push(format!(r#"type="{}""#, escape_html(kind)));
    }
    let content = script.content.as_deref().unwrap_or_default();
    if attrs.is_empty() {
        format!("<script>{content}</script>")
    } else {
        format!("<script {}>{content}</script>", attrs.join(" "))
    }
}

fn with_space(attrs: String) -> String {
    if attrs.is_empty() {
        attrs
    } else {
        format!(" {attrs}")
    }
}

/// Assemble the full document around already-rendered `content`.
///
/// `body_scripts` follow the root element, in order.
pub fn document(page: &ResolvedPage, content: &str, body_scripts: &[ScriptTag]) -> String {
    let mut head = String::new();
    for meta in &page.meta {
        head.push_str(INDENT);
        head.push_str(&meta_tag(meta));
    }
    for link in &page.links {
        let _ = write!(head, "{INDENT}<link {}>", attributes(link));
    }
    if !page.styles.is_empty() {
        let _ = write!(head, "{INDENT}<style>{}</style>", page.styles);
    }
    for script in &page.scripts {
        head.push_str(INDENT);
        head.push_str(&script_tag(script));
    }

    let mut tail = String::new();
    for script in body_scripts {
        tail.push_str(INDENT);
        tail.push_str(&script_tag(script));
    }

    format!(
        r#"{doctype}
<html lang="{lang}"{html_attrs}>
  <head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>{head}
  </head>
  <body{body_attrs}>
    <div id="{root_id}">{content}</div>{tail}
  </body>
</html>"#,
        doctype = page.doctype,
        lang = escape_html(&page.lang),
        html_attrs = with_space(attributes(&page.html_attributes)),
        title = escape_html(&page.title),
        body_attrs = with_space(attributes(&page.body_attributes)),
        root_id = escape_html(&page.root_id),
    )
}
