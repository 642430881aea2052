//! Browser page that connects to either transport and shows the stream.

use std::path::Path;

const TEMPLATE: &str = include_str!("viewer.html");
const TITLE: &str = "Streaming Log Viewer";

/// Render the viewer for `log_path`, with stream URLs under `base_path`.
pub fn render(log_path: &Path, base_path: &str) -> String {
    let log_file = log_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| log_path.display().to_string());

    TEMPLATE
        .replace("{{title}}", TITLE)
        .replace("{{log_file}}", &escape_html(&log_file))
        .replace("{{base_path}}", &escape_html(base_path.trim_end_matches('/')))
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}
