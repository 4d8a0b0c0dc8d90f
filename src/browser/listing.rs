use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, Utc};
use minijinja::Environment;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

const LISTING_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>{{ title }}</title></head>
<body>
<h2>Index of {{ path }}</h2>
<table>
<tr><th>Name</th><th>Size</th><th>Modified</th></tr>
{% if parent %}<tr><td><a href="{{ parent|safe }}">..</a></td><td>---</td><td></td></tr>
{% endif %}{% for row in rows %}<tr><td><a href="{{ row.href|safe }}">{{ row.name }}{% if row.is_dir %}/{% endif %}</a></td><td>{{ row.size }}</td><td>{{ row.mtime }}</td></tr>
{% endfor %}</table>
</body>
</html>
"#;

/// One directory entry as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    /// Seconds since the Unix epoch, when the platform reports it
    pub modified: Option<u64>,
}

/// Bytes below 1024, otherwise KiB with one decimal. Directories show `---`.
pub fn human_size(size: u64, is_dir: bool) -> String {
    if is_dir {
        "---".to_string()
    } else if size < 1024 {
        format!("{size} B")
    } else {
        format!("{:.1} KiB", size as f64 / 1024.0)
    }
}

fn format_mtime(secs: Option<u64>) -> String {
    secs.and_then(|s| DateTime::<Utc>::from_timestamp(s as i64, 0))
        .map(|utc| utc.with_timezone(&Local).format("%d %b %H:%M").to_string())
        .unwrap_or_default()
}

fn encode_segments(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Read a directory, directories first, then by name.
pub(crate) fn read_entries(dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(entry = %name, error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        let modified = meta
            .modified()
            .ok()
            .and_then(|t: SystemTime| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        entries.push(DirEntryInfo {
            name,
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified,
        });
    }
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

/// `url_path` is the listed directory's URL (prefix included, no trailing `/`).
pub(crate) fn render_json(url_path: &str, entries: &[DirEntryInfo]) -> Value {
    json!({ "path": url_path, "entries": entries })
}

/// Render the HTML listing. `at_root` suppresses the `..` row.
///
/// Links are percent-encoded before rendering and inserted unescaped;
/// names and paths go through the template's HTML escaping.
pub(crate) fn render_html(
    url_path: &str,
    at_root: bool,
    entries: &[DirEntryInfo],
) -> Result<String, minijinja::Error> {
    let parent = if at_root {
        None
    } else {
        let parent = url_path.rsplit_once('/').map_or("", |(p, _)| p);
        Some(encode_segments(if parent.is_empty() { "/" } else { parent }))
    };
    let base = encode_segments(url_path.trim_end_matches('/'));
    let rows: Vec<Value> = entries
        .iter()
        .map(|e| {
            json!({
                "name": e.name,
                "href": format!("{base}/{}", urlencoding::encode(&e.name)),
                "is_dir": e.is_dir,
                "size": human_size(e.size, e.is_dir),
                "mtime": format_mtime(e.modified),
            })
        })
        .collect();

    let mut env = Environment::new();
    env.add_template("listing.html", LISTING_TEMPLATE)?;
    let tmpl = env.get_template("listing.html")?;
    tmpl.render(json!({
        "title": format!("Files: {url_path}"),
        "path": url_path,
        "parent": parent,
        "rows": rows,
    }))
}
