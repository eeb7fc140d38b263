//! Auto-generated directory index pages

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::AssetError;

/// One immediate child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
}

impl ListingEntry {
    /// Link target, with a trailing `/` for directories
    pub fn href(&self) -> String {
        let encoded = urlencoding::encode(&self.name);
        if self.is_dir {
            format!("{encoded}/")
        } else {
            encoded.into_owned()
        }
    }
}

/// Read the immediate entries of `dir`, sorted by name.
///
/// Entries are classified in parallel; symlinks are followed, and an entry
/// whose target cannot be stat'ed is listed as a plain file.
pub fn read_entries(dir: &Path) -> std::io::Result<Vec<ListingEntry>> {
    let raw = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;

    let mut entries: Vec<ListingEntry> = raw
        .par_iter()
        .map(|entry| ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: fs::metadata(entry.path())
                .map(|meta| meta.is_dir())
                .unwrap_or(false),
        })
        .collect();

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Read and render `dir` on the blocking pool
pub async fn list_directory(dir: PathBuf) -> Result<String, AssetError> {
    let target = dir.clone();
    let entries = tokio::task::spawn_blocking(move || read_entries(&target))
        .await
        .map_err(|e| AssetError::ReadFailure {
            path: dir.clone(),
            source: std::io::Error::other(e),
        })?
        .map_err(|source| AssetError::ReadFailure {
            path: dir.clone(),
            source,
        })?;

    Ok(render_index(&entries))
}

/// Render the HTML index page
pub fn render_index(entries: &[ListingEntry]) -> String {
    let items: Vec<String> = entries
        .iter()
        .map(|entry| {
            format!(
                r#"<li><a href="{}">{}</a></li>"#,
                escape_html(&entry.href()),
                escape_html(&entry.name)
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>Directory Index</title>
    <style>
      body {{ font-family: sans-serif; margin: 2em; }}
      a {{ color: #0066cc; text-decoration: none; }}
      a:hover {{ text-decoration: underline; }}
      li {{ margin: 0.5em 0; }}
    </style>
  </head>
  <body>
    <h1>Directory Index</h1>
    <ul>
      {}
    </ul>
  </body>
</html>
"#,
        items.join("\n      ")
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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
