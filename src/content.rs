use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{SiteError, SiteResult};

/// One file to upload to the content bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentObject {
    /// object key, `/` separated and relative to the content root.
    pub key: String,
    pub source: PathBuf,
    pub content_type: Option<String>,
}

/// walks `root` and returns every file in it, sorted by key.
pub fn crawl(root: &Path) -> SiteResult<Vec<ContentObject>> {
    if !root.is_dir() {
        return Err(SiteError::Io(format!("Content path {} is not a directory", root.display())));
    }
    let mut out = vec![];
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| SiteError::Io(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| SiteError::Io(e.to_string()))?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        debug!("Found {key}");
        out.push(ContentObject {
            key,
            source: entry.path().to_path_buf(),
            content_type: None,
        });
    }
    out.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(out)
}
