//! Embedded filesystem tool server (spec.md §4.4): one concrete Remote Tool
//! Session transport the process can host in-process. Path inputs are
//! normalized server-side rather than rejected outright:
//!
//! - `"/"`, `""`, `"."` -> root
//! - a leading `/` is stripped
//! - `..` segments that would escape the root are clamped to the root
//! - returned paths use forward slashes, even on Windows
//!
//! This is the concrete grounding for spec.md §8 property 8 ("path
//! normalization ... `..` cannot escape").

use std::path::{Component, Path, PathBuf};

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::fs;

/// Normalize a client-supplied path against `root`, clamping any attempt to
/// escape it rather than erroring. Always returns a path that is a
/// descendant of `root` (or `root` itself).
pub fn normalize_path(root: &Path, requested: &str) -> PathBuf {
    if requested.is_empty() || requested == "/" || requested == "." {
        return root.to_path_buf();
    }

    let stripped = requested.trim_start_matches('/');
    let mut stack: Vec<&str> = Vec::new();
    for component in Path::new(stripped).components() {
        match component {
            Component::Normal(part) => stack.push(part.to_str().unwrap_or("")),
            Component::ParentDir => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut resolved = root.to_path_buf();
    for part in stack {
        resolved.push(part);
    }
    resolved
}

/// Render an absolute path as a root-relative, forward-slash string.
fn display_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let s = rel.to_string_lossy().replace('\\', "/");
    if s.is_empty() {
        "/".to_string()
    } else {
        s
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<String>,
}

pub async fn list_directory(root: &Path, path: &str) -> Result<Value, String> {
    let dir = normalize_path(root, path);
    let mut read_dir = fs::read_dir(&dir)
        .await
        .map_err(|e| format!("failed to read directory '{path}': {e}"))?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| format!("failed to read directory entry: {e}"))?
    {
        let metadata = entry
            .metadata()
            .await
            .map_err(|e| format!("failed to stat '{}': {e}", entry.path().display()))?;
        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().to_string(),
            path: display_path(root, &entry.path()),
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(serde_json::json!({ "path": display_path(root, &dir), "entries": entries }))
}

pub async fn get_file_info(root: &Path, path: &str) -> Result<Value, String> {
    let target = normalize_path(root, path);
    let metadata = fs::metadata(&target)
        .await
        .map_err(|e| format!("failed to stat '{path}': {e}"))?;

    Ok(serde_json::json!({
        "path": display_path(root, &target),
        "is_dir": metadata.is_dir(),
        "size": metadata.len(),
        "modified": metadata.modified().ok().map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
    }))
}

/// Recursively search `path` for entries whose name contains `pattern`
/// (case-insensitive substring match).
pub async fn search_files(root: &Path, path: &str, pattern: &str) -> Result<Value, String> {
    let start = normalize_path(root, path);
    let needle = pattern.to_lowercase();
    let mut matches = Vec::new();
    let mut stack = vec![start];

    while let Some(dir) = stack.pop() {
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(d) => d,
            Err(_) => continue,
        };
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            let entry_path = entry.path();
            if name.contains(&needle) {
                matches.push(display_path(root, &entry_path));
            }
            if let Ok(metadata) = entry.metadata().await {
                if metadata.is_dir() {
                    stack.push(entry_path);
                }
            }
        }
    }
    matches.sort();

    Ok(serde_json::json!({ "pattern": pattern, "matches": matches }))
}

/// Read a file, returning UTF-8 text when decodable, else base64-encoded
/// bytes. `max_bytes` caps how much is read; a `truncated` flag reports
/// whether the file was larger than the cap.
pub async fn read_file(root: &Path, path: &str, max_bytes: usize) -> Result<Value, String> {
    let target = normalize_path(root, path);
    let full = fs::read(&target)
        .await
        .map_err(|e| format!("failed to read '{path}': {e}"))?;

    let truncated = full.len() > max_bytes;
    let slice = if truncated { &full[..max_bytes] } else { &full[..] };

    match std::str::from_utf8(slice) {
        Ok(text) => Ok(serde_json::json!({
            "path": display_path(root, &target),
            "encoding": "utf8",
            "content": text,
            "truncated": truncated,
        })),
        Err(_) => Ok(serde_json::json!({
            "path": display_path(root, &target),
            "encoding": "base64",
            "content": base64::engine::general_purpose::STANDARD.encode(slice),
            "truncated": truncated,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn root_aliases_normalize_to_root() {
        let root = Path::new("/ws");
        assert_eq!(normalize_path(root, ""), root);
        assert_eq!(normalize_path(root, "/"), root);
        assert_eq!(normalize_path(root, "."), root);
    }

    #[test]
    fn leading_slash_is_stripped() {
        let root = Path::new("/ws");
        assert_eq!(normalize_path(root, "/a/b"), root.join("a/b"));
    }

    #[test]
    fn parent_dir_segments_are_clamped_not_rejected() {
        let root = Path::new("/ws");
        assert_eq!(normalize_path(root, "../../etc/passwd"), root.join("etc/passwd"));
        assert_eq!(normalize_path(root, "a/../../b"), root.join("b"));
    }

    #[tokio::test]
    async fn read_file_reports_truncation() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.txt"), "0123456789").unwrap();
        let result = read_file(dir.path(), "big.txt", 4).await.unwrap();
        assert_eq!(result["content"], "0123");
        assert_eq!(result["truncated"], true);
    }

    #[tokio::test]
    async fn read_file_falls_back_to_base64_for_non_utf8() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bin.dat"), [0xff, 0xfe, 0x00, 0xff]).unwrap();
        let result = read_file(dir.path(), "bin.dat", 64).await.unwrap();
        assert_eq!(result["encoding"], "base64");
    }

    #[tokio::test]
    async fn search_files_matches_case_insensitively() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Report.TXT"), "x").unwrap();
        let result = search_files(dir.path(), ".", "report").await.unwrap();
        let matches = result["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
    }
}
