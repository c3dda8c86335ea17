//! Local-files connector: filtered recursive traversal of configured scan
//! roots, skipping system/build/package directories, honoring a maximum
//! file size and an mtime-based cursor. Falls back to a fixed set of
//! scan-root names under the home directory when no allowlist is set.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::error::AppError;
use corpus_store::DocumentPayload;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{cursor_get_f64, CollectedSync, SourceConnector};

const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_TEXT_CHARS: usize = 50_000;
const DEFAULT_SCAN_DIR_NAMES: &str = "Documents,Desktop,Downloads,Projects,Code,repos,src,work,notes";

static SUPPORTED_SUFFIXES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "txt", "md", "markdown", "rst", "csv", "tsv", "json", "yaml", "yml", "toml", "xml", "log",
        "ini", "cfg", "conf", "org", "tex", "html", "htm", "py", "js", "ts", "jsx", "tsx", "java",
        "kt", "c", "cpp", "h", "hpp", "cs", "go", "rs", "rb", "php", "swift", "sh", "bash", "sql",
    ]
    .into_iter()
    .collect()
});

static SKIP_DIRS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        ".git", ".svn", ".hg", "node_modules", "__pycache__", ".cache", ".local", ".npm", ".nvm",
        ".cargo", ".rustup", ".docker", ".ssh", ".gnupg", ".kube", ".aws", ".vscode", ".idea",
        ".tox", ".mypy_cache", ".ruff_cache", ".pytest_cache", "venv", ".venv", "env", ".env",
        "dist", "build", "target", "out", "bin", "obj", ".next", ".nuxt", ".turbo", ".gradle",
        "Library", ".Trash",
    ]
    .into_iter()
    .collect()
});

pub struct LocalFilesConnector {
    allowlist: Vec<PathBuf>,
}

impl LocalFilesConnector {
    pub fn new(allowlist: Vec<PathBuf>) -> Self {
        Self { allowlist }
    }

    fn scan_roots(&self) -> Vec<PathBuf> {
        if !self.allowlist.is_empty() {
            return self.allowlist.clone();
        }
        let Some(home) = dirs_home() else { return Vec::new() };
        let names = env::var("FILES_SCAN_DIRS").unwrap_or_else(|_| DEFAULT_SCAN_DIR_NAMES.to_string());
        names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| home.join(n))
            .filter(|p| p.is_dir())
            .collect()
    }
}

fn dirs_home() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

#[async_trait]
impl SourceConnector for LocalFilesConnector {
    fn source(&self) -> &'static str {
        "files"
    }

    async fn connect(&mut self, _seed_cursor: Option<Value>) -> Result<(), AppError> {
        Ok(())
    }

    async fn collect(&mut self, cursor: Option<Value>, full: bool) -> Result<CollectedSync, AppError> {
        let cursor = cursor.unwrap_or_else(|| json!({}));
        let last_mtime = if full { 0.0 } else { cursor_get_f64(&cursor, "last_mtime") };

        let mut documents = Vec::new();
        let mut max_mtime = last_mtime;
        let mut files_scanned = 0u64;
        let mut files_skipped = 0u64;

        for root in self.scan_roots() {
            for entry in walkdir::WalkDir::new(&root)
                .into_iter()
                .filter_entry(|e| !is_skipped_dir(e))
                .filter_map(Result::ok)
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                if !is_supported_file(entry.path()) {
                    continue;
                }
                files_scanned += 1;

                let Ok(metadata) = entry.metadata() else {
                    files_skipped += 1;
                    continue;
                };
                let mtime = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                if mtime <= last_mtime {
                    continue;
                }
                if metadata.len() > MAX_FILE_SIZE_BYTES {
                    files_skipped += 1;
                    continue;
                }

                let Ok(mut text) = std::fs::read_to_string(entry.path()) else {
                    files_skipped += 1;
                    continue;
                };
                if text.trim().is_empty() {
                    files_skipped += 1;
                    continue;
                }
                if text.len() > MAX_TEXT_CHARS {
                    text.truncate(MAX_TEXT_CHARS);
                }

                let checksum = format!("{:x}", Sha256::digest(text.as_bytes()));
                let doc_id = format!("files:{}", &checksum[..32.min(checksum.len())]);
                let path_str = entry.path().to_string_lossy().to_string();
                let suffix = entry.path().extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
                let timestamp: DateTime<Utc> = Utc
                    .timestamp_opt(mtime as i64, 0)
                    .single()
                    .unwrap_or_else(Utc::now);

                documents.push(DocumentPayload {
                    doc_id,
                    source: "files".to_string(),
                    external_id: path_str.clone(),
                    thread_id: entry.path().parent().map(|p| p.to_string_lossy().to_string()),
                    account_id: Some("local".to_string()),
                    title: entry.file_name().to_str().map(String::from),
                    body_text: text,
                    author: None,
                    participants: vec![],
                    timestamp_utc: Some(timestamp),
                    deep_link: Some(format!("file://{path_str}")),
                    metadata: json!({ "path": path_str, "size": metadata.len(), "suffix": suffix }),
                    checksum,
                });
                max_mtime = max_mtime.max(mtime);
            }
        }

        let next_cursor = json!({
            "last_mtime": max_mtime,
            "synced_at": Utc::now().to_rfc3339(),
            "files_scanned": files_scanned,
            "files_skipped": files_skipped,
        });
        Ok(CollectedSync {
            documents,
            cursor: next_cursor,
            message: "files sync completed".to_string(),
        })
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| SKIP_DIRS.contains(name))
            .unwrap_or(false)
}

fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED_SUFFIXES.contains(ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
