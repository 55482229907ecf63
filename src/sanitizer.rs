// Upload -> flat file list; unsafe zip entries are dropped silently

use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

const ALLOWED_EXTENSIONS: &[&str] = &[
    "html", "htm", "css", "js", "json", "txt", "md", // markup, style, script, text
    "jpg", "jpeg", "png", "gif", "svg", "ico", "bmp", "webp", "avif", // images
    "woff", "woff2", "ttf", "eot", "otf", // fonts
    "mp4", "webm", "mp3", "wav", "ogg", // media
    "pdf", "xml", "csv", "yml", "yaml", // documents and data
];

const BLOCKED_EXTENSIONS: &[&str] = &["exe", "sh", "bat", "cmd", "php", "py", "rb", "pl"];

const ALLOWED_DOTFILES: &[&str] = &[".htaccess", ".well-known", ".gitignore"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub content: FileContent,
}

#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("Unsupported file format, only .html or .zip")]
    UnsupportedFormat,
    #[error("HTML file is not valid UTF-8 text")]
    InvalidText,
    #[error("ZIP file is corrupt or invalid")]
    CorruptArchive(#[source] zip::result::ZipError),
    #[error("ZIP file must contain index.html")]
    MissingIndex,
    #[error("ZIP file expands beyond {limit} bytes")]
    TooLarge { limit: u64 },
}

impl SanitizeError {
    /// Policy failures are about the archive contents rather than the shape
    /// of the request.
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            Self::CorruptArchive(_) | Self::MissingIndex | Self::TooLarge { .. }
        )
    }
}

/// Allow-list first, with an explicit block-list on top.
#[derive(Debug, Clone)]
pub struct FilePolicy {
    pub allowed_extensions: Vec<String>,
    pub blocked_extensions: Vec<String>,
    pub allowed_dotfiles: Vec<String>,
}

impl Default for FilePolicy {
    fn default() -> Self {
        fn owned(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }
        Self {
            allowed_extensions: owned(ALLOWED_EXTENSIONS),
            blocked_extensions: owned(BLOCKED_EXTENSIONS),
            allowed_dotfiles: owned(ALLOWED_DOTFILES),
        }
    }
}

impl FilePolicy {
    pub fn is_safe(&self, path: &str) -> bool {
        if path.contains("..")
            || path.contains("//")
            || path.contains('\\')
            || path.starts_with('/')
        {
            return false;
        }

        let basename = path.rsplit('/').next().unwrap_or(path);
        if basename.starts_with('.') {
            // dotfiles carry no extension, so the allow-list is the whole check
            return self.allowed_dotfiles.iter().any(|d| d == basename);
        }

        let ext = match Path::new(basename).extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return false,
        };

        self.allowed_extensions.contains(&ext) && !self.blocked_extensions.contains(&ext)
    }
}

pub struct Sanitizer {
    policy: FilePolicy,
    max_extracted_bytes: u64,
}

impl Sanitizer {
    pub fn new(policy: FilePolicy, max_extracted_bytes: u64) -> Self {
        Self {
            policy,
            max_extracted_bytes,
        }
    }

    pub fn process(&self, file_name: &str, raw: &[u8]) -> Result<Vec<FileEntry>, SanitizeError> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            self.extract_archive(raw)
        } else if lower.ends_with(".html") || lower.ends_with(".htm") {
            let text = String::from_utf8(raw.to_vec()).map_err(|_| SanitizeError::InvalidText)?;
            Ok(vec![FileEntry {
                path: "index.html".to_string(),
                content: FileContent::Text(text),
            }])
        } else {
            Err(SanitizeError::UnsupportedFormat)
        }
    }

    fn extract_archive(&self, raw: &[u8]) -> Result<Vec<FileEntry>, SanitizeError> {
        let mut archive =
            ZipArchive::new(Cursor::new(raw)).map_err(SanitizeError::CorruptArchive)?;
        let limit = self.max_extracted_bytes;
        let mut budget = limit;
        let mut files = Vec::new();

        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(SanitizeError::CorruptArchive)?;
            if entry.is_dir() {
                continue;
            }

            let path = entry.name().to_string();
            if !self.policy.is_safe(&path) {
                debug!(path = %path, "Dropping archive entry rejected by file policy");
                continue;
            }

            // read one byte past the budget so overflow is detectable
            let mut content = Vec::new();
            entry
                .take(budget.saturating_add(1))
                .read_to_end(&mut content)
                .map_err(|e| SanitizeError::CorruptArchive(e.into()))?;
            if content.len() as u64 > budget {
                return Err(SanitizeError::TooLarge { limit });
            }
            budget -= content.len() as u64;

            files.push(FileEntry {
                path,
                content: FileContent::Binary(content),
            });
        }

        if !files.iter().any(|f| f.path.eq_ignore_ascii_case("index.html")) {
            return Err(SanitizeError::MissingIndex);
        }

        Ok(files)
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(FilePolicy::default(), 50 * 1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn paths(files: &[FileEntry]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn policy_rejects_traversal_regardless_of_extension() {
        let policy = FilePolicy::default();
        assert!(!policy.is_safe("../../etc/passwd.html"));
        assert!(!policy.is_safe("assets/../index.html"));
        assert!(!policy.is_safe("assets//app.js"));
        assert!(!policy.is_safe("assets\\app.js"));
        assert!(!policy.is_safe("/index.html"));
    }

    #[test]
    fn policy_rejects_executables_and_unknown_types() {
        let policy = FilePolicy::default();
        assert!(!policy.is_safe("app.php"));
        assert!(!policy.is_safe("cgi/run.sh"));
        assert!(!policy.is_safe("setup.EXE"));
        assert!(!policy.is_safe("server.wasm"));
        assert!(!policy.is_safe("Makefile"));
    }

    #[test]
    fn block_list_wins_even_when_allow_listed() {
        let mut policy = FilePolicy::default();
        policy.allowed_extensions.push("php".to_string());
        assert!(!policy.is_safe("app.php"));
    }

    #[test]
    fn policy_accepts_static_assets_case_insensitively() {
        let policy = FilePolicy::default();
        assert!(policy.is_safe("index.html"));
        assert!(policy.is_safe("css/Site.CSS"));
        assert!(policy.is_safe("img/logo.PNG"));
        assert!(policy.is_safe("fonts/inter.woff2"));
    }

    #[test]
    fn hidden_files_need_the_dotfile_allow_list() {
        let policy = FilePolicy::default();
        assert!(policy.is_safe(".htaccess"));
        assert!(policy.is_safe("docs/.gitignore"));
        assert!(!policy.is_safe(".env"));
        assert!(!policy.is_safe(".secret.json"));
        assert!(!policy.is_safe("../.htaccess"));
    }

    #[test]
    fn html_upload_becomes_index() {
        let sanitizer = Sanitizer::default();
        let files = sanitizer.process("Landing.HTM", b"<h1>hi</h1>").unwrap();
        assert_eq!(
            files,
            vec![FileEntry {
                path: "index.html".to_string(),
                content: FileContent::Text("<h1>hi</h1>".to_string()),
            }]
        );
    }

    #[test]
    fn html_upload_with_invalid_text_fails() {
        let sanitizer = Sanitizer::default();
        let err = sanitizer.process("index.html", &[0xff, 0xfe, 0x00, 0xc3]).unwrap_err();
        assert!(matches!(err, SanitizeError::InvalidText));
        assert!(!err.is_policy());
    }

    #[test]
    fn unsupported_extension_fails() {
        let sanitizer = Sanitizer::default();
        let err = sanitizer.process("site.tar.gz", b"data").unwrap_err();
        assert!(matches!(err, SanitizeError::UnsupportedFormat));
    }

    #[test]
    fn zip_entries_are_filtered_silently() {
        let raw = build_zip(&[
            ("index.html", b"<html></html>"),
            ("css/", b""),
            ("css/style.css", b"body{}"),
            ("app.php", b"<?php ?>"),
            ("../../etc/passwd.html", b"root"),
            (".env", b"SECRET=1"),
        ]);
        let files = Sanitizer::default().process("site.ZIP", &raw).unwrap();
        assert_eq!(paths(&files), vec!["index.html", "css/style.css"]);
        assert_eq!(files[1].content.as_bytes(), b"body{}");
    }

    #[test]
    fn zip_without_index_is_a_policy_error() {
        let raw = build_zip(&[("about.html", b"a"), ("style.css", b"b")]);
        let err = Sanitizer::default().process("site.zip", &raw).unwrap_err();
        assert!(matches!(err, SanitizeError::MissingIndex));
        assert!(err.is_policy());
    }

    #[test]
    fn index_match_ignores_case() {
        let raw = build_zip(&[("INDEX.HTML", b"<p>x</p>")]);
        let files = Sanitizer::default().process("site.zip", &raw).unwrap();
        assert_eq!(paths(&files), vec!["INDEX.HTML"]);
    }

    #[test]
    fn nested_index_does_not_count() {
        let raw = build_zip(&[("site/index.html", b"<p>x</p>")]);
        let err = Sanitizer::default().process("site.zip", &raw).unwrap_err();
        assert!(matches!(err, SanitizeError::MissingIndex));
    }

    #[test]
    fn corrupt_zip_fails() {
        let err = Sanitizer::default()
            .process("site.zip", b"definitely not a zip")
            .unwrap_err();
        assert!(matches!(err, SanitizeError::CorruptArchive(_)));
    }

    #[test]
    fn extraction_budget_is_enforced() {
        let big = vec![b'a'; 64];
        let raw = build_zip(&[("index.html", b"<p>x</p>"), ("data.txt", big.as_slice())]);
        let sanitizer = Sanitizer::new(FilePolicy::default(), 32);
        let err = sanitizer.process("site.zip", &raw).unwrap_err();
        assert!(matches!(err, SanitizeError::TooLarge { limit: 32 }));
    }
}
