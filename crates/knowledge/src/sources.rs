//! Document sources feeding the index builder.

use crate::error::{IndexError, IndexResult};
use crate::types::{Document, Metadata, MetadataValue};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Produces the complete document set for one rebuild.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Load every document. Order must be stable across calls on an
    /// unchanged corpus so the source digest is reproducible.
    async fn load(&self) -> IndexResult<Vec<Document>>;

    /// Short label for logs.
    fn describe(&self) -> String {
        "documents".to_string()
    }
}

/// A fixed, in-memory document set.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: Vec<Document>,
}

impl StaticSource {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Documents from `(name, text)` pairs.
    pub fn from_texts<N, T>(texts: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|(name, text)| Document::from_text(name, text))
                .collect(),
        )
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn load(&self) -> IndexResult<Vec<Document>> {
        Ok(self.documents.clone())
    }

    fn describe(&self) -> String {
        format!("{} static document(s)", self.documents.len())
    }
}

/// Text files found under one or more directories (or single files).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl DirectorySource {
    pub fn new(roots: Vec<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            roots,
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    fn scan(&self) -> IndexResult<Vec<Document>> {
        let mut documents = Vec::new();

        for root in &self.roots {
            if !root.exists() {
                return Err(IndexError::Source(format!(
                    "path does not exist: {}",
                    root.display()
                )));
            }

            let walker = WalkDir::new(root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file());

            for entry in walker {
                let path = entry.path();
                if !self.accepts(path) {
                    continue;
                }
                if let Some(document) = read_document(root, path) {
                    documents.push(document);
                }
            }
        }

        if documents.is_empty() {
            return Err(IndexError::Source(format!(
                "no documents with extensions [{}] found",
                self.extensions.join(", ")
            )));
        }

        tracing::info!("Loaded {} documents from {} path(s)", documents.len(), self.roots.len());
        Ok(documents)
    }
}

#[async_trait]
impl DocumentSource for DirectorySource {
    async fn load(&self) -> IndexResult<Vec<Document>> {
        let source = self.clone();
        tokio::task::spawn_blocking(move || source.scan())
            .await
            .map_err(|e| IndexError::Source(format!("directory scan task failed: {}", e)))?
    }

    fn describe(&self) -> String {
        let roots: Vec<String> = self.roots.iter().map(|r| r.display().to_string()).collect();
        roots.join(", ")
    }
}

/// Read one file as a document, or `None` (with a warning) if unusable.
fn read_document(root: &Path, path: &Path) -> Option<Document> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Skipping unreadable file {:?}: {}", path, e);
            return None;
        }
    };

    let raw = match String::from_utf8(bytes) {
        Ok(raw) if is_likely_text(&raw) => raw,
        _ => {
            tracing::warn!("Skipping likely binary file: {:?}", path);
            return None;
        }
    };

    let size_bytes = raw.len() as u64;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    let text = match extension.as_str() {
        "html" | "htm" => clean_html(&raw),
        _ => raw,
    };

    // Relative names keep ids stable when the corpus directory moves
    let name = path
        .strip_prefix(root)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .or_else(|| path.file_name().map(Path::new))
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");

    let mut metadata = Metadata::new();
    metadata.insert(
        "path".to_string(),
        MetadataValue::Text(path.display().to_string()),
    );
    metadata.insert("extension".to_string(), extension.into());
    metadata.insert("size_bytes".to_string(), size_bytes.into());

    Some(Document::new(name, text, metadata))
}

/// Strip tags plus script and style bodies, collapsing whitespace.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = &text.as_bytes()[i..];
            if starts_with_ignore_case(rest, b"<script") {
                in_script = true;
            } else if starts_with_ignore_case(rest, b"</script") {
                in_script = false;
            } else if starts_with_ignore_case(rest, b"<style") {
                in_style = true;
            } else if starts_with_ignore_case(rest, b"</style") {
                in_style = false;
            }
        } else if ch == '>' {
            in_tag = false;
            result.push(' ');
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ignore_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dir_source(dir: &TempDir) -> DirectorySource {
        DirectorySource::new(
            vec![dir.path().to_path_buf()],
            vec!["txt".to_string(), ".MD".to_string(), "html".to_string()],
        )
    }

    #[tokio::test]
    async fn test_static_source_returns_documents() {
        let source = StaticSource::from_texts([("a.txt", "alpha"), ("b.txt", "beta")]);
        let docs = source.load().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source_name, "a.txt");
        assert_eq!(docs[1].raw_text, "beta");
    }

    #[tokio::test]
    async fn test_directory_source_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.txt"), "bravo").unwrap();
        fs::write(dir.path().join("a.md"), "# alpha").unwrap();
        fs::write(dir.path().join("nested/c.txt"), "charlie").unwrap();
        fs::write(dir.path().join("skip.bin"), [0u8, 1, 2]).unwrap();
        fs::write(dir.path().join("image.txt"), [0xffu8, 0xfe, 0x00]).unwrap();

        let docs = dir_source(&dir).load().await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.source_name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.txt", "nested/c.txt"]);

        let first = &docs[0];
        assert_eq!(first.metadata["extension"].as_str(), Some("md"));
        assert_eq!(first.metadata["size_bytes"].as_f64(), Some(7.0));
        assert!(first.metadata["path"].as_str().unwrap().ends_with("a.md"));
    }

    #[tokio::test]
    async fn test_directory_source_is_stable() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("doc{}.txt", i)), format!("body {}", i)).unwrap();
        }

        let source = dir_source(&dir);
        let first = source.load().await.unwrap();
        let second = source.load().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_html_is_cleaned() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("page.html"),
            "<html><style>p{}</style><body><p>Hello <b>world</b></p><script>x()</script></body></html>",
        )
        .unwrap();

        let docs = dir_source(&dir).load().await.unwrap();
        assert_eq!(docs[0].raw_text, "Hello world");
    }

    #[tokio::test]
    async fn test_directory_document_records_size_of_raw_file() {
        let dir = TempDir::new().unwrap();
        let page = "<p>Grüße</p>";
        fs::write(dir.path().join("page.html"), page).unwrap();

        let docs = dir_source(&dir).load().await.unwrap();
        assert_eq!(docs[0].raw_text, "Grüße");
        assert_eq!(docs[0].metadata["size_bytes"].as_f64(), Some(page.len() as f64));
    }

    #[test]
    fn test_clean_html_handles_multibyte_after_tags() {
        let html = "<p>é</p><SCRIPT>évil()</SCRIPT><b>ñandú</b><StYlE>ü{}</style>größe";
        assert_eq!(clean_html(html), "é ñandú größe");
    }

    #[tokio::test]
    async fn test_missing_or_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = dir_source(&dir).load().await.unwrap_err();
        assert!(matches!(err, IndexError::Source(_)));

        let missing = DirectorySource::new(vec![dir.path().join("nope")], vec!["txt".into()]);
        assert!(matches!(missing.load().await, Err(IndexError::Source(_))));
    }
}
