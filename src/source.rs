//! Book sources: where the spine and the documents come from.
//!
//! The [`Engine`](crate::Engine) never touches files itself. It asks a
//! [`BookSource`] for the reading order once per open, and for a freshly
//! built [`Document`] every time it moves into a document.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::daisy::{parse_ncc_spine, parse_opf_spine, parse_smil};
use crate::error::{Error, Result};
use crate::model::Document;
use crate::util::{decode_markup, normalize_path, resolve_path, split_fragment};

/// Supplies the reading order and builds documents on demand.
pub trait BookSource {
    /// Document identifiers in reading order.
    fn spine(&mut self) -> Result<Vec<String>>;

    /// Build the document named by `document` (as returned by [`spine`](Self::spine)).
    fn load(&mut self, document: &str) -> Result<Document>;
}

impl<S: BookSource + ?Sized> BookSource for Box<S> {
    fn spine(&mut self) -> Result<Vec<String>> {
        (**self).spine()
    }

    fn load(&mut self, document: &str) -> Result<Document> {
        (**self).load(document)
    }
}

/// Which navigation file drives the spine.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    /// DAISY 2.02: `ncc.html` at this path.
    Ncc(String),
    /// DAISY 3: package file at this path.
    Package(String),
}

impl Layout {
    fn detect<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<Layout> {
        let mut package = None;
        for name in names {
            let file = name.rsplit('/').next().unwrap_or(name);
            if file.eq_ignore_ascii_case("ncc.html") || file.eq_ignore_ascii_case("ncc.htm") {
                return Some(Layout::Ncc(name.to_string()));
            }
            if package.is_none() && file.to_ascii_lowercase().ends_with(".opf") {
                package = Some(Layout::Package(name.to_string()));
            }
        }
        package
    }

    fn path(&self) -> &str {
        match self {
            Layout::Ncc(p) | Layout::Package(p) => p,
        }
    }

    /// Directory the spine hrefs are relative to.
    fn base(&self) -> &str {
        self.path().rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    fn parse_spine(&self, content: &str) -> Result<Vec<String>> {
        let hrefs = match self {
            Layout::Ncc(_) => parse_ncc_spine(content)?,
            Layout::Package(_) => parse_opf_spine(content)?,
        };
        let base = self.base();
        Ok(hrefs.iter().map(|href| resolve_path(base, href)).collect())
    }
}

// ============================================================================
// Directory
// ============================================================================

/// A book unpacked in a directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
    layout: Layout,
}

impl DirSource {
    /// Open a book directory, or its `ncc.html` / `.opf` file directly.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_file() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let layout = Layout::detect([name.as_str()])
                .ok_or_else(|| Error::InvalidDocument(format!("not a DAISY entry file: {name}")))?;
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            return Ok(Self { root, layout });
        }

        let mut names: Vec<String> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        let layout = Layout::detect(names.iter().map(String::as_str))
            .ok_or_else(|| Error::MissingElement("ncc.html or package file".into()))?;
        debug!(root = %path.display(), entry = layout.path(), "opened book directory");
        Ok(Self {
            root: path.to_path_buf(),
            layout,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let (relative, _) = split_fragment(relative);
        let decoded = percent_encoding::percent_decode_str(relative).decode_utf8_lossy();
        let path = self.root.join(decoded.as_ref());
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::DocumentNotFound(relative.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl BookSource for DirSource {
    fn spine(&mut self) -> Result<Vec<String>> {
        let bytes = self.read(self.layout.path())?;
        self.layout.parse_spine(&decode_markup(&bytes))
    }

    fn load(&mut self, document: &str) -> Result<Document> {
        let bytes = self.read(document)?;
        parse_smil(&decode_markup(&bytes))
    }
}

// ============================================================================
// Zip archive
// ============================================================================

/// A book packed in a zip archive.
pub struct ZipSource<R: Read + Seek> {
    archive: ZipArchive<R>,
    layout: Layout,
}

impl ZipSource<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }
}

impl<R: Read + Seek> ZipSource<R> {
    /// Read a zipped book from any [`Read`] + [`Seek`] source.
    pub fn from_reader(reader: R) -> Result<Self> {
        let archive = ZipArchive::new(reader)?;
        let layout = Layout::detect(archive.file_names())
            .ok_or_else(|| Error::MissingElement("ncc.html or package file".into()))?;
        Ok(Self { archive, layout })
    }

    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let (path, _) = split_fragment(path);
        match self.archive.by_name(path) {
            Ok(mut file) => {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)?;
                return Ok(contents);
            }
            Err(zip::result::ZipError::FileNotFound) => {}
            Err(e) => return Err(e.into()),
        }

        // Fall back to a normalized comparison (percent-encoding, case).
        let wanted = normalize_path(path);
        let Some(name) = self
            .archive
            .file_names()
            .find(|name| normalize_path(name) == wanted)
            .map(str::to_string)
        else {
            return Err(Error::DocumentNotFound(path.to_string()));
        };
        let mut file = self.archive.by_name(&name)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        Ok(contents)
    }
}

impl<R: Read + Seek> BookSource for ZipSource<R> {
    fn spine(&mut self) -> Result<Vec<String>> {
        let entry = self.layout.path().to_string();
        let bytes = self.read(&entry)?;
        self.layout.parse_spine(&decode_markup(&bytes))
    }

    fn load(&mut self, document: &str) -> Result<Document> {
        let bytes = self.read(document)?;
        parse_smil(&decode_markup(&bytes))
    }
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Debug, Clone)]
enum Entry {
    Markup(String),
    Built(Document),
}

/// Documents held in memory, keyed by identifier.
///
/// Useful for embedding and for tests: entries can be SMIL markup, parsed on
/// every load, or documents built directly through the arena API.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    spine: Vec<String>,
    documents: HashMap<String, Entry>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a SMIL document to the reading order.
    pub fn with_smil(mut self, id: impl Into<String>, markup: impl Into<String>) -> Self {
        let id = id.into();
        self.documents
            .insert(normalize_path(&id), Entry::Markup(markup.into()));
        self.spine.push(id);
        self
    }

    /// Append an already built document to the reading order.
    pub fn with_document(mut self, id: impl Into<String>, document: Document) -> Self {
        let id = id.into();
        self.documents
            .insert(normalize_path(&id), Entry::Built(document));
        self.spine.push(id);
        self
    }

    /// List `id` in the reading order without providing it, so loading it fails.
    pub fn with_missing(mut self, id: impl Into<String>) -> Self {
        self.spine.push(id.into());
        self
    }

    /// Replace or drop the content behind `id` without touching the reading order.
    pub fn set_markup(&mut self, id: &str, markup: Option<String>) {
        let key = normalize_path(id);
        match markup {
            Some(markup) => {
                self.documents.insert(key, Entry::Markup(markup));
            }
            None => {
                self.documents.remove(&key);
            }
        }
    }
}

impl BookSource for MemorySource {
    fn spine(&mut self) -> Result<Vec<String>> {
        if self.spine.is_empty() {
            return Err(Error::MissingElement("spine".into()));
        }
        Ok(self.spine.clone())
    }

    fn load(&mut self, document: &str) -> Result<Document> {
        match self.documents.get(&normalize_path(document)) {
            Some(Entry::Markup(markup)) => parse_smil(markup),
            Some(Entry::Built(doc)) => Ok(doc.clone()),
            None => Err(Error::DocumentNotFound(document.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_detect() {
        assert_eq!(
            Layout::detect(["a.smil", "NCC.HTML"]),
            Some(Layout::Ncc("NCC.HTML".into()))
        );
        assert_eq!(
            Layout::detect(["book/speechgen.opf", "book/a.smil"]),
            Some(Layout::Package("book/speechgen.opf".into()))
        );
        assert_eq!(Layout::detect(["a.smil"]), None);
    }

    #[test]
    fn test_layout_base() {
        assert_eq!(Layout::Package("book/x.opf".into()).base(), "book");
        assert_eq!(Layout::Ncc("ncc.html".into()).base(), "");
    }

    #[test]
    fn test_memory_source_missing() {
        let mut source = MemorySource::new().with_missing("gone.smil");
        assert_eq!(source.spine().unwrap(), vec!["gone.smil"]);
        assert!(matches!(
            source.load("gone.smil"),
            Err(Error::DocumentNotFound(_))
        ));
    }
}
