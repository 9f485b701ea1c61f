//! Source documents: discovery and text extraction

use std::fs;
#[cfg(feature = "docx")]
use std::io::Read;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extracted text of one source file
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Path relative to the source folder, `/`-separated
    pub name: String,
    pub raw_text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Whitespace-only documents contribute no fragments
    pub fn is_blank(&self) -> bool {
        self.raw_text.trim().is_empty()
    }
}

/// A file selected for indexing, not yet extracted
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    pub name: String,
    pub path: PathBuf,
}

/// Turns a file into plain text
pub trait Extractor {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Default extractor: plain text and markdown, plus PDF and DOCX behind
/// the `pdf` and `docx` features
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExtractor;

impl FileExtractor {
    pub fn new() -> Self {
        Self
    }

    fn read_text(path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| unreadable(path, e))?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        }
    }

    #[cfg(feature = "pdf")]
    fn read_pdf(path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| unreadable(path, e))?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| unreadable(path, e))
    }

    #[cfg(not(feature = "pdf"))]
    fn read_pdf(path: &Path) -> Result<String> {
        Err(unreadable(path, "PDF support not compiled in (enable the `pdf` feature)"))
    }

    #[cfg(feature = "docx")]
    fn read_docx(path: &Path) -> Result<String> {
        let file = fs::File::open(path).map_err(|e| unreadable(path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| unreadable(path, e))?;
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| unreadable(path, e))?
            .read_to_string(&mut xml)
            .map_err(|e| unreadable(path, e))?;
        docx_body_text(&xml).map_err(|e| unreadable(path, e))
    }

    #[cfg(not(feature = "docx"))]
    fn read_docx(path: &Path) -> Result<String> {
        Err(unreadable(path, "DOCX support not compiled in (enable the `docx` feature)"))
    }
}

impl Extractor for FileExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("txt") | Some("md") | Some("markdown") => Self::read_text(path),
            Some("pdf") => Self::read_pdf(path),
            Some("docx") => Self::read_docx(path),
            _ => Err(unreadable(path, "unsupported file type")),
        }
    }
}

/// Text of the `w:t` runs in `word/document.xml`, one line per paragraph
#[cfg(feature = "docx")]
fn docx_body_text(xml: &str) -> std::result::Result<String, quick_xml::Error> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_run_text => text.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

fn unreadable(path: &Path, reason: impl ToString) -> Error {
    Error::UnreadableDocument {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// List files under `source_dir` whose file name matches one of `include`,
/// sorted by relative name. Row ids depend on this order.
pub fn collect_documents(source_dir: &Path, include: &[String]) -> Result<Vec<SourceFile>> {
    if !source_dir.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("source directory not found: {}", source_dir.display()),
        )));
    }

    let patterns = include
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| Error::InvalidParameter(format!("include '{}': {}", p, e))))
        .collect::<Result<Vec<_>>>()?;
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(source_dir).follow_links(true) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !patterns.iter().any(|p| p.matches_with(&file_name, options)) {
            continue;
        }

        let relative = entry.path().strip_prefix(source_dir).unwrap_or(entry.path());
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        files.push(SourceFile {
            name,
            path: entry.path().to_path_buf(),
        });
    }

    files.sort();
    Ok(files)
}
