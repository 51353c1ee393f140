//! File readers: decode a file into text and classify it for chunking

use crate::error::FileProcessingError;
use std::path::Path;

/// Extensions treated as source code (structure-aware chunking)
const SOURCE_EXTENSIONS: &[&str] = &["py", "rs", "js", "jsx", "mjs", "cjs", "ts", "tsx", "go"];

/// Reads a file into decoded text and reports its coarse kind
pub trait FileReader: Send + Sync {
    /// Read and decode the file contents
    fn read(&self, path: &Path) -> Result<String, FileProcessingError>;

    /// Coarse category used to pick the chunking strategy
    fn file_type(&self) -> &'static str;
}

/// Plain-text reader for .txt, .md and similar files
pub struct TextFileReader;

impl FileReader for TextFileReader {
    fn read(&self, path: &Path) -> Result<String, FileProcessingError> {
        let bytes = read_bytes(path)?;
        String::from_utf8(bytes).map_err(|_| FileProcessingError::InvalidUtf8(path.to_path_buf()))
    }

    fn file_type(&self) -> &'static str {
        "text"
    }
}

/// Source-code reader; rejects binary content masquerading as source
pub struct SourceFileReader;

impl FileReader for SourceFileReader {
    fn read(&self, path: &Path) -> Result<String, FileProcessingError> {
        let bytes = read_bytes(path)?;
        if bytes.contains(&0) {
            return Err(FileProcessingError::BinaryContent(path.to_path_buf()));
        }
        String::from_utf8(bytes).map_err(|_| FileProcessingError::InvalidUtf8(path.to_path_buf()))
    }

    fn file_type(&self) -> &'static str {
        "source"
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, FileProcessingError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FileProcessingError::NotFound(path.to_path_buf()),
        _ => FileProcessingError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}

/// Selects the reader implementation by file extension
pub struct FileReaderFactory;

impl FileReaderFactory {
    /// Reader for the given extension (without the leading dot)
    pub fn for_extension(extension: &str) -> Box<dyn FileReader> {
        if Self::is_source_extension(extension) {
            Box::new(SourceFileReader)
        } else {
            Box::new(TextFileReader)
        }
    }

    pub fn is_source_extension(extension: &str) -> bool {
        SOURCE_EXTENSIONS.contains(&extension.to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_factory_selects_source_reader() {
        assert_eq!(FileReaderFactory::for_extension("py").file_type(), "source");
        assert_eq!(FileReaderFactory::for_extension("rs").file_type(), "source");
        assert_eq!(FileReaderFactory::for_extension("TS").file_type(), "source");
    }

    #[test]
    fn test_factory_selects_text_reader() {
        assert_eq!(FileReaderFactory::for_extension("txt").file_type(), "text");
        assert_eq!(FileReaderFactory::for_extension("md").file_type(), "text");
    }

    #[test]
    fn test_text_reader_reads_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all("héllo wörld".as_bytes()).unwrap();

        let content = TextFileReader.read(file.path()).unwrap();
        assert_eq!(content, "héllo wörld");
    }

    #[test]
    fn test_text_reader_rejects_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0x41]).unwrap();

        let err = TextFileReader.read(file.path()).unwrap_err();
        assert!(matches!(err, FileProcessingError::InvalidUtf8(_)));
    }

    #[test]
    fn test_source_reader_rejects_binary() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"fn main() {}\0\0").unwrap();

        let err = SourceFileReader.read(file.path()).unwrap_err();
        assert!(matches!(err, FileProcessingError::BinaryContent(_)));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = TextFileReader
            .read(Path::new("/nonexistent/file.txt"))
            .unwrap_err();
        assert!(matches!(err, FileProcessingError::NotFound(_)));
    }
}
