//! Content extraction and chunking
//!
//! `ContentExtractor` validates a path against the configured size and
//! extension policy, reads it through the matching `FileReader`, and splits
//! the text into bounded, overlapping chunks. Source files are split at
//! top-level semantic unit boundaries where possible; plain text uses a
//! character sliding window.

use crate::config::ProcessingConfig;
use crate::error::FileProcessingError;
use crate::processor::ast_parser::AstParser;
use crate::processor::file_readers::FileReaderFactory;
use crate::types::{DocumentChunk, DocumentMetadata};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;

pub struct ContentExtractor {
    chunk_size: usize,
    chunk_overlap: usize,
    max_file_size: u64,
    supported_extensions: Vec<String>,
}

impl ContentExtractor {
    /// Build from validated processing configuration.
    ///
    /// `chunk_overlap < chunk_size` is a config invariant enforced by
    /// `Config::validate`, not re-checked per call.
    pub fn new(processing: &ProcessingConfig) -> Self {
        Self {
            chunk_size: processing.chunk_size,
            chunk_overlap: processing.chunk_overlap,
            max_file_size: processing.max_file_size,
            supported_extensions: processing
                .supported_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    /// Extract a document and split it into ordered chunks.
    ///
    /// Policy (extension, size) is checked before the file is read so
    /// oversized or unsupported files fail fast.
    pub fn extract_and_chunk(
        &self,
        path: &Path,
    ) -> Result<(DocumentMetadata, Vec<DocumentChunk>), FileProcessingError> {
        let fs_meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FileProcessingError::NotFound(path.to_path_buf()),
            _ => FileProcessingError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        if !fs_meta.is_file() {
            return Err(FileProcessingError::NotAFile(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !self.supported_extensions.contains(&extension) {
            return Err(FileProcessingError::UnsupportedExtension {
                path: path.to_path_buf(),
                extension,
            });
        }

        if fs_meta.len() > self.max_file_size {
            return Err(FileProcessingError::FileTooLarge {
                path: path.to_path_buf(),
                size: fs_meta.len(),
                max: self.max_file_size,
            });
        }

        let reader = FileReaderFactory::for_extension(&extension);
        let text = reader.read(path)?;

        // Fingerprint over the full raw text, not per chunk
        let content_hash = format!("{:x}", Sha256::digest(text.as_bytes()));

        let document_id = uuid::Uuid::new_v4().to_string();

        let pieces = match reader.file_type() {
            "source" => self.chunk_source(&text, &extension),
            _ => self.chunk_text(&text),
        };

        let chunks: Vec<DocumentChunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(index, content)| DocumentChunk::new(&document_id, index, content))
            .collect();

        let metadata = DocumentMetadata {
            id: document_id,
            file_path: path.display().to_string(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_size: fs_meta.len(),
            file_type: reader.file_type().to_string(),
            content_hash,
            ingestion_timestamp: Utc::now(),
            chunk_count: chunks.len(),
        };

        tracing::debug!(
            "Extracted {} chunks from {} ({} bytes, {})",
            metadata.chunk_count,
            metadata.file_path,
            metadata.file_size,
            metadata.file_type
        );

        Ok((metadata, chunks))
    }

    /// Character sliding window: each chunk starts `chunk_size - chunk_overlap`
    /// characters after the previous one, so consecutive chunks share
    /// `chunk_overlap` characters of context. The final chunk may be shorter.
    fn chunk_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end >= chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }

    /// Structure-aware splitting for source code.
    ///
    /// Top-level semantic units are packed greedily into chunks so no unit
    /// that fits within `chunk_size` straddles a chunk boundary. A unit
    /// larger than `chunk_size` cannot be kept whole and is hard-split with
    /// the same sliding-window rule as plain text. Unparseable input falls
    /// back to plain windowing.
    fn chunk_source(&self, text: &str, extension: &str) -> Vec<String> {
        let units = match AstParser::new(extension) {
            Ok(mut parser) => match parser.top_level_units(text) {
                Ok(units) if !units.is_empty() => units,
                _ => return self.chunk_text(text),
            },
            Err(_) => return self.chunk_text(text),
        };

        // Cover the whole text with ordered segments: gap, unit, gap, ...
        let mut segments: Vec<&str> = Vec::new();
        let mut cursor = 0usize;
        for unit in &units {
            if unit.start_byte < cursor {
                continue;
            }
            if unit.start_byte > cursor {
                segments.push(&text[cursor..unit.start_byte]);
            }
            segments.push(&text[unit.start_byte..unit.end_byte]);
            cursor = unit.end_byte;
        }
        if cursor < text.len() {
            segments.push(&text[cursor..]);
        }

        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_chars = 0usize;

        for segment in segments {
            let segment_chars = segment.chars().count();

            if buffer_chars + segment_chars <= self.chunk_size {
                buffer.push_str(segment);
                buffer_chars += segment_chars;
                continue;
            }

            if !buffer.trim().is_empty() {
                chunks.push(std::mem::take(&mut buffer));
            } else {
                buffer.clear();
            }
            buffer_chars = 0;

            if segment_chars <= self.chunk_size {
                buffer.push_str(segment);
                buffer_chars = segment_chars;
            } else {
                // Oversized unit: sliding-window hard split, overlap included
                chunks.extend(self.chunk_text(segment));
            }
        }

        if !buffer.trim().is_empty() {
            chunks.push(buffer);
        }

        chunks
    }
}
