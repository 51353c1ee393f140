//! Document reading and chunking
//!
//! Turns a raw file into a sequence of bounded, overlapping chunks: file
//! readers decode and classify the input, the AST parser finds semantic unit
//! boundaries in source code, and the extractor assembles chunks plus
//! document metadata.

mod ast_parser;
mod extractor;
mod file_readers;

pub use ast_parser::AstParser;
pub use extractor::ContentExtractor;
pub use file_readers::{FileReader, FileReaderFactory, SourceFileReader, TextFileReader};
