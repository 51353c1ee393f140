//! # kb-rag - MCP Document Knowledge Base
//!
//! A Rust-based Model Context Protocol (MCP) server that gives AI assistants
//! a persistent document knowledge base: ingest files, chunk and embed them,
//! and answer semantic-similarity queries.
//!
//! ## Overview
//!
//! Documents are split into bounded, overlapping chunks (structure-aware for
//! source code), embedded locally with FastEmbed, and stored in an embedded
//! LanceDB database as two related tables: one row per document, one row per
//! chunk. Search embeds the query, runs a nearest-neighbor scan over chunk
//! vectors, and joins document metadata into ranked results.
//!
//! ## Key Features
//!
//! - **Local embeddings**: FastEmbed (all-MiniLM-L6-v2 by default), loaded
//!   lazily and guarded against concurrent double-initialization
//! - **Structure-aware chunking**: tree-sitter unit boundaries for source
//!   files, character sliding window for plain text
//! - **Embedded storage**: LanceDB documents/chunks tables with a
//!   configurable path and table-name prefix
//! - **MCP Protocol**: five tools for AI assistant integration
//!
//! ## Architecture
//!
//! ```text
//! MCP client (stdio)
//!        |
//! KnowledgeBaseServer      (tools, error envelope)
//!        |
//! DocumentService          (ingest/search/list/clear orchestration)
//!    |        |       |
//! Content  FastEmbed  LanceStore
//! Extractor Manager   (documents + chunks tables)
//! ```
//!
//! ## Modules
//!
//! - [`mcp_server`]: MCP protocol server with the knowledge base tools
//! - [`service`]: document pipeline orchestration
//! - [`processor`]: file readers, AST parsing, and chunking
//! - [`embedding`]: embedding generation using FastEmbed
//! - [`store`]: vector store abstraction and the LanceDB backend
//! - [`github`]: GitHub URL parsing and repository ingestion
//! - [`config`]: configuration management with environment variable support
//! - [`types`]: data records and MCP request/response types
//! - [`error`]: error types and the wire error mapping
//! - [`paths`]: platform default path computation
//!
//! ## Usage Example
//!
//! ```no_run
//! use kb_rag::mcp_server::KnowledgeBaseServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = KnowledgeBaseServer::new().await?;
//!     server.serve_stdio().await?;
//!     Ok(())
//! }
//! ```

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding generation using FastEmbed
pub mod embedding;

/// Error types and utilities
pub mod error;

/// GitHub URL parsing and repository ingestion
pub mod github;

/// MCP server implementation with the knowledge base tools
pub mod mcp_server;

/// Platform default path computation
pub mod paths;

/// File reading, AST parsing, and chunking
pub mod processor;

/// Document pipeline orchestration
pub mod service;

/// Vector store abstraction supporting LanceDB
pub mod store;

/// Data records and MCP request/response types
pub mod types;
