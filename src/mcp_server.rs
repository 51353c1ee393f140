use crate::config::Config;
use crate::error::KbError;
use crate::service::DocumentService;
use crate::types::*;

use anyhow::{Context, Result};
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// MCP server exposing the knowledge base tools over stdio
#[derive(Clone)]
pub struct KnowledgeBaseServer {
    service: Arc<DocumentService>,
    cancel: CancellationToken,
    tool_router: ToolRouter<Self>,
}

impl KnowledgeBaseServer {
    /// Create a server with default configuration
    pub async fn new() -> Result<Self> {
        let config = Config::new()?;
        Self::with_config(config).await
    }

    /// Create a server with explicit configuration
    pub async fn with_config(config: Config) -> Result<Self> {
        let service = DocumentService::with_config(config)
            .await
            .context("Failed to initialize document service")?;

        Ok(Self {
            service: Arc::new(service),
            cancel: CancellationToken::new(),
            tool_router: Self::tool_router(),
        })
    }

    /// Get the underlying document service
    pub fn service(&self) -> &DocumentService {
        &self.service
    }

    /// Cancellation token shared by all in-flight operations; cancelling it
    /// aborts them at their next suspension point
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The single conversion point between typed results and the wire
    /// envelope: success payloads pass through, every `KbError` becomes
    /// `{success: false, error_type, error_message, error_details}`.
    fn respond<T: Serialize>(result: Result<T, KbError>) -> Result<String, String> {
        let serialized = match result {
            Ok(payload) => serde_json::to_string_pretty(&payload),
            Err(ref error) => {
                if error.is_user_error() {
                    tracing::info!("Rejected request: {}", error);
                } else {
                    tracing::error!("Operation failed: {}", error);
                }
                serde_json::to_string_pretty(&ErrorPayload::from(error))
            }
        };
        serialized.map_err(|e| format!("Serialization failed: {}", e))
    }
}

#[tool_router(router = tool_router)]
impl KnowledgeBaseServer {
    #[tool(
        description = "Add a document to the knowledge base. The file is chunked, embedded, and stored for semantic search."
    )]
    async fn add_document(
        &self,
        Parameters(req): Parameters<AddDocumentRequest>,
    ) -> Result<String, String> {
        let result = match req.validate() {
            Ok(()) => {
                self.service
                    .add_document(req.file_path.trim(), &self.cancel)
                    .await
            }
            Err(e) => Err(e),
        };
        Self::respond(result)
    }

    #[tool(
        description = "List all documents in the knowledge base with pagination support. Pass limit 0 for no limit."
    )]
    async fn list_documents(
        &self,
        Parameters(req): Parameters<ListDocumentsRequest>,
    ) -> Result<String, String> {
        let result = match req.validate() {
            Ok(limit) => {
                self.service
                    .list_documents(limit, req.offset, &self.cancel)
                    .await
            }
            Err(e) => Err(e),
        };
        Self::respond(result)
    }

    #[tool(
        description = "Search documents in the knowledge base using vector similarity search."
    )]
    async fn search_documents(
        &self,
        Parameters(req): Parameters<SearchDocumentsRequest>,
    ) -> Result<String, String> {
        let result = match req.validate() {
            Ok(()) => {
                self.service
                    .search_documents(req.query.trim(), req.limit, &self.cancel)
                    .await
            }
            Err(e) => Err(e),
        };
        Self::respond(result)
    }

    #[tool(description = "Clear all documents from the knowledge base.")]
    async fn clear_knowledge_base(
        &self,
        Parameters(_req): Parameters<ClearKnowledgeBaseRequest>,
    ) -> Result<String, String> {
        let result = self.service.clear_knowledge_base(&self.cancel).await;
        Self::respond(result)
    }

    #[tool(
        description = "Clone a GitHub repository (optionally a branch or subdirectory) and add every supported file to the knowledge base."
    )]
    async fn add_github_repository(
        &self,
        Parameters(req): Parameters<AddRepositoryRequest>,
    ) -> Result<String, String> {
        let result = match req.validate() {
            Ok(()) => {
                self.service
                    .add_repository(req.url.trim(), req.branch.clone(), &self.cancel)
                    .await
            }
            Err(e) => Err(e),
        };
        Self::respond(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for KnowledgeBaseServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.service.config().server.name.clone().into(),
                title: Some("Knowledge Base - Document Ingestion and Semantic Search".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Document knowledge base with semantic search. \
                Use add_document to ingest files, search_documents to find relevant content, \
                list_documents to browse, and clear_knowledge_base to start over."
                    .into(),
            ),
        }
    }
}

impl KnowledgeBaseServer {
    /// Serve the knowledge base over stdio until the client disconnects
    pub async fn serve_stdio(self) -> Result<()> {
        tracing::info!("Starting knowledge base MCP server");

        let service = self.service.clone();
        let cancel = self.cancel.clone();

        let transport = rmcp::transport::io::stdio();
        self.serve(transport).await?.waiting().await?;

        // Release the model and store handles on the way out
        cancel.cancel();
        service.cleanup().await;

        Ok(())
    }
}
