use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::context::IndexContext;
use crate::indexer::ScanOptions;
use crate::patch::{PatchEdit, PatchEngine, PatchRequest};

type JsonObject = serde_json::Map<String, serde_json::Value>;

#[derive(Clone)]
pub struct McpServer {
    ctx: Arc<IndexContext>,
    engine: PatchEngine,
}

impl McpServer {
    pub fn new(ctx: Arc<IndexContext>) -> Self {
        Self {
            ctx,
            engine: PatchEngine::new(),
        }
    }

    fn search_symbols(&self, params: SearchSymbolsParams) -> crate::Result<String> {
        let results = self.ctx.search(&params.prefix, params.limit.unwrap_or(20))?;
        Ok(serde_json::to_string_pretty(&results)?)
    }

    fn get_symbol(&self, params: GetSymbolParams) -> crate::Result<String> {
        let symbols = self.ctx.get(&params.name, params.file_path.as_deref())?;
        Ok(serde_json::to_string_pretty(&symbols)?)
    }

    fn symbol_context(&self, params: SymbolContextParams) -> crate::Result<String> {
        let context = self.ctx.context(
            &params.name,
            params.file_path.as_deref(),
            params.max_depth.unwrap_or(2),
        )?;
        Ok(serde_json::to_string_pretty(&context)?)
    }

    fn complete(&self, params: CompleteParams) -> crate::Result<String> {
        if params.simple.unwrap_or(false) {
            let lines = self.ctx.complete_simple(&params.prefix, params.max_results)?;
            return Ok(lines.join("\n"));
        }
        let completions = self.ctx.complete(&params.prefix, params.max_results)?;
        Ok(serde_json::to_string_pretty(&completions)?)
    }

    fn symbol_content(&self, params: SymbolContentParams) -> crate::Result<String> {
        let file_path = params.file_path.as_deref();
        if params.json.unwrap_or(false) {
            let contents = self.ctx.symbol_content(&params.symbol_path, file_path)?;
            return Ok(serde_json::to_string_pretty(&contents)?);
        }
        self.ctx.symbol_text(&params.symbol_path, file_path)
    }

    fn complete_realtime(&self, params: CompleteRealtimeParams) -> crate::Result<String> {
        let completions = self
            .ctx
            .complete_realtime(&params.prefix, params.max_results)?;
        Ok(serde_json::to_string_pretty(&completions)?)
    }

    fn file_symbols(&self, params: FileSymbolsParams) -> crate::Result<String> {
        let symbols: Vec<serde_json::Value> = self
            .ctx
            .symbols_in_file(&params.file_path)?
            .into_iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name,
                    "kind": s.kind,
                    "signature": s.signature,
                    "file_path": s.file_path,
                    "start_line": s.start_line,
                    "end_line": s.end_line,
                })
            })
            .collect();
        Ok(serde_json::to_string_pretty(&symbols)?)
    }

    fn patch_diff(&self, params: PatchParams) -> crate::Result<String> {
        let diff = self.engine.generate_diff(&PatchRequest::from_edits(params.edits))?;
        if diff.is_empty() {
            return Ok("No changes".to_string());
        }
        Ok(diff)
    }

    fn patch_apply(&self, params: PatchParams) -> crate::Result<String> {
        let written = self.engine.apply(&PatchRequest::from_edits(params.edits))?;
        let output: serde_json::Map<String, serde_json::Value> = written
            .into_iter()
            .map(|(path, bytes)| {
                (
                    path,
                    serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()),
                )
            })
            .collect();
        Ok(serde_json::to_string_pretty(&output)?)
    }
}

fn schema_for<T: JsonSchema>() -> Arc<JsonObject> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(&schema) {
        Ok(serde_json::Value::Object(map)) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

fn parse_params<T: DeserializeOwned>(arguments: Option<JsonObject>) -> Result<T, McpError> {
    serde_json::from_value(serde_json::Value::Object(arguments.unwrap_or_default()))
        .map_err(|e| McpError::invalid_params(e.to_string(), None))
}

fn tool_result(result: crate::Result<String>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => CallToolResult::error(vec![Content::text(e.to_string())]),
    }
}

fn tool(name: &str, title: &str, description: &str, input_schema: Arc<JsonObject>) -> Tool {
    Tool {
        name: name.to_string().into(),
        title: Some(title.to_string()),
        description: Some(description.to_string().into()),
        input_schema,
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchSymbolsParams {
    /// Name prefix
    pub prefix: String,
    /// Max results (1-100, default 20)
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetSymbolParams {
    /// Symbol path, e.g. `Class.method`
    pub name: String,
    /// Fragment of the file path to disambiguate
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SymbolContextParams {
    /// Symbol path
    pub name: String,
    /// Preferred file of the root definition
    #[serde(default)]
    pub file_path: Option<String>,
    /// Call levels to follow (0-10, default 2)
    #[serde(default)]
    pub max_depth: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CompleteParams {
    /// Name prefix or `symbol:<file>/<name>` prefix
    pub prefix: String,
    /// Max results (1-50, default 10)
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Return plain `symbol:<file>/<name>` lines
    #[serde(default)]
    pub simple: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SymbolContentParams {
    /// `symbol:<file>/<a>,<b>` or comma-separated symbol paths
    pub symbol_path: String,
    /// File to read, or a fragment of an indexed path, for bare names
    #[serde(default)]
    pub file_path: Option<String>,
    /// Return name, file, content and location of each definition as JSON
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CompleteRealtimeParams {
    /// Name prefix or `symbol:<path>/<name>` prefix
    pub prefix: String,
    /// Max results (1-50, default 10)
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SkeletonParams {
    /// Source file to outline
    pub file_path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FileSymbolsParams {
    /// Fragment of the file path
    pub file_path: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EmptyParams {}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PatchParams {
    pub edits: Vec<PatchEdit>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BuildIndexParams {
    /// Directories to scan
    pub project_paths: Vec<String>,
    /// Glob patterns of files to skip
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Suffixes to index, e.g. `.py`
    #[serde(default)]
    pub include_suffixes: Vec<String>,
    /// Worker threads (unset: one per CPU)
    #[serde(default)]
    pub parallelism: Option<i64>,
    /// Re-parse unchanged files
    #[serde(default)]
    pub force: Option<bool>,
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(true),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "symbol-indexer".to_string(),
                title: Some("Symbol Indexer".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Symbol index over C, Python, JavaScript, Java and Go sources. \
                 Provides prefix search, definitions, call context, completion, \
                 file outlines and verified byte-range patches."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let tools = vec![
            tool(
                "search_symbols",
                "Search Symbols",
                "Symbols whose name starts with a prefix",
                schema_for::<SearchSymbolsParams>(),
            ),
            tool(
                "get_symbol",
                "Get Symbol",
                "Full records of a symbol, optionally narrowed by file",
                schema_for::<GetSymbolParams>(),
            ),
            tool(
                "symbol_context",
                "Symbol Context",
                "Definition of a symbol plus the definitions it calls, transitively",
                schema_for::<SymbolContextParams>(),
            ),
            tool(
                "complete",
                "Complete",
                "Prefix completion over bare and file-qualified names",
                schema_for::<CompleteParams>(),
            ),
            tool(
                "symbol_content",
                "Symbol Content",
                "Current source of one or more definitions, as text or JSON with locations",
                schema_for::<SymbolContentParams>(),
            ),
            tool(
                "complete_realtime",
                "Complete Realtime",
                "Completion that re-parses the file named by a symbol:<path>/ prefix when it changed",
                schema_for::<CompleteRealtimeParams>(),
            ),
            tool(
                "skeleton",
                "Skeleton",
                "Outline of a source file with every body elided",
                schema_for::<SkeletonParams>(),
            ),
            tool(
                "list_files",
                "List Files",
                "Files that contain indexed symbols",
                schema_for::<EmptyParams>(),
            ),
            tool(
                "file_symbols",
                "File Symbols",
                "Symbols defined in files matching a path fragment",
                schema_for::<FileSymbolsParams>(),
            ),
            tool(
                "index_stats",
                "Index Stats",
                "File and symbol counts",
                schema_for::<EmptyParams>(),
            ),
            tool(
                "patch_diff",
                "Patch Diff",
                "Unified diff of byte-range edits, after checking the expected text",
                schema_for::<PatchParams>(),
            ),
            tool(
                "patch_apply",
                "Patch Apply",
                "Apply byte-range edits; nothing is written if any edit fails validation",
                schema_for::<PatchParams>(),
            ),
            tool(
                "build_index",
                "Build Index",
                "Scan directories into the index",
                schema_for::<BuildIndexParams>(),
            ),
        ];

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!("Tool call: {}", request.name);

        let result = match request.name.as_ref() {
            "search_symbols" => tool_result(self.search_symbols(parse_params(request.arguments)?)),
            "get_symbol" => tool_result(self.get_symbol(parse_params(request.arguments)?)),
            "symbol_context" => tool_result(self.symbol_context(parse_params(request.arguments)?)),
            "complete" => tool_result(self.complete(parse_params(request.arguments)?)),
            "symbol_content" => tool_result(self.symbol_content(parse_params(request.arguments)?)),
            "complete_realtime" => {
                tool_result(self.complete_realtime(parse_params(request.arguments)?))
            }
            "skeleton" => {
                let params: SkeletonParams = parse_params(request.arguments)?;
                tool_result(self.ctx.skeleton(Path::new(&params.file_path)))
            }
            "list_files" => tool_result(
                self.ctx
                    .list_files()
                    .and_then(|files| Ok(serde_json::to_string_pretty(&files)?)),
            ),
            "file_symbols" => tool_result(self.file_symbols(parse_params(request.arguments)?)),
            "index_stats" => tool_result(
                self.ctx
                    .stats()
                    .and_then(|stats| Ok(serde_json::to_string_pretty(&stats)?)),
            ),
            "patch_diff" => tool_result(self.patch_diff(parse_params(request.arguments)?)),
            "patch_apply" => tool_result(self.patch_apply(parse_params(request.arguments)?)),
            "build_index" => {
                let params: BuildIndexParams = parse_params(request.arguments)?;
                let options = ScanOptions {
                    project_paths: params.project_paths.into_iter().map(PathBuf::from).collect(),
                    excludes: params.excludes,
                    include_suffixes: params.include_suffixes,
                    parallelism: params.parallelism,
                    force: params.force.unwrap_or(false),
                    watchdog_timeout: Duration::from_secs(5),
                    ..ScanOptions::default()
                };

                let ctx = Arc::clone(&self.ctx);
                let report = tokio::task::spawn_blocking(move || ctx.scan(&options))
                    .await
                    .map_err(|e| McpError::internal_error(e.to_string(), None))?;
                tool_result(report.and_then(|r| Ok(serde_json::to_string_pretty(&r)?)))
            }
            _ => {
                return Err(McpError::invalid_params(
                    format!("Unknown tool: {}", request.name),
                    None,
                ));
            }
        };

        Ok(result)
    }
}
